use reqwest::StatusCode;
use tracing::warn;

use crate::errors::Error;
use crate::transport::HttpResponse;
use crate::types::{ApiResponse, ErrorBody};

/// Turns a settled response into the caller-facing result.
pub(crate) fn interpret(resp: HttpResponse) -> Result<ApiResponse, Error> {
    let status = resp.status;
    if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
        return Ok(ApiResponse::Empty);
    }
    if status.is_success() {
        if resp.body.trim().is_empty() {
            return Ok(ApiResponse::Empty);
        }
        return serde_json::from_str(&resp.body)
            .map(ApiResponse::Json)
            .map_err(|e| Error::Parse(format!("status {} body: {}", status.as_u16(), e)));
    }

    let message = error_message(&resp);
    match status {
        StatusCode::UNAUTHORIZED => Err(Error::AuthExpired(message)),
        StatusCode::FORBIDDEN => Err(Error::Authorization(message)),
        _ => {
            warn!(status = status.as_u16(), message = %message, "request.failed");
            Err(Error::RequestFailed(status, message))
        }
    }
}

/// Best-effort human readable message from an error body.
pub(crate) fn error_message(resp: &HttpResponse) -> String {
    serde_json::from_str::<ErrorBody>(&resp.body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_else(|| format!("status {}", resp.status.as_u16()))
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderMap;
    use serde_json::json;

    use super::*;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn no_content_is_empty_even_with_a_body() {
        assert_eq!(interpret(response(204, "ignored")).unwrap(), ApiResponse::Empty);
    }

    #[test]
    fn success_body_is_parsed() {
        let parsed = interpret(response(200, r#"[{"id":1}]"#)).unwrap();
        assert_eq!(parsed, ApiResponse::Json(json!([{"id": 1}])));
    }

    #[test]
    fn undecodable_success_body_is_a_parse_error() {
        assert!(matches!(interpret(response(200, "<html>")), Err(Error::Parse(_))));
    }

    #[test]
    fn failure_message_prefers_message_then_error() {
        let err = interpret(response(422, r#"{"error":"deadline required"}"#)).unwrap_err();
        match err {
            Error::RequestFailed(status, msg) => {
                assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
                assert_eq!(msg, "deadline required");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn unparseable_failure_body_falls_back_to_status() {
        match interpret(response(502, "Bad Gateway")).unwrap_err() {
            Error::RequestFailed(_, msg) => assert_eq!(msg, "status 502"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
