use reqwest::StatusCode;

use crate::errors::Error;
use crate::transport::HttpResponse;

use super::response::error_message;

/// Per-call lifecycle. `Retrying` is only reachable from `Refreshing`, and a
/// 401 while `Retrying` is terminal, so a call refreshes at most once.
#[derive(Debug)]
pub(crate) enum CallState {
    Sending,
    Refreshing,
    Retrying,
    Done(HttpResponse),
    Fatal(Error),
}

impl CallState {
    pub(crate) fn after_response(self, resp: HttpResponse) -> CallState {
        match (self, resp.status) {
            (CallState::Sending, StatusCode::UNAUTHORIZED) => CallState::Refreshing,
            (CallState::Retrying, StatusCode::UNAUTHORIZED) => CallState::Fatal(Error::AuthExpired(
                "request rejected again after session refresh".into(),
            )),
            (CallState::Sending | CallState::Retrying, StatusCode::FORBIDDEN) => {
                CallState::Fatal(Error::Authorization(error_message(&resp)))
            }
            (CallState::Sending | CallState::Retrying, _) => CallState::Done(resp),
            (other, _) => other.unexpected("response"),
        }
    }

    pub(crate) fn after_transport_error(self, err: Error) -> CallState {
        match self {
            CallState::Sending | CallState::Retrying => CallState::Fatal(err),
            other => other.unexpected("transport error"),
        }
    }

    pub(crate) fn after_refresh(self, refreshed: bool) -> CallState {
        match (self, refreshed) {
            (CallState::Refreshing, true) => CallState::Retrying,
            (CallState::Refreshing, false) => CallState::Fatal(Error::AuthExpired(
                "session could not be refreshed".into(),
            )),
            (other, _) => other.unexpected("refresh outcome"),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            CallState::Sending => "sending",
            CallState::Refreshing => "refreshing",
            CallState::Retrying => "retrying",
            CallState::Done(_) => "done",
            CallState::Fatal(_) => "fatal",
        }
    }

    fn unexpected(self, event: &str) -> CallState {
        CallState::Fatal(Error::Transport(format!(
            "internal: {} received in state '{}'",
            event,
            self.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderMap;

    use super::*;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn first_unauthorized_moves_to_refreshing() {
        let state = CallState::Sending.after_response(response(401, ""));
        assert!(matches!(state, CallState::Refreshing));
    }

    #[test]
    fn unauthorized_on_retry_is_fatal() {
        let state = CallState::Retrying.after_response(response(401, ""));
        match state {
            CallState::Fatal(err) => assert!(err.is_auth_expired()),
            other => panic!("unexpected state {}", other.name()),
        }
    }

    #[test]
    fn forbidden_is_fatal_without_refresh() {
        let state = CallState::Sending.after_response(response(403, r#"{"message":"not your contract"}"#));
        match state {
            CallState::Fatal(Error::Authorization(msg)) => assert_eq!(msg, "not your contract"),
            other => panic!("unexpected state {}", other.name()),
        }
    }

    #[test]
    fn failed_refresh_is_auth_expired() {
        let state = CallState::Refreshing.after_refresh(false);
        assert!(matches!(state, CallState::Fatal(Error::AuthExpired(_))));
        assert!(matches!(CallState::Refreshing.after_refresh(true), CallState::Retrying));
    }

    #[test]
    fn other_statuses_complete_the_call() {
        assert!(matches!(
            CallState::Sending.after_response(response(500, "")),
            CallState::Done(_)
        ));
        assert!(matches!(
            CallState::Retrying.after_response(response(200, "[]")),
            CallState::Done(_)
        ));
    }
}
