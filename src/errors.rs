use std::fmt;

use reqwest::StatusCode;

/// Failures surfaced to callers of the authenticated client.
///
/// The enum is `Clone` because one failed call may be observed by every
/// waiter attached to it.
#[derive(Debug, Clone)]
pub enum Error {
    Transport(String),
    AuthExpired(String),
    Authorization(String),
    RequestFailed(StatusCode, String),
    Parse(String),
    Config(String),
}

impl Error {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Error::AuthExpired(_))
    }

    /// Whether a caller-side retry could plausibly succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::RequestFailed(status, _) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(msg) => write!(f, "transport error: {}", msg),
            Error::AuthExpired(msg) => write!(f, "session expired: {}", msg),
            Error::Authorization(msg) => write!(f, "not authorized: {}", msg),
            Error::RequestFailed(status, msg) => {
                write!(f, "request failed ({}): {}", status.as_u16(), msg)
            }
            Error::Parse(msg) => write!(f, "could not parse response: {}", msg),
            Error::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_and_server_side_failures_are_retriable() {
        assert!(Error::Transport("reset".into()).is_retriable());
        assert!(Error::RequestFailed(StatusCode::BAD_GATEWAY, "x".into()).is_retriable());
        assert!(Error::RequestFailed(StatusCode::TOO_MANY_REQUESTS, "x".into()).is_retriable());
        assert!(!Error::RequestFailed(StatusCode::BAD_REQUEST, "x".into()).is_retriable());
        assert!(!Error::AuthExpired("x".into()).is_retriable());
        assert!(!Error::Authorization("x".into()).is_retriable());
        assert!(!Error::Parse("x".into()).is_retriable());
    }

    #[test]
    fn request_failed_display_carries_status_and_message() {
        let err = Error::RequestFailed(StatusCode::UNPROCESSABLE_ENTITY, "deadline in past".into());
        assert_eq!(err.to_string(), "request failed (422): deadline in past");
    }
}
