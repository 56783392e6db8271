//! Response envelope: `{status, data?, message?}`

use serde::{Deserialize, Serialize};
use worktime_util::WorkTimeError;

/// Status field of every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    IncompleteWindow,
    InvertedWindow,
    WindowNotInFuture,
    EntityNotFound,
    InvalidRequest,
    UpstreamUnavailable,
    InternalError,
}

impl Status {
    pub fn from_error(error: &WorkTimeError) -> Self {
        match error {
            WorkTimeError::EntityNotFound(_) => Status::EntityNotFound,
            WorkTimeError::IncompleteWindow => Status::IncompleteWindow,
            WorkTimeError::InvertedWindow => Status::InvertedWindow,
            WorkTimeError::WindowNotInFuture => Status::WindowNotInFuture,
            WorkTimeError::ValidationError(_) | WorkTimeError::ConfigError(_) => {
                Status::InvalidRequest
            }
            WorkTimeError::UpstreamUnavailable(_) => Status::UpstreamUnavailable,
            WorkTimeError::MalformedExceptionData(_) | WorkTimeError::Internal(_) => {
                Status::InternalError
            }
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response<T> {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Response<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: Status::Ok,
            data: Some(data),
            message: None,
        }
    }

    pub fn error(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn from_error(error: &WorkTimeError) -> Self {
        Self::error(Status::from_error(error), error.to_string())
    }

    pub fn from_result(result: Result<T, WorkTimeError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

impl Response<()> {
    /// Success with no payload
    pub fn ok_empty() -> Self {
        Self {
            status: Status::Ok,
            data: None,
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worktime_util::EntityId;

    #[test]
    fn ok_envelope_serialization() {
        let resp = Response::ok(5u32);
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"status":"OK","data":5}"#);

        let parsed: Response<u32> = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_ok());
        assert_eq!(parsed.data, Some(5));
    }

    #[test]
    fn empty_ok_omits_data() {
        let json = serde_json::to_string(&Response::ok_empty()).unwrap();
        assert_eq!(json, r#"{"status":"OK"}"#);
    }

    #[test]
    fn validation_errors_keep_their_kind() {
        let resp: Response<()> = Response::from_error(&WorkTimeError::WindowNotInFuture);
        assert_eq!(resp.status, Status::WindowNotInFuture);
        assert_eq!(resp.message.as_deref(), Some("End time must be in the future"));

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "WINDOW_NOT_IN_FUTURE");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn upstream_and_lookup_errors_map_to_statuses() {
        assert_eq!(
            Status::from_error(&WorkTimeError::upstream("db locked")),
            Status::UpstreamUnavailable
        );
        assert_eq!(
            Status::from_error(&WorkTimeError::EntityNotFound(EntityId::new("9"))),
            Status::EntityNotFound
        );
    }
}
