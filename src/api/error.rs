use serde_json::Value;
use thiserror::Error;

/// How a failure is presented to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing project or id; never reaches the network
    Validation,
    /// 404 after every fallback endpoint
    NotFound,
    /// 401 or 403
    Auth,
    /// Any other API or transport failure
    Api,
}

/// Gateway error
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Non-2xx response. `message` is the classified server message.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// The request never produced a response
    #[error("request failed: {0}")]
    Transport(String),

    /// A 2xx response whose body was not the JSON we expected
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.status() {
            Some(404) => ErrorKind::NotFound,
            Some(401 | 403) => ErrorKind::Auth,
            _ => ErrorKind::Api,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

/// Build the error for a non-2xx response.
///
/// A JSON body contributes its `message` or `error` string. A body that is
/// not JSON is used verbatim. Otherwise the message is `API error: <status>`.
pub fn classify_error(status: u16, body: &str) -> ApiError {
    let generic = || format!("API error: {status}");
    let message = match serde_json::from_str::<Value>(body) {
        Ok(json) => ["message", "error"]
            .iter()
            .find_map(|key| match json.get(key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                _ => None,
            })
            .unwrap_or_else(generic),
        Err(_) if !body.is_empty() => body.to_string(),
        Err(_) => generic(),
    };
    ApiError::Status { status, message }
}
