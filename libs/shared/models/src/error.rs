use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

impl ApiError {
    /// Map a non-success HTTP status and its body onto the error taxonomy.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_message(body);

        match status {
            401 | 403 => ApiError::Auth(message),
            404 => ApiError::NotFound(message),
            400 | 422 => ApiError::BadRequest(message),
            409 => ApiError::Conflict(message),
            _ => ApiError::Server { status, message },
        }
    }

    /// Whether repeating the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout(_) => true,
            ApiError::Server { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Auth(_) => Some(401),
            ApiError::NotFound(_) => Some(404),
            ApiError::BadRequest(_) | ApiError::ValidationError(_) => Some(400),
            ApiError::Conflict(_) => Some(409),
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// The backend answers errors as {"error": "..."} or {"status": "error", "message": "..."}.
fn extract_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => json
            .get("error")
            .or_else(|| json.get("message"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => body.trim().to_string(),
    }
}
