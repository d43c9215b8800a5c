use serde::{Deserialize, Serialize};

/// JSON body of every non-2xx response the server produces.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            status: "error".to_string(),
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn not_found() -> Self {
        Self::new("NOT_FOUND", "Endpoint not found")
    }

    pub fn too_many_streams(limit: usize) -> Self {
        Self::new(
            "TOO_MANY_STREAMS",
            &format!("Event stream limit of {} reached, retry later", limit),
        )
    }
}
