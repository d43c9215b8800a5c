pub mod json_response;

// Re-export commonly used utilities
pub use json_response::*;
