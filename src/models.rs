//! Data models and DTOs (Data Transfer Objects)
//!
//! Course aggregates shared by the draft and live stores, plus the generic
//! response envelopes used by the API.

pub mod content;
pub mod course;

// Re-export commonly used types
pub use content::*;
pub use course::*;

use serde::Serialize;

/// Generic success response, payload fields inlined next to `success`
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}
