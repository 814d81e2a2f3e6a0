//! The `{success, ...}` / `{success: false, error}` shape printed by the CLIs
//! and written to result artifacts.

use std::fmt::Display;

use serde::Serialize;

/// Serializable result envelope.
///
/// A success flattens the payload's fields next to `"success": true`, so the
/// payload must serialize as a map (a struct or a map type). A failure carries
/// only the error message.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Display) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl<T, E: Display> From<Result<T, E>> for Envelope<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Envelope::success(data),
            Err(err) => Envelope::failure(err),
        }
    }
}
