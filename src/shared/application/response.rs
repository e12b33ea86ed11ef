use serde::{Deserialize, Serialize};

/// Envelope returned by service methods; the calling layer maps it to a transport status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
}

impl<T> ServiceResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }
}

impl<T> ServiceResponse<Option<T>> {
    pub fn found(data: T, message: impl Into<String>) -> Self {
        Self::ok(Some(data), message)
    }

    /// Absent entity, distinguishable from a system error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: message.into(),
        }
    }
}
