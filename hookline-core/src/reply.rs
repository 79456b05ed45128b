//! Wire shape of failure replies.
//!
//! Every failure is answered with `{"error":{"message":"..."}}`.

use serde::{Deserialize, Serialize};

/// Reply message for a subscription over its data quota.
pub const QUOTA_EXCEEDED: &str = "quota exceeded";

/// Reply message for hooks that fail to resolve or return an error.
pub const HOOK_UNHANDLED: &str = "hook unhandled error";

/// Reply message for handler failures.
pub const UNKNOWN_ERROR: &str = "unknownError";

/// Failure reply sent to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    /// Error details.
    pub error: ErrorBody,
}

/// Body of an [`ErrorReply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable message.
    pub message: String,
}

impl ErrorReply {
    /// Create a reply carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                message: message.into(),
            },
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.error.message
    }
}
