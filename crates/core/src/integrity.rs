//! Integrity metadata recorded by the task layer.

use serde::{Deserialize, Serialize};

/// Content length captured when a task was created.
///
/// Older task records carry no length; those are exempt from the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntegrityRecord {
    /// Character count of the submitted content, if recorded
    pub recorded_length: Option<usize>,
}

impl IntegrityRecord {
    /// Record with a known length.
    pub fn with_length(length: usize) -> Self {
        Self { recorded_length: Some(length) }
    }

    /// Legacy record without a length.
    pub fn legacy() -> Self {
        Self { recorded_length: None }
    }
}
