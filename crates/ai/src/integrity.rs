//! Content integrity check.

use deckgen_core::IntegrityRecord;

/// Submitted content does not match the length recorded for the task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    /// Character counts differ
    #[error("Content length mismatch: recorded {recorded} characters, got {actual}")]
    LengthMismatch {
        /// Length captured at task creation
        recorded: usize,
        /// Length of the submitted content
        actual: usize,
    },
}

/// Compare a recorded length against `content`, counted in characters.
///
/// Records without a length predate the check and always pass.
pub fn check(recorded_length: Option<usize>, content: &str) -> Result<(), IntegrityError> {
    let Some(recorded) = recorded_length else {
        return Ok(());
    };
    let actual = content.chars().count();
    if actual != recorded {
        return Err(IntegrityError::LengthMismatch { recorded, actual });
    }
    Ok(())
}

/// [`check`] against a task's integrity record.
pub fn verify(record: &IntegrityRecord, content: &str) -> Result<(), IntegrityError> {
    check(record.recorded_length, content)
}
