//! Workflow errors.

use deckgen_prompts::PromptError;

use crate::gateway::GatewayError;
use crate::integrity::IntegrityError;

/// Result alias for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Coarse error class, for mapping onto an outer protocol's status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad deployment or template set; the request cannot succeed as sent
    Configuration,
    /// Bad caller input
    Validation,
    /// The AI provider failed or misbehaved
    Upstream,
}

/// Errors that can occur while running a workflow.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Prompt resolution failed
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// Submitted content failed the integrity check
    #[error(transparent)]
    Integrity(#[from] IntegrityError),

    /// Requested card count was zero
    #[error("Requested card count must be at least 1")]
    InvalidCount,

    /// Section id not present in the catalog
    #[error("Section not found: {0}")]
    SectionNotFound(String),

    /// Gateway call failed
    #[error("AI gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Response could not be parsed, even after retrying
    #[error("Unparsable AI response after {attempts} attempts: {reason}")]
    UnparsableResponse {
        /// Gateway calls made
        attempts: u32,
        /// Parser's reason for the last failure
        reason: String,
    },
}

impl WorkflowError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Prompt(_) => ErrorKind::Configuration,
            WorkflowError::Integrity(_)
            | WorkflowError::InvalidCount
            | WorkflowError::SectionNotFound(_) => ErrorKind::Validation,
            WorkflowError::Gateway(_) | WorkflowError::UnparsableResponse { .. } => {
                ErrorKind::Upstream
            }
        }
    }
}
