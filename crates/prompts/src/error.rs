//! Prompt resolution errors.

use deckgen_core::{CardKind, CoreError, Domain, Mode, PromptKey};

/// Result alias for prompt operations.
pub type Result<T> = std::result::Result<T, PromptError>;

/// Errors that can occur while loading templates or resolving a prompt.
///
/// All of these are configuration errors: retrying the same request cannot
/// succeed.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// No template is registered for the key
    #[error("No template for {0}")]
    TemplateNotFound(PromptKey),

    /// Required placeholders were not supplied
    #[error("Template {key} is missing placeholders: {}", missing.join(", "))]
    MissingPlaceholder {
        /// Key of the template being resolved
        key: PromptKey,
        /// Missing names, sorted
        missing: Vec<String>,
    },

    /// Mode is not legal for the domain
    #[error("Mode '{mode}' is not allowed for domain '{domain}'")]
    ModeNotAllowed {
        /// Requested domain
        domain: Domain,
        /// Requested mode
        mode: Mode,
    },

    /// Flashcard prompts need a card kind
    #[error("Domain '{0}' requires a card kind")]
    CardKindRequired(Domain),

    /// Catalog prompts take no card kind
    #[error("Domain '{domain}' does not take a card kind (got '{kind}')")]
    UnexpectedCardKind {
        /// Requested domain
        domain: Domain,
        /// Supplied card kind
        kind: CardKind,
    },

    /// Template store content is malformed
    #[error("Invalid template store at '{path}': {reason}")]
    InvalidStore {
        /// Dotted path of the offending entry
        path: String,
        /// What was wrong
        reason: String,
    },

    /// TOML syntax error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CoreError> for PromptError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ModeNotAllowed { domain, mode } => PromptError::ModeNotAllowed { domain, mode },
            CoreError::CardKindRequired(domain) => PromptError::CardKindRequired(domain),
            CoreError::UnexpectedCardKind { domain, kind } => {
                PromptError::UnexpectedCardKind { domain, kind }
            }
            other => PromptError::InvalidStore { path: String::new(), reason: other.to_string() },
        }
    }
}
