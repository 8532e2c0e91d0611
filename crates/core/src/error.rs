//! Errors raised while building core values from untyped input.

use crate::key::{CardKind, Domain, Mode};

/// Result alias for core conversions.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur when parsing keys or validating records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// Card kind name not recognised
    #[error("Unsupported card kind: {0}")]
    UnsupportedCardKind(String),

    /// A key segment (domain, mode, input form, language, status, format) not recognised
    #[error("Unknown {field}: {value}")]
    UnknownValue {
        /// Which axis was being parsed
        field: &'static str,
        /// The offending text
        value: String,
    },

    /// Mode is not legal for the domain (e.g. section mode for catalog)
    #[error("Mode '{mode}' is not allowed for domain '{domain}'")]
    ModeNotAllowed {
        /// Requested domain
        domain: Domain,
        /// Requested mode
        mode: Mode,
    },

    /// Flashcard keys must name a card kind
    #[error("Domain '{0}' requires a card kind")]
    CardKindRequired(Domain),

    /// Catalog keys must not name a card kind
    #[error("Domain '{domain}' does not take a card kind (got '{kind}')")]
    UnexpectedCardKind {
        /// Requested domain
        domain: Domain,
        /// The card kind that was supplied
        kind: CardKind,
    },
}
