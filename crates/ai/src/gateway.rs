//! AI gateway abstraction.

use async_trait::async_trait;
use std::path::Path;

/// Errors raised by a gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Transport failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("Provider returned {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Provider error message, or the raw body
        message: String,
    },

    /// Provider answered 2xx but the body had no completion text
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    /// Anything else (used by non-HTTP gateways)
    #[error("{0}")]
    Other(String),
}

/// A file handed to the model alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name, as referenced by the `FILENAME` placeholder
    pub file_name: String,
    /// File content
    pub content: String,
}

impl Attachment {
    /// Create an attachment from in-memory content.
    pub fn new(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self { file_name: file_name.into(), content: content.into() }
    }

    /// Read a UTF-8 file from disk.
    pub async fn read(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { file_name, content })
    }
}

/// Text completion provider.
///
/// Implementations must be cheap to call concurrently; the workflow keeps no
/// state between calls.
#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Complete `prompt`, optionally with an attached file.
    ///
    /// With `stream` set the provider may deliver the answer incrementally;
    /// the returned string is always the full text.
    async fn complete(
        &self,
        prompt: &str,
        attachment: Option<&Attachment>,
        stream: bool,
    ) -> Result<String, GatewayError>;
}
