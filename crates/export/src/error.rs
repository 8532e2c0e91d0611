//! Export errors.

/// Result alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors that can occur while exporting or reading back a deck.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Nothing to export; no file is produced
    #[error("No cards to export")]
    EmptyCardList,

    /// Card kind not recognised
    #[error("Unsupported card kind: {0}")]
    UnsupportedCardKind(String),

    /// A card cannot be rendered into the job's note type
    #[error("Card {index} does not fit the note type: {reason}")]
    SchemaMismatch {
        /// Position of the card in the job
        index: usize,
        /// What was wrong
        reason: String,
    },

    /// Two media files share a name but not their content
    #[error("Media file '{0}' supplied twice with different content")]
    DuplicateMedia(String),

    /// Writing or reading the output failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

/// Low-level failure behind [`ExportError::Serialization`].
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// Zip error
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed delimited text
    #[error("CSV error on record {record}: {reason}")]
    Csv {
        /// 1-based record number, header included
        record: usize,
        /// What was wrong
        reason: String,
    },
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Serialization(err.into())
    }
}

impl From<sqlx::Error> for ExportError {
    fn from(err: sqlx::Error) -> Self {
        ExportError::Serialization(err.into())
    }
}

impl From<zip::result::ZipError> for ExportError {
    fn from(err: zip::result::ZipError) -> Self {
        ExportError::Serialization(err.into())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Serialization(err.into())
    }
}
