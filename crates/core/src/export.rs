//! Export job model.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::card::Flashcard;
use crate::error::{CoreError, Result};
use crate::key::CardKind;

/// Tag applied to exported notes when the caller supplies none.
pub const DEFAULT_TAG: &str = "deckgen";

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Anki package (`.apkg`)
    Package,
    /// Delimited text (`.csv`)
    Tabular,
}

impl ExportFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Package => "apkg",
            ExportFormat::Tabular => "csv",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Package => f.write_str("package"),
            ExportFormat::Tabular => f.write_str("tabular"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "package" | "apkg" => Ok(ExportFormat::Package),
            "tabular" | "csv" => Ok(ExportFormat::Tabular),
            _ => Err(CoreError::UnknownValue { field: "export format", value: s.to_string() }),
        }
    }
}

/// A media file shipped inside a package.
///
/// Card fields reference it by `file_name` (e.g. `<img src="diagram.png">`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    /// Name referenced from card fields
    pub file_name: String,
    /// Raw bytes
    pub data: Vec<u8>,
}

impl MediaFile {
    /// Create a media file.
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), data }
    }
}

/// One export request. Not persisted.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Deck name shown in the importing application
    pub deck_name: String,
    /// Kind every card must have
    pub card_kind: CardKind,
    /// Approved cards, in deck order
    pub cards: Vec<Flashcard>,
    /// Output container
    pub format: ExportFormat,
    /// Tags attached to every note
    pub tags: Vec<String>,
    /// Media shipped with the package
    pub media: Vec<MediaFile>,
}

impl ExportJob {
    /// Create a job with the default tag and no media.
    pub fn new(
        deck_name: impl Into<String>,
        card_kind: CardKind,
        cards: Vec<Flashcard>,
        format: ExportFormat,
    ) -> Self {
        Self {
            deck_name: deck_name.into(),
            card_kind,
            cards,
            format,
            tags: vec![DEFAULT_TAG.to_string()],
            media: Vec::new(),
        }
    }

    /// Replace the tag list.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Attach a media file.
    pub fn with_media(mut self, media: MediaFile) -> Self {
        self.media.push(media);
        self
    }

    /// Tags joined the way both output formats store them.
    pub fn tag_string(&self) -> String {
        self.tags
            .iter()
            .map(|t| t.trim().replace(' ', "_"))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
