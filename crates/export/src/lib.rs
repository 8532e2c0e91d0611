//! Deck export for deckgen.
//!
//! Approved cards are written either as an Anki package (`.apkg`) or as a CSV
//! file. Both exporters implement [`DeckExporter`].

#![warn(missing_docs)]

pub mod error;
pub mod exporter;
pub mod note_type;
pub mod collection;
pub mod package;
pub mod tabular;

use std::path::PathBuf;

use deckgen_core::ExportFormat;

pub use error::{ExportError, Result, SerializationError};
pub use exporter::{DeckExporter, ExportArtifact};
pub use note_type::NoteType;
pub use package::PackageExporter;
pub use tabular::{parse_cards, read_cards, TabularExporter};

/// Exporter for `format`, writing into `output_dir`.
pub fn exporter_for(format: ExportFormat, output_dir: impl Into<PathBuf>) -> Box<dyn DeckExporter> {
    match format {
        ExportFormat::Package => Box::new(PackageExporter::new(output_dir)),
        ExportFormat::Tabular => Box::new(TabularExporter::new(output_dir)),
    }
}
