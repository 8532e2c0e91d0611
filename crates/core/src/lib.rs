//! deckgen core data models.
//!
//! This crate defines the closed prompt-key enumerations and the domain records
//! (catalog entries, flashcards, export jobs) shared by every other crate.

#![warn(missing_docs)]

// Core identities
mod id;
mod error;

// Prompt matrix
mod key;

// Generated records
mod catalog;
mod card;

// Review and export
mod review;
mod export;
mod integrity;

// Re-exports
pub use id::*;
pub use error::{CoreError, Result};

pub use key::{Domain, CardKind, InputForm, Mode, Language, PromptKey, Subject};

pub use catalog::{CatalogEntry, CatalogSection, CatalogNode};
pub use card::{Flashcard, CardContent, ReviewStatus};

pub use review::{filter, partition, ReviewBuckets};
pub use export::{ExportJob, ExportFormat, MediaFile, DEFAULT_TAG};
pub use integrity::IntegrityRecord;
