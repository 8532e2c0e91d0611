//! Exporter trait and the plumbing shared by every output format.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use deckgen_core::{ExportFormat, ExportId, ExportJob, MediaFile};

use crate::error::{ExportError, Result};

/// A file produced by an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    /// Full path of the written file
    pub path: PathBuf,
    /// File name only
    pub file_name: String,
    /// Output container
    pub format: ExportFormat,
    /// Number of exported cards (notes, for packages)
    pub card_count: usize,
    /// File size in bytes
    pub size_bytes: u64,
}

/// Serializes an [`ExportJob`] into one file.
///
/// Implementations validate the whole job before touching the filesystem and
/// never leave a partial file behind.
#[async_trait]
pub trait DeckExporter: Send + Sync {
    /// Format this exporter produces.
    fn format(&self) -> ExportFormat;

    /// Export the job into the exporter's output directory.
    async fn export(&self, job: &ExportJob) -> Result<ExportArtifact>;
}

/// Check every card against the job's card kind and its own shape.
pub fn validate_cards(job: &ExportJob) -> Result<()> {
    if job.cards.is_empty() {
        return Err(ExportError::EmptyCardList);
    }
    for (index, card) in job.cards.iter().enumerate() {
        if card.kind() != job.card_kind {
            return Err(ExportError::SchemaMismatch {
                index,
                reason: format!("expected a {} card, got {}", job.card_kind, card.kind()),
            });
        }
        card.content
            .check_shape()
            .map_err(|reason| ExportError::SchemaMismatch { index, reason })?;
    }
    Ok(())
}

/// Media files with identical duplicates collapsed, in first-seen order.
pub fn dedup_media(media: &[MediaFile]) -> Result<Vec<&MediaFile>> {
    let mut seen: HashMap<&str, &MediaFile> = HashMap::new();
    let mut unique = Vec::new();
    for file in media {
        match seen.get(file.file_name.as_str()) {
            Some(existing) if existing.data == file.data => continue,
            Some(_) => return Err(ExportError::DuplicateMedia(file.file_name.clone())),
            None => {
                seen.insert(&file.file_name, file);
                unique.push(file);
            }
        }
    }
    Ok(unique)
}

/// Output file name, unique per call.
///
/// Packages: `{deck}_{kind}_{unix_ts}_{ulid}.apkg`;
/// tables: `cards_{kind}_{unix_ts}_{ulid}.csv`.
pub fn artifact_file_name(job: &ExportJob, format: ExportFormat) -> String {
    let ts = chrono::Utc::now().timestamp();
    let id = ExportId::new();
    let prefix = match format {
        ExportFormat::Package => sanitize_deck_name(&job.deck_name),
        ExportFormat::Tabular => "cards".to_string(),
    };
    format!("{}_{}_{}_{}.{}", prefix, job.card_kind, ts, id, format.extension())
}

fn sanitize_deck_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "deck".to_string()
    } else {
        cleaned
    }
}

/// Sibling path written to before the final rename.
pub(crate) fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Move a finished `.part` file into place and report its size.
pub(crate) async fn commit(part: &Path, dest: &Path) -> Result<u64> {
    tokio::fs::rename(part, dest).await?;
    Ok(tokio::fs::metadata(dest).await?.len())
}

/// Best-effort removal of an abandoned file.
pub(crate) async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove partial file {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckgen_core::{CardKind, Flashcard};

    fn job(cards: Vec<Flashcard>) -> ExportJob {
        ExportJob::new("My Rust Deck", CardKind::Basic, cards, ExportFormat::Package)
    }

    #[test]
    fn test_validate_rejects_empty_and_mixed() {
        assert!(matches!(validate_cards(&job(vec![])), Err(ExportError::EmptyCardList)));

        let mixed = job(vec![Flashcard::basic("q", "a"), Flashcard::cloze("{{c1::x}}")]);
        match validate_cards(&mixed) {
            Err(ExportError::SchemaMismatch { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected result: {other:?}"),
        }

        let blank = job(vec![Flashcard::basic(" ", "a")]);
        assert!(matches!(validate_cards(&blank), Err(ExportError::SchemaMismatch { index: 0, .. })));
    }

    #[test]
    fn test_dedup_media() {
        let media = vec![
            MediaFile::new("a.png", vec![1, 2]),
            MediaFile::new("b.png", vec![3]),
            MediaFile::new("a.png", vec![1, 2]),
        ];
        let unique = dedup_media(&media).unwrap();
        assert_eq!(unique.len(), 2);

        let clash = vec![MediaFile::new("a.png", vec![1]), MediaFile::new("a.png", vec![2])];
        assert!(matches!(dedup_media(&clash), Err(ExportError::DuplicateMedia(ref n)) if n == "a.png"));
    }

    #[test]
    fn test_file_names_unique_and_shaped() {
        let job = job(vec![Flashcard::basic("q", "a")]);
        let first = artifact_file_name(&job, ExportFormat::Package);
        let second = artifact_file_name(&job, ExportFormat::Package);
        assert_ne!(first, second);
        assert!(first.starts_with("My_Rust_Deck_basic_"));
        assert!(first.ends_with(".apkg"));

        let csv = artifact_file_name(&job, ExportFormat::Tabular);
        assert!(csv.starts_with("cards_basic_"));
        assert!(csv.ends_with(".csv"));
    }

    #[test]
    fn test_part_path() {
        assert_eq!(part_path(Path::new("/tmp/x.apkg")), PathBuf::from("/tmp/x.apkg.part"));
    }
}
