//! Anki package (`.apkg`) exporter.
//!
//! A package is a zip holding `collection.anki2`, a `media` manifest mapping
//! numbered entries to file names, and the numbered media entries themselves.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use deckgen_core::{ExportFormat, ExportJob, MediaFile};

use crate::collection::{write_collection, DeckIds};
use crate::error::{Result, SerializationError};
use crate::exporter::{
    artifact_file_name, commit, dedup_media, discard, part_path, validate_cards, DeckExporter,
    ExportArtifact,
};

/// Name of the collection entry inside the archive.
pub const COLLECTION_ENTRY: &str = "collection.anki2";
/// Name of the media manifest entry inside the archive.
pub const MEDIA_ENTRY: &str = "media";

/// Writes `.apkg` files into an output directory.
#[derive(Debug, Clone)]
pub struct PackageExporter {
    output_dir: PathBuf,
}

impl PackageExporter {
    /// Create an exporter writing into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    async fn build(&self, job: &ExportJob, media: Vec<MediaFile>, archive: &Path) -> Result<()> {
        let collection = archive.with_extension("anki2.part");
        let result = self.build_with_collection(job, media, archive, &collection).await;
        discard(&collection).await;
        result
    }

    async fn build_with_collection(
        &self,
        job: &ExportJob,
        media: Vec<MediaFile>,
        archive: &Path,
        collection: &Path,
    ) -> Result<()> {
        write_collection(collection, job, DeckIds::random()).await?;

        let collection = collection.to_path_buf();
        let archive = archive.to_path_buf();
        tokio::task::spawn_blocking(move || write_archive(&archive, &collection, &media))
            .await
            .map_err(|e| SerializationError::Io(std::io::Error::other(e)))?
    }
}

#[async_trait]
impl DeckExporter for PackageExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Package
    }

    async fn export(&self, job: &ExportJob) -> Result<ExportArtifact> {
        validate_cards(job)?;
        let media: Vec<MediaFile> = dedup_media(&job.media)?.into_iter().cloned().collect();

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let file_name = artifact_file_name(job, ExportFormat::Package);
        let path = self.output_dir.join(&file_name);
        let part = part_path(&path);

        if let Err(e) = self.build(job, media, &part).await {
            warn!("Package export failed, removing partial output: {}", e);
            discard(&part).await;
            return Err(e);
        }
        let size_bytes = commit(&part, &path).await?;

        info!(
            deck = %job.deck_name,
            kind = %job.card_kind,
            cards = job.cards.len(),
            size_bytes,
            "Exported package {}",
            path.display()
        );

        Ok(ExportArtifact {
            path,
            file_name,
            format: ExportFormat::Package,
            card_count: job.cards.len(),
            size_bytes,
        })
    }
}

fn write_archive(archive: &Path, collection: &Path, media: &[MediaFile]) -> Result<()> {
    let file = File::create(archive)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    zip.start_file(COLLECTION_ENTRY, options)?;
    zip.write_all(&std::fs::read(collection)?)?;

    // entry name -> original file name
    let manifest: BTreeMap<String, &str> = media
        .iter()
        .enumerate()
        .map(|(idx, file)| (idx.to_string(), file.file_name.as_str()))
        .collect();
    zip.start_file(MEDIA_ENTRY, options)?;
    zip.write_all(serde_json::to_string(&manifest)?.as_bytes())?;

    for (idx, file) in media.iter().enumerate() {
        zip.start_file(idx.to_string(), options)?;
        zip.write_all(&file.data)?;
    }

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportError;
    use deckgen_core::{CardKind, Flashcard, ReviewStatus};
    use sqlx::sqlite::SqliteConnectOptions;
    use sqlx::{ConnectOptions, Row};
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    /// Unpack `collection.anki2` and the media manifest from a package.
    fn unpack(package: &Path, into: &Path) -> (PathBuf, serde_json::Value, Vec<String>) {
        let mut archive = ZipArchive::new(File::open(package).unwrap()).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();

        let mut collection = Vec::new();
        archive.by_name(COLLECTION_ENTRY).unwrap().read_to_end(&mut collection).unwrap();
        let db_path = into.join("collection.anki2");
        std::fs::write(&db_path, collection).unwrap();

        let mut manifest = String::new();
        archive.by_name(MEDIA_ENTRY).unwrap().read_to_string(&mut manifest).unwrap();
        (db_path, serde_json::from_str(&manifest).unwrap(), names)
    }

    async fn count(db: &Path, table: &str) -> i64 {
        let mut conn = SqliteConnectOptions::new().filename(db).connect().await.unwrap();
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&mut conn)
            .await
            .unwrap()
    }

    fn basic_cards(n: usize) -> Vec<Flashcard> {
        (0..n)
            .map(|i| {
                Flashcard::basic(format!("Question {}", i), format!("Answer {}", i))
                    .with_status(ReviewStatus::Approved)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_basic_package_has_one_card_per_note() {
        let dir = TempDir::new().unwrap();
        let exporter = PackageExporter::new(dir.path().join("out"));
        let job = ExportJob::new("Rust Basics", CardKind::Basic, basic_cards(3), ExportFormat::Package);

        let artifact = exporter.export(&job).await.unwrap();
        assert_eq!(artifact.card_count, 3);
        assert!(artifact.size_bytes > 0);
        assert!(artifact.file_name.starts_with("Rust_Basics_basic_"));
        assert!(artifact.path.exists());

        let (db, manifest, names) = unpack(&artifact.path, dir.path());
        assert_eq!(count(&db, "notes").await, 3);
        assert_eq!(count(&db, "cards").await, 3);
        assert_eq!(manifest, serde_json::json!({}));
        assert!(names.contains(&COLLECTION_ENTRY.to_string()));

        // no leftovers next to the package
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".part"))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[tokio::test]
    async fn test_collection_metadata() {
        let dir = TempDir::new().unwrap();
        let exporter = PackageExporter::new(dir.path());
        let job = ExportJob::new("Deck A", CardKind::Basic, basic_cards(1), ExportFormat::Package)
            .with_tags(vec!["rust".to_string(), "ch 1".to_string()]);

        let artifact = exporter.export(&job).await.unwrap();
        let (db, _, _) = unpack(&artifact.path, dir.path());

        let mut conn = SqliteConnectOptions::new().filename(&db).connect().await.unwrap();
        let row = sqlx::query("SELECT ver, models, decks FROM col").fetch_one(&mut conn).await.unwrap();
        assert_eq!(row.get::<i64, _>("ver"), 11);

        let models: serde_json::Value = serde_json::from_str(&row.get::<String, _>("models")).unwrap();
        let model = models.as_object().unwrap().values().next().unwrap();
        assert_eq!(model["name"], "Basic Card");

        let decks: serde_json::Value = serde_json::from_str(&row.get::<String, _>("decks")).unwrap();
        let names: Vec<&str> = decks
            .as_object()
            .unwrap()
            .values()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"Default"));
        assert!(names.contains(&"Deck A"));

        let note = sqlx::query("SELECT flds, tags, CAST(sfld AS TEXT) AS sfld FROM notes").fetch_one(&mut conn).await.unwrap();
        assert_eq!(note.get::<String, _>("flds"), "Question 0\x1fAnswer 0");
        assert_eq!(note.get::<String, _>("tags"), " rust ch_1 ");
        assert_eq!(note.get::<String, _>("sfld"), "Question 0");
    }

    #[tokio::test]
    async fn test_multiple_choice_package() {
        let dir = TempDir::new().unwrap();
        let exporter = PackageExporter::new(dir.path());
        let cards = vec![
            Flashcard::multiple_choice("Largest planet?", vec!["Mars".into(), "Jupiter".into()], 1),
            Flashcard::multiple_choice(
                "Borrow checker runs at?",
                vec!["Compile time".into(), "Run time".into(), "Link time".into()],
                0,
            ),
        ];
        let job = ExportJob::new("Quiz", CardKind::MultipleChoice, cards, ExportFormat::Package);

        let artifact = exporter.export(&job).await.unwrap();
        let (db, _, _) = unpack(&artifact.path, dir.path());
        assert_eq!(count(&db, "notes").await, 2);
        assert_eq!(count(&db, "cards").await, 2);

        let mut conn = SqliteConnectOptions::new().filename(&db).connect().await.unwrap();
        let models: String = sqlx::query_scalar("SELECT models FROM col").fetch_one(&mut conn).await.unwrap();
        let models: serde_json::Value = serde_json::from_str(&models).unwrap();
        let model = models.as_object().unwrap().values().next().unwrap();
        assert_eq!(model["name"], "Multiple Choice Card");
        assert_eq!(model["type"], 0);
        let field_names: Vec<&str> = model["flds"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap())
            .collect();
        assert_eq!(field_names, vec!["Question", "Options", "Answer"]);

        let flds = sqlx::query_scalar::<_, String>("SELECT flds FROM notes ORDER BY id")
            .fetch_all(&mut conn)
            .await
            .unwrap();
        assert_eq!(flds[0], "Largest planet?\x1fA. Mars<br>B. Jupiter\x1fB. Jupiter");
        assert_eq!(
            flds[1],
            "Borrow checker runs at?\x1fA. Compile time<br>B. Run time<br>C. Link time\x1fA. Compile time"
        );
    }

    #[tokio::test]
    async fn test_cloze_card_per_ordinal() {
        let dir = TempDir::new().unwrap();
        let exporter = PackageExporter::new(dir.path());
        let cards = vec![
            Flashcard::cloze("{{c1::Rust}} 1.0 shipped in {{c2::2015}}"),
            Flashcard::cloze("{{c1::Cargo}} is the build tool"),
        ];
        let job = ExportJob::new("Cloze", CardKind::Cloze, cards, ExportFormat::Package);

        let artifact = exporter.export(&job).await.unwrap();
        let (db, _, _) = unpack(&artifact.path, dir.path());
        assert_eq!(count(&db, "notes").await, 2);
        assert_eq!(count(&db, "cards").await, 3);

        let mut conn = SqliteConnectOptions::new().filename(&db).connect().await.unwrap();
        let ords = sqlx::query_scalar::<_, i64>("SELECT ord FROM cards ORDER BY id")
            .fetch_all(&mut conn)
            .await
            .unwrap();
        assert_eq!(ords, vec![0, 1, 0]);
    }

    #[tokio::test]
    async fn test_media_manifest() {
        let dir = TempDir::new().unwrap();
        let exporter = PackageExporter::new(dir.path());
        let job = ExportJob::new(
            "Media",
            CardKind::Basic,
            vec![Flashcard::basic("<img src=\"diagram.png\">", "A diagram")],
            ExportFormat::Package,
        )
        .with_media(MediaFile::new("diagram.png", vec![0x89, b'P', b'N', b'G']))
        .with_media(MediaFile::new("diagram.png", vec![0x89, b'P', b'N', b'G']))
        .with_media(MediaFile::new("notes.txt", b"hello".to_vec()));

        let artifact = exporter.export(&job).await.unwrap();
        let (_, manifest, names) = unpack(&artifact.path, dir.path());
        assert_eq!(manifest, serde_json::json!({"0": "diagram.png", "1": "notes.txt"}));
        assert!(names.contains(&"0".to_string()));
        assert!(names.contains(&"1".to_string()));

        let mut archive = ZipArchive::new(File::open(&artifact.path).unwrap()).unwrap();
        let mut data = Vec::new();
        archive.by_name("1").unwrap().read_to_end(&mut data).unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_failures_write_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let exporter = PackageExporter::new(&out);

        let empty = ExportJob::new("Empty", CardKind::Basic, vec![], ExportFormat::Package);
        assert!(matches!(exporter.export(&empty).await, Err(ExportError::EmptyCardList)));

        let mismatch = ExportJob::new(
            "Mixed",
            CardKind::MultipleChoice,
            vec![Flashcard::multiple_choice("q", vec!["only".to_string()], 0)],
            ExportFormat::Package,
        );
        assert!(matches!(
            exporter.export(&mismatch).await,
            Err(ExportError::SchemaMismatch { index: 0, .. })
        ));

        let clash = ExportJob::new("Clash", CardKind::Basic, basic_cards(1), ExportFormat::Package)
            .with_media(MediaFile::new("a.png", vec![1]))
            .with_media(MediaFile::new("a.png", vec![2]));
        assert!(matches!(exporter.export(&clash).await, Err(ExportError::DuplicateMedia(_))));

        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_concurrent_exports_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let exporter = PackageExporter::new(dir.path());
        let job = ExportJob::new("Same", CardKind::Basic, basic_cards(2), ExportFormat::Package);

        let (a, b) = tokio::join!(exporter.export(&job), exporter.export(&job));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.path, b.path);
        assert!(a.path.exists() && b.path.exists());
    }
}
