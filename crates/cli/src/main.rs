//! deckgen CLI - AI flashcard generation and Anki export.

mod config;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use deckgen_ai::{
    integrity, Attachment, CatalogRequest, FlashcardRequest, OpenAiCompatGateway, Orchestrator,
    Source, WorkflowError,
};
use deckgen_core::{
    filter, partition, CardKind, CatalogEntry, ExportFormat, ExportJob, Flashcard,
    IntegrityRecord, Language, MediaFile, Mode, ReviewStatus,
};
use deckgen_export::{exporter_for, DeckExporter};
use deckgen_prompts::{PromptResolver, TemplateStore};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "deckgen")]
#[command(about = "Generate flashcards with an LLM and export them to Anki", long_about = None)]
struct Cli {
    /// Config file (default: ./deckgen.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where the material comes from.
#[derive(Args)]
struct SourceArgs {
    /// Topic to outline or generate cards about
    #[arg(long)]
    topic: Option<String>,
    /// Read source text from a file
    #[arg(long, conflicts_with = "attach")]
    text_file: Option<PathBuf>,
    /// Send a file to the model as an attachment
    #[arg(long)]
    attach: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse a topic or document into a chapter/section outline
    Catalog {
        #[command(flatten)]
        source: SourceArgs,
        /// topic | full
        #[arg(long)]
        mode: Option<Mode>,
        /// zh | en | ja
        #[arg(long, default_value = "en")]
        lang: Language,
        /// Recorded length of the source text
        #[arg(long)]
        recorded_length: Option<usize>,
        /// Write the outline here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate flashcards
    Generate {
        /// basic | cloze | multiple_choice
        #[arg(long)]
        kind: CardKind,
        #[command(flatten)]
        source: SourceArgs,
        /// topic | full | section
        #[arg(long)]
        mode: Option<Mode>,
        /// Section to focus on (section mode)
        #[arg(long, conflicts_with = "section")]
        section_title: Option<String>,
        /// Outline JSON written by `deckgen catalog`
        #[arg(long, requires = "section")]
        catalog: Option<PathBuf>,
        /// Id of a catalog node, e.g. "2.1"
        #[arg(long, requires = "catalog")]
        section: Option<String>,
        /// Maximum number of cards
        #[arg(long, default_value = "10")]
        count: usize,
        /// zh | en | ja
        #[arg(long, default_value = "en")]
        lang: Language,
        /// Recorded length of the source text
        #[arg(long)]
        recorded_length: Option<usize>,
        /// Write the cards here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Export reviewed cards
    Export {
        /// JSON array of cards
        #[arg(long)]
        cards: PathBuf,
        /// basic | cloze | multiple_choice
        #[arg(long)]
        kind: CardKind,
        /// package | tabular
        #[arg(long, default_value = "package")]
        format: ExportFormat,
        /// Deck name
        #[arg(long, default_value = "deckgen")]
        deck: String,
        /// Statuses to export
        #[arg(long, value_delimiter = ',', default_value = "approved")]
        status: Vec<ReviewStatus>,
        /// Note tags (default from config)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Media files to ship with the package
        #[arg(long, num_args = 1..)]
        media: Vec<PathBuf>,
        /// Output directory (default from config)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Compare a text file against a recorded length
    Check {
        #[arg(long)]
        recorded_length: usize,
        #[arg(long)]
        text_file: PathBuf,
    },
    /// List the loaded prompt templates
    Templates {
        /// Fail unless every legal key has a template
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_logging(&config.log_level);
    config.log_source();

    let result = run(cli.command, &config).await;
    if let Err(e) = &result {
        match e.downcast_ref::<WorkflowError>() {
            Some(workflow) => error!(kind = ?workflow.kind(), "{}", workflow),
            None => error!("{:#}", e),
        }
    }
    result
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Catalog { source, mode, lang, recorded_length, out } => {
            let orchestrator = orchestrator(config).await?;
            let topic = source.topic.clone();
            let mut request = match read_source(&source).await? {
                Source::Topic => {
                    let Some(topic) = topic.clone() else {
                        bail!("one of --topic, --text-file or --attach is required");
                    };
                    CatalogRequest::from_topic(topic, lang)
                }
                Source::Text(text) => CatalogRequest::from_text(text, lang),
                Source::File(file) => CatalogRequest::from_file(file, lang),
            };
            if let Some(topic) = topic.filter(|_| request.topic.is_none()) {
                request = request.with_topic(topic);
            }
            if let Some(mode) = mode {
                request = request.with_mode(mode);
            }
            if let Some(length) = recorded_length {
                request = request.with_integrity(IntegrityRecord::with_length(length));
            }

            let catalog = orchestrator.analyze_catalog(&request).await?;
            let sections: usize = catalog.iter().map(|c| c.section_count()).sum();
            info!(chapters = catalog.len(), sections, "Outline ready");
            write_json(&catalog, out.as_deref()).await?;
        }
        Commands::Generate {
            kind,
            source,
            mode,
            section_title,
            catalog,
            section,
            count,
            lang,
            recorded_length,
            out,
        } => {
            let orchestrator = orchestrator(config).await?;
            let material = read_source(&source).await?;
            let mode = mode.unwrap_or(match (&material, &section_title) {
                (_, Some(_)) => Mode::Section,
                (Source::Topic, None) => Mode::Topic,
                _ => Mode::Full,
            });

            let mut request = FlashcardRequest::new(kind, material, mode, lang, count);
            if let Some(topic) = source.topic {
                request = request.with_topic(topic);
            }
            if let Some(title) = section_title {
                request = request.with_section(None, title);
            }
            if let Some(length) = recorded_length {
                request = request.with_integrity(IntegrityRecord::with_length(length));
            }

            let cards = match (catalog, section) {
                (Some(path), Some(id)) => {
                    let outline: Vec<CatalogEntry> = read_json(&path).await?;
                    orchestrator.generate_for_section(&outline, &id, request).await?
                }
                _ => orchestrator.generate_flashcards(&request).await?,
            };
            info!(kind = %kind, cards = cards.len(), "Cards ready for review");
            write_json(&cards, out.as_deref()).await?;
        }
        Commands::Export { cards, kind, format, deck, status, tags, media, output_dir } => {
            let all: Vec<Flashcard> = read_json(&cards).await?;
            let buckets = partition(&all);
            println!(
                "Cards: {} approved, {} rejected, {} flagged, {} pending",
                buckets.approved.len(),
                buckets.rejected.len(),
                buckets.flagged.len(),
                buckets.pending.len(),
            );

            let selected = filter(&all, &status);
            let tags = if tags.is_empty() { vec![config.export.default_tag.clone()] } else { tags };
            let mut job = ExportJob::new(deck, kind, selected, format).with_tags(tags);
            for path in &media {
                job = job.with_media(read_media(path).await?);
            }

            let output_dir = output_dir.unwrap_or_else(|| config.export.output_dir.clone());
            let artifact = exporter_for(format, output_dir).export(&job).await?;
            println!(
                "Exported {} card(s) to {} ({} bytes)",
                artifact.card_count,
                artifact.path.display(),
                artifact.size_bytes
            );
        }
        Commands::Check { recorded_length, text_file } => {
            let text = tokio::fs::read_to_string(&text_file)
                .await
                .with_context(|| format!("Failed to read {}", text_file.display()))?;
            integrity::check(Some(recorded_length), &text)?;
            println!("OK: {} characters", text.chars().count());
        }
        Commands::Templates { validate } => {
            let store = load_store(config).await?;
            for key in store.keys() {
                println!("{}", key);
            }
            println!("{} template(s)", store.len());

            if validate {
                let missing = store.missing_keys();
                if !missing.is_empty() {
                    for key in &missing {
                        println!("missing: {}", key);
                    }
                    bail!("{} prompt key(s) have no template", missing.len());
                }
                println!("Every prompt key has a template");
            }
        }
    }

    Ok(())
}

async fn load_store(config: &Config) -> Result<TemplateStore> {
    let store = match &config.prompts.template_path {
        Some(path) => TemplateStore::load(path)
            .await
            .with_context(|| format!("Failed to load templates from {}", path.display()))?,
        None => TemplateStore::builtin()?,
    };
    debug!(templates = store.len(), "Template store ready");
    Ok(store)
}

async fn orchestrator(config: &Config) -> Result<Orchestrator> {
    let store = Arc::new(load_store(config).await?);
    let gateway = Arc::new(OpenAiCompatGateway::new(config.gateway_config()));
    Ok(Orchestrator::new(PromptResolver::new(store), gateway).with_streaming(config.ai.stream))
}

async fn read_source(args: &SourceArgs) -> Result<Source> {
    if let Some(path) = &args.text_file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(Source::Text(text));
    }
    if let Some(path) = &args.attach {
        let file = Attachment::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(Source::File(file));
    }
    Ok(Source::Topic)
}

async fn read_media(path: &Path) -> Result<MediaFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read media {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Media path {} has no file name", path.display()))?;
    Ok(MediaFile::new(name, data))
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn write_json<T: serde::Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
