//! Workflow orchestrator: resolver -> gateway -> parser.
//!
//! Two pipelines, catalog analysis and flashcard generation. Each resolves one
//! prompt, calls the gateway, and parses the answer; an unparsable answer is
//! retried exactly once with the same prompt. Nothing is persisted.

use std::sync::Arc;
use tracing::{debug, info, warn};

use deckgen_core::{
    CardKind, CatalogEntry, Domain, Flashcard, InputForm, IntegrityRecord, Language, Mode,
};
use deckgen_prompts::{PromptResolver, ResolvedPrompt, Variables};

use crate::error::{Result, WorkflowError};
use crate::gateway::{AiGateway, Attachment};
use crate::integrity;
use crate::parser;

/// Gateway calls allowed per request (the first try plus one retry).
pub const MAX_ATTEMPTS: u32 = 2;

/// Source material for a request.
#[derive(Debug, Clone)]
pub enum Source {
    /// No material; the topic alone drives generation
    Topic,
    /// Inline text
    Text(String),
    /// Attached file
    File(Attachment),
}

impl Source {
    /// Input form used to pick the template partition.
    pub fn input_form(&self) -> InputForm {
        match self {
            Source::Topic | Source::Text(_) => InputForm::Text,
            Source::File(_) => InputForm::File,
        }
    }

    fn attachment(&self) -> Option<&Attachment> {
        match self {
            Source::File(file) => Some(file),
            _ => None,
        }
    }
}

/// Catalog analysis request.
#[derive(Debug, Clone)]
pub struct CatalogRequest {
    /// Subject of the outline
    pub topic: Option<String>,
    /// Source material
    pub source: Source,
    /// Topic or full (section is rejected)
    pub mode: Mode,
    /// Prompt and output language
    pub language: Language,
    /// Recorded content length, if the task layer captured one
    pub integrity: Option<IntegrityRecord>,
}

impl CatalogRequest {
    /// Outline a topic.
    pub fn from_topic(topic: impl Into<String>, language: Language) -> Self {
        Self {
            topic: Some(topic.into()),
            source: Source::Topic,
            mode: Mode::Topic,
            language,
            integrity: None,
        }
    }

    /// Outline a piece of text.
    pub fn from_text(content: impl Into<String>, language: Language) -> Self {
        Self {
            topic: None,
            source: Source::Text(content.into()),
            mode: Mode::Full,
            language,
            integrity: None,
        }
    }

    /// Outline an attached file.
    pub fn from_file(file: Attachment, language: Language) -> Self {
        Self { topic: None, source: Source::File(file), mode: Mode::Full, language, integrity: None }
    }

    /// Override the mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Attach an integrity record.
    pub fn with_integrity(mut self, record: IntegrityRecord) -> Self {
        self.integrity = Some(record);
        self
    }
}

/// Flashcard generation request.
#[derive(Debug, Clone)]
pub struct FlashcardRequest {
    /// Kind of card to generate
    pub card_kind: CardKind,
    /// Subject of the cards
    pub topic: Option<String>,
    /// Source material
    pub source: Source,
    /// Topic, full or section
    pub mode: Mode,
    /// Prompt and output language
    pub language: Language,
    /// Section title (section mode)
    pub section_title: Option<String>,
    /// Catalog node the cards belong to
    pub section_id: Option<String>,
    /// Upper bound on returned cards
    pub count: usize,
    /// Recorded content length, if the task layer captured one
    pub integrity: Option<IntegrityRecord>,
}

impl FlashcardRequest {
    /// Create a request.
    pub fn new(card_kind: CardKind, source: Source, mode: Mode, language: Language, count: usize) -> Self {
        Self {
            card_kind,
            topic: None,
            source,
            mode,
            language,
            section_title: None,
            section_id: None,
            count,
            integrity: None,
        }
    }

    /// Set the topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Scope the request to one section.
    pub fn with_section(mut self, id: Option<String>, title: impl Into<String>) -> Self {
        self.mode = Mode::Section;
        self.section_id = id;
        self.section_title = Some(title.into());
        self
    }

    /// Attach an integrity record.
    pub fn with_integrity(mut self, record: IntegrityRecord) -> Self {
        self.integrity = Some(record);
        self
    }
}

/// Runs the generation pipelines.
pub struct Orchestrator {
    resolver: PromptResolver,
    gateway: Arc<dyn AiGateway>,
    stream: bool,
}

impl Orchestrator {
    /// Create an orchestrator.
    pub fn new(resolver: PromptResolver, gateway: Arc<dyn AiGateway>) -> Self {
        Self { resolver, gateway, stream: false }
    }

    /// Ask the gateway to stream responses.
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Analyse a topic or document into a chapter/section outline.
    pub async fn analyze_catalog(&self, request: &CatalogRequest) -> Result<Vec<CatalogEntry>> {
        check_integrity(request.integrity.as_ref(), request.topic.as_deref(), &request.source)?;

        let vars = variables(request.language, request.topic.as_deref(), &request.source, None, None);
        let prompt = self.resolver.resolve(
            Domain::Catalog,
            None,
            request.source.input_form(),
            request.mode,
            request.language,
            &vars,
        )?;

        let entries = self
            .complete_with_retry(&prompt, request.source.attachment(), |raw| {
                parser::parse_catalog(raw).into_catalog()
            })
            .await?;

        info!(key = %prompt.key, chapters = entries.len(), "Catalog analysis finished");
        Ok(entries)
    }

    /// Generate up to `request.count` cards of `request.card_kind`.
    pub async fn generate_flashcards(&self, request: &FlashcardRequest) -> Result<Vec<Flashcard>> {
        if request.count == 0 {
            return Err(WorkflowError::InvalidCount);
        }
        check_integrity(request.integrity.as_ref(), request.topic.as_deref(), &request.source)?;

        let vars = variables(
            request.language,
            request.topic.as_deref(),
            &request.source,
            request.section_title.as_deref(),
            Some(request.count),
        );
        let prompt = self.resolver.resolve(
            Domain::Flashcard,
            Some(request.card_kind),
            request.source.input_form(),
            request.mode,
            request.language,
            &vars,
        )?;

        let kind = request.card_kind;
        let mut cards = self
            .complete_with_retry(&prompt, request.source.attachment(), |raw| {
                parser::parse_flashcards(raw, kind).into_flashcards()
            })
            .await?;

        if cards.len() > request.count {
            debug!(returned = cards.len(), requested = request.count, "Truncating surplus cards");
            cards.truncate(request.count);
        }
        if let Some(section_id) = &request.section_id {
            for card in &mut cards {
                card.section_id = Some(section_id.clone());
            }
        }

        info!(key = %prompt.key, cards = cards.len(), "Flashcard generation finished");
        Ok(cards)
    }

    /// Generate cards for one node of a previously analysed catalog.
    pub async fn generate_for_section(
        &self,
        catalog: &[CatalogEntry],
        section_id: &str,
        request: FlashcardRequest,
    ) -> Result<Vec<Flashcard>> {
        let node = CatalogEntry::find(catalog, section_id)
            .ok_or_else(|| WorkflowError::SectionNotFound(section_id.to_string()))?;
        let request = request.with_section(Some(node.id().to_string()), node.title());
        self.generate_flashcards(&request).await
    }

    async fn complete_with_retry<T>(
        &self,
        prompt: &ResolvedPrompt,
        attachment: Option<&Attachment>,
        parse: impl Fn(&str) -> std::result::Result<T, String>,
    ) -> Result<T> {
        let mut last_reason = String::new();

        for attempt in 1..=MAX_ATTEMPTS {
            debug!(key = %prompt.key, attempt, prompt_len = prompt.text.len(), "Calling gateway");
            let raw = self.gateway.complete(&prompt.text, attachment, self.stream).await?;
            debug!(key = %prompt.key, attempt, response_len = raw.len(), "Gateway responded");

            match parse(&raw) {
                Ok(records) => return Ok(records),
                Err(reason) => {
                    warn!(key = %prompt.key, attempt, %reason, "Unparsable response");
                    last_reason = reason;
                }
            }
        }

        Err(WorkflowError::UnparsableResponse { attempts: MAX_ATTEMPTS, reason: last_reason })
    }
}

/// Verify the submitted material against its recorded length.
///
/// Topic requests submit only the topic text.
fn check_integrity(
    record: Option<&IntegrityRecord>,
    topic: Option<&str>,
    source: &Source,
) -> Result<()> {
    let Some(record) = record else {
        return Ok(());
    };
    let content = match source {
        Source::Text(content) => content.as_str(),
        Source::File(file) => file.content.as_str(),
        Source::Topic => topic.unwrap_or_default(),
    };
    integrity::verify(record, content)?;
    Ok(())
}

fn variables(
    language: Language,
    topic: Option<&str>,
    source: &Source,
    section_title: Option<&str>,
    number: Option<usize>,
) -> Variables {
    let mut vars = Variables::new();
    vars.insert("lang".to_string(), language.as_str().to_string());
    if let Some(topic) = topic {
        vars.insert("TOPIC".to_string(), topic.to_string());
    }
    match source {
        Source::Topic => {}
        Source::Text(content) => {
            vars.insert("TEXT_CONTENT".to_string(), content.clone());
        }
        Source::File(file) => {
            vars.insert("FILENAME".to_string(), file.file_name.clone());
        }
    }
    if let Some(title) = section_title {
        vars.insert("SECTION_TITLE".to_string(), title.to_string());
    }
    if let Some(number) = number {
        vars.insert("NUMBER".to_string(), number.to_string());
    }
    vars
}
