//! Response parser: raw model output to typed records.
//!
//! This is the only place untrusted model text is interpreted. Models wrap
//! their JSON in prose or Markdown fences and drift on key names, so the
//! parser first locates a JSON payload and then maps it leniently onto the
//! domain types. Anything that cannot be mapped becomes
//! [`ParsedResponse::Failure`].

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use deckgen_core::{CardContent, CardKind, CatalogEntry, CatalogSection, Flashcard};

/// Outcome of parsing one model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    /// An outline, ids assigned
    Catalog(Vec<CatalogEntry>),
    /// Cards of the requested kind
    Flashcards(Vec<Flashcard>),
    /// Nothing usable; the reason is for logs
    Failure(String),
}

impl ParsedResponse {
    /// The outline, or the failure reason.
    pub fn into_catalog(self) -> Result<Vec<CatalogEntry>, String> {
        match self {
            ParsedResponse::Catalog(entries) => Ok(entries),
            ParsedResponse::Flashcards(_) => Err("expected a catalog, got flashcards".to_string()),
            ParsedResponse::Failure(reason) => Err(reason),
        }
    }

    /// The cards, or the failure reason.
    pub fn into_flashcards(self) -> Result<Vec<Flashcard>, String> {
        match self {
            ParsedResponse::Flashcards(cards) => Ok(cards),
            ParsedResponse::Catalog(_) => Err("expected flashcards, got a catalog".to_string()),
            ParsedResponse::Failure(reason) => Err(reason),
        }
    }
}

/// Parse a catalog analysis response.
///
/// Accepts a bare array of chapters or an object wrapping one under
/// `chapters`, `catalog` or `outline`. Sections may be plain strings.
pub fn parse_catalog(raw: &str) -> ParsedResponse {
    let Some(payload) = extract_json(raw) else {
        return ParsedResponse::Failure("no JSON payload found".to_string());
    };

    let list = match unwrap_list(payload, &["chapters", "catalog", "outline"]) {
        Some(list) => list,
        None => return ParsedResponse::Failure("no chapter list in payload".to_string()),
    };

    let chapters: Vec<RawChapter> = match serde_json::from_value(Value::Array(list)) {
        Ok(chapters) => chapters,
        Err(e) => return ParsedResponse::Failure(format!("malformed chapter: {}", e)),
    };

    let mut entries: Vec<CatalogEntry> = Vec::with_capacity(chapters.len());
    for chapter in chapters {
        if chapter.title.trim().is_empty() {
            return ParsedResponse::Failure("chapter with empty title".to_string());
        }
        entries.push(CatalogEntry {
            id: String::new(),
            title: chapter.title.trim().to_string(),
            description: chapter.description.trim().to_string(),
            sections: chapter.sections.into_iter().filter_map(RawSection::into_section).collect(),
        });
    }

    if entries.is_empty() {
        return ParsedResponse::Failure("catalog has no chapters".to_string());
    }

    CatalogEntry::assign_ids(&mut entries);
    debug!(chapters = entries.len(), "Parsed catalog");
    ParsedResponse::Catalog(entries)
}

/// Parse a flashcard generation response for `kind`.
///
/// Individual cards that do not fit `kind` are dropped with a warning; the
/// response fails only when no card survives.
pub fn parse_flashcards(raw: &str, kind: CardKind) -> ParsedResponse {
    let Some(payload) = extract_json(raw) else {
        return ParsedResponse::Failure("no JSON payload found".to_string());
    };

    let Some(items) = unwrap_list(payload, &["cards", "flashcards", "questions"]) else {
        return ParsedResponse::Failure("no card list in payload".to_string());
    };

    let total = items.len();
    let mut cards = Vec::with_capacity(total);
    for (idx, item) in items.into_iter().enumerate() {
        match card_from_value(item, kind) {
            Ok(content) => cards.push(Flashcard::new(content)),
            Err(reason) => warn!(index = idx, %kind, %reason, "Dropping malformed card"),
        }
    }

    if cards.is_empty() {
        return ParsedResponse::Failure(format!("none of {} {} cards were usable", total, kind));
    }

    debug!(%kind, parsed = cards.len(), dropped = total - cards.len(), "Parsed flashcards");
    ParsedResponse::Flashcards(cards)
}

#[derive(Debug, Deserialize)]
struct RawChapter {
    #[serde(alias = "chapter", alias = "name")]
    title: String,
    #[serde(default, alias = "desc", alias = "summary")]
    description: String,
    #[serde(default, alias = "children")]
    sections: Vec<RawSection>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSection {
    Title(String),
    Full {
        #[serde(alias = "section", alias = "name")]
        title: String,
        #[serde(default, alias = "desc", alias = "summary")]
        description: String,
        #[serde(default, alias = "sections", alias = "children")]
        subsections: Vec<RawSection>,
    },
}

impl RawSection {
    fn into_section(self) -> Option<CatalogSection> {
        let (title, description, subsections) = match self {
            RawSection::Title(title) => (title, String::new(), Vec::new()),
            RawSection::Full { title, description, subsections } => (title, description, subsections),
        };
        if title.trim().is_empty() {
            return None;
        }
        Some(CatalogSection {
            id: String::new(),
            title: title.trim().to_string(),
            description: description.trim().to_string(),
            subsections: subsections.into_iter().filter_map(RawSection::into_section).collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawBasic {
    #[serde(alias = "front", alias = "q")]
    question: String,
    #[serde(alias = "back", alias = "a")]
    answer: Value,
}

#[derive(Debug, Deserialize)]
struct RawCloze {
    #[serde(alias = "cloze", alias = "content")]
    text: String,
}

#[derive(Debug, Deserialize)]
struct RawChoice {
    #[serde(alias = "stem", alias = "q")]
    question: String,
    #[serde(alias = "choices")]
    options: Vec<Value>,
    #[serde(
        alias = "correct",
        alias = "correct_answer",
        alias = "correct_index",
        alias = "correctIndex"
    )]
    answer: Value,
}

fn card_from_value(value: Value, kind: CardKind) -> Result<CardContent, String> {
    let content = match kind {
        CardKind::Basic => {
            let raw: RawBasic = serde_json::from_value(value).map_err(|e| e.to_string())?;
            CardContent::Basic {
                question: raw.question.trim().to_string(),
                answer: scalar_text(&raw.answer).ok_or("answer is not text")?,
            }
        }
        CardKind::Cloze => {
            let raw: RawCloze = serde_json::from_value(value).map_err(|e| e.to_string())?;
            CardContent::Cloze { text: raw.text.trim().to_string() }
        }
        CardKind::MultipleChoice => {
            let raw: RawChoice = serde_json::from_value(value).map_err(|e| e.to_string())?;
            let options: Vec<String> = raw
                .options
                .iter()
                .map(|o| scalar_text(o).ok_or("option is not text"))
                .collect::<Result<_, _>>()?;
            let options = strip_option_labels(options);
            let correct_index = resolve_answer(&raw.answer, &options)
                .ok_or_else(|| format!("answer {} matches no option", raw.answer))?;
            CardContent::MultipleChoice {
                question: raw.question.trim().to_string(),
                options,
                correct_index,
            }
        }
    };
    content.check_shape()?;
    Ok(content)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Remove `A. ` / `B) ` style prefixes when every option carries its own
/// letter in order.
fn strip_option_labels(options: Vec<String>) -> Vec<String> {
    let labelled = options.iter().enumerate().all(|(i, opt)| label_len(opt, i).is_some());
    if !labelled {
        return options;
    }
    options
        .into_iter()
        .enumerate()
        .map(|(i, opt)| match label_len(&opt, i) {
            Some(len) => opt[len..].trim_start().to_string(),
            None => opt,
        })
        .collect()
}

fn label_len(option: &str, index: usize) -> Option<usize> {
    if index >= 26 {
        return None;
    }
    let letter = (b'A' + index as u8) as char;
    let mut chars = option.char_indices();
    let (_, first) = chars.next()?;
    if first.to_ascii_uppercase() != letter {
        return None;
    }
    let (pos, sep) = chars.next()?;
    matches!(sep, '.' | ')' | ':' | '、' | '．').then(|| pos + sep.len_utf8())
}

/// Map a model's answer (letter, index or option text) to an option index.
fn resolve_answer(answer: &Value, options: &[String]) -> Option<usize> {
    match answer {
        Value::Number(n) => n.as_u64().map(|n| n as usize).filter(|i| *i < options.len()),
        Value::String(s) => {
            let s = s.trim();
            if let Some(idx) = options.iter().position(|o| o.eq_ignore_ascii_case(s)) {
                return Some(idx);
            }
            let mut chars = s.chars();
            let first = chars.next()?;
            let rest = chars.as_str().trim_start_matches(['.', ')', ':', '、', '．']);
            if first.is_ascii_alphabetic() && (rest.is_empty() || rest.starts_with(' ')) {
                let idx = (first.to_ascii_uppercase() as u8 - b'A') as usize;
                return (idx < options.len()).then_some(idx);
            }
            s.parse::<usize>().ok().filter(|i| *i < options.len())
        }
        _ => None,
    }
}

/// Pull a list out of a payload that is either the list itself, an object
/// wrapping it under one of `keys`, or a single record.
fn unwrap_list(payload: Value, keys: &[&str]) -> Option<Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => {
            for key in keys {
                if let Some(Value::Array(items)) = map.remove(*key) {
                    return Some(items);
                }
            }
            // a lone record rather than a list
            if map.is_empty() {
                None
            } else {
                Some(vec![Value::Object(map)])
            }
        }
        _ => None,
    }
}

/// Locate the JSON payload inside free-form model output.
///
/// Tried in order: the whole text, each fenced code block, then every
/// balanced `{...}` / `[...]` span from left to right.
pub fn extract_json(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        if v.is_object() || v.is_array() {
            return Some(v);
        }
    }

    for block in fenced_blocks(trimmed) {
        if let Ok(v) = serde_json::from_str::<Value>(block.trim()) {
            return Some(v);
        }
    }

    let bytes = trimmed.as_bytes();
    let mut start = 0;
    while let Some(offset) = trimmed[start..].find(['{', '[']) {
        let open = start + offset;
        if let Some(close) = balanced_end(bytes, open) {
            if let Ok(v) = serde_json::from_str::<Value>(&trimmed[open..=close]) {
                return Some(v);
            }
        }
        start = open + 1;
    }
    None
}

fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        // skip the info string ("json", "JSON", ...)
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(after.len());
        let body = &after[body_start..];
        match body.find("```") {
            Some(close) => {
                blocks.push(&body[..close]);
                rest = &body[close + 3..];
            }
            None => break,
        }
    }
    blocks
}

/// Index of the bracket closing the one at `open`, honouring JSON strings.
fn balanced_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
