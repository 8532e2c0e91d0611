//! CSV export and the matching reader.
//!
//! One header row, one row per card, CRLF line endings, RFC 4180 quoting.
//! Multiple choice options share a single column as `A. x<br>B. y`, with `&`
//! and `<` inside each option entity-encoded.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use deckgen_core::{CardContent, CardKind, ExportFormat, ExportJob, Flashcard};

use crate::error::{ExportError, Result, SerializationError};
use crate::exporter::{
    artifact_file_name, commit, discard, part_path, validate_cards, DeckExporter, ExportArtifact,
};

const BASIC_HEADER: &[&str] = &["question", "answer", "tags"];
const CLOZE_HEADER: &[&str] = &["text", "tags"];
const MULTIPLE_CHOICE_HEADER: &[&str] = &["question", "options", "answer", "tags"];

/// Column names for a card kind.
pub fn header_for(kind: CardKind) -> &'static [&'static str] {
    match kind {
        CardKind::Basic => BASIC_HEADER,
        CardKind::Cloze => CLOZE_HEADER,
        CardKind::MultipleChoice => MULTIPLE_CHOICE_HEADER,
    }
}

/// Writes `.csv` files into an output directory.
#[derive(Debug, Clone)]
pub struct TabularExporter {
    output_dir: PathBuf,
}

impl TabularExporter {
    /// Create an exporter writing into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }
}

#[async_trait]
impl DeckExporter for TabularExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Tabular
    }

    async fn export(&self, job: &ExportJob) -> Result<ExportArtifact> {
        validate_cards(job)?;
        if !job.media.is_empty() {
            warn!("CSV export ignores {} media file(s)", job.media.len());
        }
        let table = render_table(job);

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let file_name = artifact_file_name(job, ExportFormat::Tabular);
        let path = self.output_dir.join(&file_name);
        let part = part_path(&path);

        if let Err(e) = tokio::fs::write(&part, table.as_bytes()).await {
            discard(&part).await;
            return Err(e.into());
        }
        let size_bytes = commit(&part, &path).await?;

        info!(
            kind = %job.card_kind,
            cards = job.cards.len(),
            size_bytes,
            "Exported CSV {}",
            path.display()
        );

        Ok(ExportArtifact {
            path,
            file_name,
            format: ExportFormat::Tabular,
            card_count: job.cards.len(),
            size_bytes,
        })
    }
}

fn render_table(job: &ExportJob) -> String {
    let tags = job.tag_string();
    let mut out = String::new();
    push_row(&mut out, header_for(job.card_kind).iter().copied());

    for card in &job.cards {
        match &card.content {
            CardContent::Basic { question, answer } => {
                push_row(&mut out, [question.as_str(), answer.as_str(), tags.as_str()]);
            }
            CardContent::Cloze { text } => {
                push_row(&mut out, [text.as_str(), tags.as_str()]);
            }
            CardContent::MultipleChoice { question, .. } => {
                let options = card.content.escaped_options().unwrap_or_default();
                let letter = card.content.correct_letter().map(String::from).unwrap_or_default();
                push_row(&mut out, [question.as_str(), options.as_str(), letter.as_str(), tags.as_str()]);
            }
        }
    }
    out
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field);
    }
    out.push_str("\r\n");
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\r', '\n']) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

/// Read a CSV written by [`TabularExporter`] back into cards.
///
/// The card kind is taken from the header row. Returned cards are pending.
pub async fn read_cards(path: &Path) -> Result<Vec<Flashcard>> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_cards(&text)
}

/// Parse CSV text into cards; see [`read_cards`].
pub fn parse_cards(text: &str) -> Result<Vec<Flashcard>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = parse_records(text)?.into_iter();

    let header = records.next().ok_or_else(|| csv_error(1, "missing header row"))?;
    let columns: Vec<String> = header.iter().map(|c| c.trim().to_lowercase()).collect();
    let kind = CardKind::ALL
        .into_iter()
        .find(|kind| header_for(*kind).iter().eq(columns.iter()))
        .ok_or_else(|| ExportError::UnsupportedCardKind(format!("header '{}'", header.join(","))))?;

    let mut cards = Vec::new();
    for (offset, record) in records.enumerate() {
        let number = offset + 2;
        if record.len() != columns.len() {
            return Err(csv_error(
                number,
                format!("expected {} fields, got {}", columns.len(), record.len()),
            ));
        }
        let mut fields = record.into_iter();
        let mut next = || fields.next().unwrap_or_default();

        let card = match kind {
            CardKind::Basic => Flashcard::basic(next(), next()),
            CardKind::Cloze => Flashcard::cloze(next()),
            CardKind::MultipleChoice => {
                let question = next();
                let options = CardContent::split_escaped_options(&next());
                let letter = next();
                let index = letter_index(&letter, options.len()).ok_or_else(|| {
                    csv_error(number, format!("answer '{}' names no option", letter))
                })?;
                Flashcard::multiple_choice(question, options, index)
            }
        };
        cards.push(card);
    }
    Ok(cards)
}

fn letter_index(letter: &str, option_count: usize) -> Option<usize> {
    let mut chars = letter.trim().chars();
    let c = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() || !c.is_ascii_uppercase() {
        return None;
    }
    let index = (c as u8 - b'A') as usize;
    (index < option_count).then_some(index)
}

fn csv_error(record: usize, reason: impl Into<String>) -> ExportError {
    SerializationError::Csv { record, reason: reason.into() }.into()
}

/// Split RFC 4180 text into records. Blank lines are skipped.
fn parse_records(text: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
            }
            '"' => return Err(csv_error(records.len() + 1, "unexpected quote in unquoted field")),
            ',' => {
                record.push(std::mem::take(&mut field));
                quoted = false;
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                end_record(&mut record, &mut field, &mut records);
                quoted = false;
            }
            _ if quoted => {
                return Err(csv_error(records.len() + 1, "text after closing quote"));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(csv_error(records.len() + 1, "unterminated quoted field"));
    }
    if quoted || !field.is_empty() || !record.is_empty() {
        end_record(&mut record, &mut field, &mut records);
    }
    Ok(records)
}

fn end_record(record: &mut Vec<String>, field: &mut String, records: &mut Vec<Vec<String>>) {
    record.push(std::mem::take(field));
    if record.len() == 1 && record[0].is_empty() {
        record.clear();
    } else {
        records.push(std::mem::take(record));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn contents(cards: &[Flashcard]) -> Vec<CardContent> {
        cards.iter().map(|c| c.content.clone()).collect()
    }

    #[tokio::test]
    async fn test_basic_round_trip_with_awkward_text() {
        let dir = TempDir::new().unwrap();
        let exporter = TabularExporter::new(dir.path());
        let cards = vec![
            Flashcard::basic("What is 1,2?", "A \"tuple\"-ish list"),
            Flashcard::basic("Line\nbreak?", "Yes\r\nreally"),
            Flashcard::basic("Plain", ""),
        ];
        let job = ExportJob::new("Deck", CardKind::Basic, cards.clone(), ExportFormat::Tabular);

        let artifact = exporter.export(&job).await.unwrap();
        assert_eq!(artifact.card_count, 3);
        assert!(artifact.file_name.starts_with("cards_basic_"));

        let raw = std::fs::read_to_string(&artifact.path).unwrap();
        assert!(raw.starts_with("question,answer,tags\r\n"));
        assert!(raw.contains("\"What is 1,2?\",\"A \"\"tuple\"\"-ish list\",deckgen\r\n"));
        assert_eq!(artifact.size_bytes, raw.len() as u64);

        let back = read_cards(&artifact.path).await.unwrap();
        assert_eq!(contents(&back), contents(&cards));
    }

    #[tokio::test]
    async fn test_cloze_and_multiple_choice_round_trip() {
        let dir = TempDir::new().unwrap();
        let exporter = TabularExporter::new(dir.path());

        let cloze = vec![Flashcard::cloze("{{c1::Ownership}}, borrowing and {{c2::lifetimes}}")];
        let job = ExportJob::new("C", CardKind::Cloze, cloze.clone(), ExportFormat::Tabular);
        let artifact = exporter.export(&job).await.unwrap();
        let raw = std::fs::read_to_string(&artifact.path).unwrap();
        assert!(raw.starts_with("text,tags\r\n"));
        assert_eq!(contents(&read_cards(&artifact.path).await.unwrap()), contents(&cloze));

        let mc = vec![Flashcard::multiple_choice(
            "Which keyword, if any, moves?",
            vec!["let".into(), "move, always".into(), "ref".into()],
            1,
        )];
        let job = ExportJob::new("M", CardKind::MultipleChoice, mc.clone(), ExportFormat::Tabular)
            .with_tags(vec!["rust".into(), "closures".into()]);
        let artifact = exporter.export(&job).await.unwrap();
        let raw = std::fs::read_to_string(&artifact.path).unwrap();
        assert!(raw.starts_with("question,options,answer,tags\r\n"));
        assert!(raw.contains("\"A. let<br>B. move, always<br>C. ref\",B,rust closures\r\n"));
        assert_eq!(contents(&read_cards(&artifact.path).await.unwrap()), contents(&mc));

        // option text containing the separator and the next label
        let tricky = vec![Flashcard::multiple_choice(
            "Which line is one option?",
            vec!["x<br>B. y".into(), "z".into(), "a & b < c".into()],
            1,
        )];
        let job = ExportJob::new("T", CardKind::MultipleChoice, tricky.clone(), ExportFormat::Tabular);
        let artifact = exporter.export(&job).await.unwrap();
        let raw = std::fs::read_to_string(&artifact.path).unwrap();
        assert!(raw.contains("A. x&lt;br>B. y<br>B. z<br>C. a &amp; b &lt; c,B,deckgen\r\n"));
        assert_eq!(contents(&read_cards(&artifact.path).await.unwrap()), contents(&tricky));
    }

    #[tokio::test]
    async fn test_empty_list_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("csv");
        let exporter = TabularExporter::new(&out);
        let job = ExportJob::new("Deck", CardKind::Basic, vec![], ExportFormat::Tabular);
        assert!(matches!(exporter.export(&job).await, Err(ExportError::EmptyCardList)));
        assert!(!out.exists());
    }

    #[test]
    fn test_unknown_header_is_unsupported_kind() {
        let err = parse_cards("front,back\r\nq,a\r\n").unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedCardKind(_)));
    }

    #[test]
    fn test_reader_accepts_bom_and_bare_newlines() {
        let cards = parse_cards("\u{feff}Question,Answer,Tags\nq1,a1,x\n\nq2,a2,\n").unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[1].content, CardContent::Basic { question: "q2".into(), answer: "a2".into() });
    }

    #[test]
    fn test_malformed_records() {
        let err = parse_cards("text,tags\r\n\"unterminated,x\r\n").unwrap_err();
        assert!(matches!(
            err,
            ExportError::Serialization(SerializationError::Csv { record: 2, .. })
        ));

        let err = parse_cards("text,tags\r\nonly-one-field\r\n").unwrap_err();
        assert!(matches!(
            err,
            ExportError::Serialization(SerializationError::Csv { record: 2, .. })
        ));

        let err = parse_cards("question,options,answer,tags\r\nq,A. x<br>B. y,C,\r\n").unwrap_err();
        assert!(matches!(
            err,
            ExportError::Serialization(SerializationError::Csv { record: 2, .. })
        ));

        assert!(parse_cards("").is_err());
    }
}
