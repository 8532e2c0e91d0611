//! Flashcard model.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{CoreError, Result};
use crate::id::CardId;
use crate::key::CardKind;

/// A generated flashcard and its review state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    /// Unique identifier
    #[serde(default)]
    pub id: CardId,

    /// Card content, discriminated by kind
    pub content: CardContent,

    /// Review status, set by the caller only
    #[serde(default)]
    pub status: ReviewStatus,

    /// Catalog node this card was generated for (section mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
}

/// Card content per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardContent {
    /// Question / answer
    Basic {
        /// Front
        question: String,
        /// Back
        answer: String,
    },
    /// Text with embedded `{{c1::...}}` deletions
    Cloze {
        /// Cloze text
        text: String,
    },
    /// Question with ordered options
    MultipleChoice {
        /// Question stem
        question: String,
        /// Ordered options (at least two)
        options: Vec<String>,
        /// Index into `options`
        correct_index: usize,
    },
}

/// Review status of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Not reviewed yet
    #[default]
    Pending,
    /// Accepted for export
    Approved,
    /// Discarded by the reviewer
    Rejected,
    /// Reviewer reported a content error
    FlaggedError,
}

impl ReviewStatus {
    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
            ReviewStatus::FlaggedError => "flagged_error",
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ReviewStatus::Pending),
            "approved" => Ok(ReviewStatus::Approved),
            "rejected" => Ok(ReviewStatus::Rejected),
            "flagged" | "flagged_error" | "error" => Ok(ReviewStatus::FlaggedError),
            _ => Err(CoreError::UnknownValue { field: "review status", value: s.to_string() }),
        }
    }
}

fn cloze_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{c(\d+)::").expect("valid cloze regex"))
}

/// Letter label for an option index ("A", "B", ...).
pub(crate) fn option_letter(index: usize) -> char {
    (b'A' + (index % 26) as u8) as char
}

impl CardContent {
    /// The kind this content belongs to.
    pub fn kind(&self) -> CardKind {
        match self {
            CardContent::Basic { .. } => CardKind::Basic,
            CardContent::Cloze { .. } => CardKind::Cloze,
            CardContent::MultipleChoice { .. } => CardKind::MultipleChoice,
        }
    }

    /// Distinct cloze ordinals in ascending order (`{{c2::..}}` yields 2).
    ///
    /// Empty for non-cloze content.
    pub fn cloze_ordinals(&self) -> Vec<u32> {
        let CardContent::Cloze { text } = self else {
            return Vec::new();
        };
        let mut ordinals: Vec<u32> = cloze_regex()
            .captures_iter(text)
            .filter_map(|c| c.get(1)?.as_str().parse().ok())
            .filter(|n| *n > 0)
            .collect();
        ordinals.sort_unstable();
        ordinals.dedup();
        ordinals
    }

    /// Check the structural invariants of the variant.
    ///
    /// Returns a human-readable reason when the content cannot be rendered
    /// into its note type.
    pub fn check_shape(&self) -> std::result::Result<(), String> {
        match self {
            CardContent::Basic { question, .. } => {
                if question.trim().is_empty() {
                    return Err("basic card has an empty question".to_string());
                }
            }
            CardContent::Cloze { .. } => {
                if self.cloze_ordinals().is_empty() {
                    return Err("cloze card has no {{cN::...}} deletion".to_string());
                }
            }
            CardContent::MultipleChoice { question, options, correct_index } => {
                if question.trim().is_empty() {
                    return Err("multiple choice card has an empty question".to_string());
                }
                if options.len() < 2 {
                    return Err(format!(
                        "multiple choice card needs at least 2 options, got {}",
                        options.len()
                    ));
                }
                if options.len() > 26 {
                    return Err(format!(
                        "multiple choice card has {} options, at most 26 can be labelled",
                        options.len()
                    ));
                }
                if *correct_index >= options.len() {
                    return Err(format!(
                        "correct index {} out of range for {} options",
                        correct_index,
                        options.len()
                    ));
                }
            }
        }
        Ok(())
    }

    /// Options rendered as `A. first<br>B. second`, for display.
    pub fn rendered_options(&self) -> Option<String> {
        self.labelled_options(|opt| opt.to_string())
    }

    /// Options joined like [`CardContent::rendered_options`], with `&` and `<`
    /// in each option entity-encoded so every `<br>` is a separator.
    ///
    /// Reversed by [`CardContent::split_escaped_options`].
    pub fn escaped_options(&self) -> Option<String> {
        self.labelled_options(|opt| opt.replace('&', "&amp;").replace('<', "&lt;"))
    }

    fn labelled_options(&self, encode: impl Fn(&str) -> String) -> Option<String> {
        let CardContent::MultipleChoice { options, .. } = self else {
            return None;
        };
        Some(
            options
                .iter()
                .enumerate()
                .map(|(i, opt)| format!("{}. {}", option_letter(i), encode(opt)))
                .collect::<Vec<_>>()
                .join("<br>"),
        )
    }

    /// Letter of the correct option.
    pub fn correct_letter(&self) -> Option<char> {
        match self {
            CardContent::MultipleChoice { correct_index, .. } => Some(option_letter(*correct_index)),
            _ => None,
        }
    }

    /// Split a [`CardContent::escaped_options`] string back into its options.
    ///
    /// A piece missing its expected letter label is kept whole.
    pub fn split_escaped_options(escaped: &str) -> Vec<String> {
        if escaped.is_empty() {
            return Vec::new();
        }
        escaped
            .split("<br>")
            .enumerate()
            .map(|(i, piece)| {
                let label = format!("{}. ", option_letter(i));
                let text = piece.strip_prefix(&label).unwrap_or(piece);
                text.replace("&lt;", "<").replace("&amp;", "&")
            })
            .collect()
    }
}

impl Flashcard {
    /// Create a pending card.
    pub fn new(content: CardContent) -> Self {
        Self {
            id: CardId::new(),
            content,
            status: ReviewStatus::Pending,
            section_id: None,
        }
    }

    /// Basic question/answer card.
    pub fn basic(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self::new(CardContent::Basic { question: question.into(), answer: answer.into() })
    }

    /// Cloze card.
    pub fn cloze(text: impl Into<String>) -> Self {
        Self::new(CardContent::Cloze { text: text.into() })
    }

    /// Multiple choice card.
    pub fn multiple_choice(
        question: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
    ) -> Self {
        Self::new(CardContent::MultipleChoice {
            question: question.into(),
            options,
            correct_index,
        })
    }

    /// Set the review status.
    pub fn with_status(mut self, status: ReviewStatus) -> Self {
        self.status = status;
        self
    }

    /// Card kind.
    pub fn kind(&self) -> CardKind {
        self.content.kind()
    }

    /// Record a reviewer decision.
    pub fn set_status(&mut self, status: ReviewStatus) {
        self.status = status;
    }
}
