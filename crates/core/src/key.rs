//! The prompt matrix: closed enumerations over every axis a template is keyed by.
//!
//! Strings are only accepted at the edges (`FromStr`, serde); everything past
//! that point matches exhaustively on these enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Top-level generation purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Chapter/section outline analysis
    Catalog,
    /// Flashcard generation
    Flashcard,
}

/// Flashcard variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    /// Question / answer
    Basic,
    /// Cloze deletion
    Cloze,
    /// Multiple choice
    MultipleChoice,
}

/// Whether the AI call receives raw text or a file attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputForm {
    /// Inline text
    Text,
    /// Attached file
    File,
}

/// Generation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Topic only, no source material
    Topic,
    /// Whole source content
    Full,
    /// One section of the source (flashcard domain only)
    Section,
}

/// Prompt language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// Chinese
    Zh,
    /// English
    En,
    /// Japanese
    Ja,
}

/// The second axis of the template hierarchy: a card kind, or the domain itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    /// Catalog templates are keyed by the domain itself
    Catalog,
    /// Flashcard templates are keyed by card kind
    Card(CardKind),
}

impl Domain {
    /// All domains.
    pub const ALL: [Domain; 2] = [Domain::Catalog, Domain::Flashcard];

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Catalog => "catalog",
            Domain::Flashcard => "flashcard",
        }
    }

    /// Modes legal for this domain.
    pub fn modes(&self) -> &'static [Mode] {
        match self {
            Domain::Catalog => &[Mode::Topic, Mode::Full],
            Domain::Flashcard => &[Mode::Topic, Mode::Full, Mode::Section],
        }
    }

    /// Whether `mode` may be used with this domain.
    pub fn allows(&self, mode: Mode) -> bool {
        self.modes().contains(&mode)
    }
}

impl CardKind {
    /// All card kinds.
    pub const ALL: [CardKind; 3] = [CardKind::Basic, CardKind::Cloze, CardKind::MultipleChoice];

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CardKind::Basic => "basic",
            CardKind::Cloze => "cloze",
            CardKind::MultipleChoice => "multiple_choice",
        }
    }
}

impl InputForm {
    /// All input forms.
    pub const ALL: [InputForm; 2] = [InputForm::Text, InputForm::File];

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            InputForm::Text => "text",
            InputForm::File => "file",
        }
    }
}

impl Mode {
    /// All modes.
    pub const ALL: [Mode; 3] = [Mode::Topic, Mode::Full, Mode::Section];

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Topic => "topic",
            Mode::Full => "full",
            Mode::Section => "section",
        }
    }
}

impl Language {
    /// All languages.
    pub const ALL: [Language; 3] = [Language::Zh, Language::En, Language::Ja];

    /// Language code, also the value of the `lang` placeholder.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
            Language::Ja => "ja",
        }
    }
}

impl Subject {
    /// Segment name used in the template store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Catalog => "self",
            Subject::Card(kind) => kind.as_str(),
        }
    }
}

macro_rules! display_via_as_str {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_via_as_str!(Domain, CardKind, InputForm, Mode, Language, Subject);

impl FromStr for Domain {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "catalog" | "catalog_analysis" => Ok(Domain::Catalog),
            "flashcard" | "flashcards" => Ok(Domain::Flashcard),
            _ => Err(CoreError::UnknownValue { field: "domain", value: s.to_string() }),
        }
    }
}

impl FromStr for CardKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "basic" | "basic_card" => Ok(CardKind::Basic),
            "cloze" | "cloze_card" => Ok(CardKind::Cloze),
            "multiple_choice" | "multiplechoice" | "multiple_choice_card" | "choice" => {
                Ok(CardKind::MultipleChoice)
            }
            _ => Err(CoreError::UnsupportedCardKind(s.to_string())),
        }
    }
}

impl FromStr for InputForm {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(InputForm::Text),
            "file" => Ok(InputForm::File),
            _ => Err(CoreError::UnknownValue { field: "input form", value: s.to_string() }),
        }
    }
}

impl FromStr for Mode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "topic" => Ok(Mode::Topic),
            "full" => Ok(Mode::Full),
            "section" => Ok(Mode::Section),
            _ => Err(CoreError::UnknownValue { field: "mode", value: s.to_string() }),
        }
    }
}

impl FromStr for Language {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "zh" => Ok(Language::Zh),
            "en" => Ok(Language::En),
            "ja" => Ok(Language::Ja),
            _ => Err(CoreError::UnknownValue { field: "language", value: s.to_string() }),
        }
    }
}

/// Fully-qualified address of one prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PromptKey {
    /// Generation purpose
    pub domain: Domain,
    /// Card kind (flashcard domain only)
    pub card_kind: Option<CardKind>,
    /// Text or file input
    pub input_form: InputForm,
    /// Generation strategy
    pub mode: Mode,
    /// Prompt language
    pub language: Language,
}

impl PromptKey {
    /// Build a key, rejecting combinations that can never name a template.
    pub fn new(
        domain: Domain,
        card_kind: Option<CardKind>,
        input_form: InputForm,
        mode: Mode,
        language: Language,
    ) -> Result<Self> {
        let key = Self { domain, card_kind, input_form, mode, language };
        key.validate()?;
        Ok(key)
    }

    /// Key for a catalog analysis template.
    pub fn catalog(input_form: InputForm, mode: Mode, language: Language) -> Result<Self> {
        Self::new(Domain::Catalog, None, input_form, mode, language)
    }

    /// Key for a flashcard generation template.
    pub fn flashcard(
        card_kind: CardKind,
        input_form: InputForm,
        mode: Mode,
        language: Language,
    ) -> Result<Self> {
        Self::new(Domain::Flashcard, Some(card_kind), input_form, mode, language)
    }

    /// Check domain/mode and domain/card-kind legality.
    pub fn validate(&self) -> Result<()> {
        match (self.domain, self.card_kind) {
            (Domain::Flashcard, None) => return Err(CoreError::CardKindRequired(self.domain)),
            (Domain::Catalog, Some(kind)) => {
                return Err(CoreError::UnexpectedCardKind { domain: self.domain, kind })
            }
            _ => {}
        }
        if !self.domain.allows(self.mode) {
            return Err(CoreError::ModeNotAllowed { domain: self.domain, mode: self.mode });
        }
        Ok(())
    }

    /// The cardKind-or-self axis.
    ///
    /// Only meaningful for validated keys; an unvalidated flashcard key with no
    /// card kind reports `Subject::Catalog`.
    pub fn subject(&self) -> Subject {
        match self.card_kind {
            Some(kind) => Subject::Card(kind),
            None => Subject::Catalog,
        }
    }

    /// Every legal key, in a stable order.
    pub fn all_legal() -> Vec<PromptKey> {
        let mut keys = Vec::new();
        for domain in Domain::ALL {
            let kinds: Vec<Option<CardKind>> = match domain {
                Domain::Catalog => vec![None],
                Domain::Flashcard => CardKind::ALL.iter().copied().map(Some).collect(),
            };
            for card_kind in kinds {
                for input_form in InputForm::ALL {
                    for &mode in domain.modes() {
                        for language in Language::ALL {
                            keys.push(PromptKey { domain, card_kind, input_form, mode, language });
                        }
                    }
                }
            }
        }
        keys
    }
}

impl fmt::Display for PromptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}",
            self.domain,
            self.subject(),
            self.mode,
            self.language,
            self.input_form
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_mode_rejected_for_catalog() {
        let err = PromptKey::catalog(InputForm::Text, Mode::Section, Language::En).unwrap_err();
        assert_eq!(err, CoreError::ModeNotAllowed { domain: Domain::Catalog, mode: Mode::Section });
    }

    #[test]
    fn test_flashcard_requires_card_kind() {
        let err = PromptKey::new(Domain::Flashcard, None, InputForm::Text, Mode::Topic, Language::Zh)
            .unwrap_err();
        assert_eq!(err, CoreError::CardKindRequired(Domain::Flashcard));
    }

    #[test]
    fn test_catalog_rejects_card_kind() {
        let err = PromptKey::new(
            Domain::Catalog,
            Some(CardKind::Cloze),
            InputForm::File,
            Mode::Full,
            Language::Ja,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::UnexpectedCardKind { kind: CardKind::Cloze, .. }));
    }

    #[test]
    fn test_all_legal_count() {
        // catalog: 2 forms * 2 modes * 3 langs; flashcard: 3 kinds * 2 forms * 3 modes * 3 langs
        let keys = PromptKey::all_legal();
        assert_eq!(keys.len(), 12 + 54);
        assert!(keys.iter().all(|k| k.validate().is_ok()));
    }

    #[test]
    fn test_card_kind_aliases() {
        assert_eq!("basic_card".parse::<CardKind>().unwrap(), CardKind::Basic);
        assert_eq!("Multiple_Choice".parse::<CardKind>().unwrap(), CardKind::MultipleChoice);
        assert_eq!(
            "essay".parse::<CardKind>().unwrap_err(),
            CoreError::UnsupportedCardKind("essay".to_string())
        );
    }

    #[test]
    fn test_key_display() {
        let key = PromptKey::flashcard(CardKind::Cloze, InputForm::File, Mode::Section, Language::En)
            .unwrap();
        assert_eq!(key.to_string(), "flashcard.cloze.section.en.file");
        let key = PromptKey::catalog(InputForm::Text, Mode::Topic, Language::Zh).unwrap();
        assert_eq!(key.to_string(), "catalog.self.topic.zh.text");
    }
}
