//! Template store - partitioned prompt templates loaded from TOML.
//!
//! File layout:
//!
//! ```toml
//! [flashcard.cloze.section.en]
//! text = "..."   # template used with inline text
//! file = "..."   # template used with an attached file
//!
//! [catalog.self.topic.zh]
//! text = "..."
//! ```

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

use deckgen_core::{CardKind, Domain, InputForm, Language, Mode, PromptKey, Subject};

use crate::error::{PromptError, Result};
use crate::template::PromptTemplate;

/// Templates compiled into the binary, covering every legal key in zh/en/ja.
pub const DEFAULT_TEMPLATES: &str = include_str!("../templates/default.toml");

type Partition = HashMap<(Subject, Mode, Language), PromptTemplate>;

/// Immutable collection of prompt templates.
///
/// One partition per (domain, input form); inside a partition templates are
/// indexed by (card-kind-or-self, mode, language).
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    partitions: HashMap<(Domain, InputForm), Partition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    text: Option<String>,
    file: Option<String>,
}

// domain -> subject -> mode -> language -> entry
type RawStore = BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, RawEntry>>>>;

fn invalid(path: impl Into<String>, reason: impl ToString) -> PromptError {
    PromptError::InvalidStore { path: path.into(), reason: reason.to_string() }
}

impl TemplateStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in template set.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(DEFAULT_TEMPLATES)
    }

    /// Load a store from a TOML file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;
        let store = Self::from_toml_str(&content)?;
        info!("Loaded {} templates from {}", store.len(), path.display());
        Ok(store)
    }

    /// Parse a store from TOML text.
    ///
    /// Unknown segment names, illegal combinations, empty templates and
    /// duplicate keys are rejected with the offending path.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawStore = toml::from_str(content)?;
        let mut store = Self::new();

        for (domain_name, subjects) in raw {
            let domain: Domain = domain_name.parse().map_err(|e| invalid(&domain_name, e))?;

            for (subject_name, modes) in subjects {
                let subject_path = format!("{}.{}", domain_name, subject_name);
                let card_kind = match subject_name.as_str() {
                    "self" => None,
                    other => Some(
                        other
                            .parse::<CardKind>()
                            .map_err(|e| invalid(&subject_path, e))?,
                    ),
                };

                for (mode_name, languages) in modes {
                    let mode_path = format!("{}.{}", subject_path, mode_name);
                    let mode: Mode = mode_name.parse().map_err(|e| invalid(&mode_path, e))?;

                    for (lang_name, entry) in languages {
                        let lang_path = format!("{}.{}", mode_path, lang_name);
                        let language: Language =
                            lang_name.parse().map_err(|e| invalid(&lang_path, e))?;

                        if entry.text.is_none() && entry.file.is_none() {
                            return Err(invalid(&lang_path, "entry has neither `text` nor `file`"));
                        }

                        let forms = [(InputForm::Text, entry.text), (InputForm::File, entry.file)];
                        for (input_form, text) in forms {
                            let Some(text) = text else { continue };
                            let path = format!("{}.{}", lang_path, input_form);

                            if text.trim().is_empty() {
                                return Err(invalid(&path, "template is empty"));
                            }
                            let key = PromptKey::new(domain, card_kind, input_form, mode, language)
                                .map_err(|e| invalid(&path, e))?;
                            if store.insert(key, PromptTemplate::new(text)).is_some() {
                                return Err(invalid(&path, "duplicate template"));
                            }
                        }
                    }
                }
            }
        }

        debug!("Parsed template store with {} templates", store.len());
        Ok(store)
    }

    /// Register a template, returning the one it replaced.
    pub fn insert(&mut self, key: PromptKey, template: PromptTemplate) -> Option<PromptTemplate> {
        self.partitions
            .entry((key.domain, key.input_form))
            .or_default()
            .insert((key.subject(), key.mode, key.language), template)
    }

    /// Builder-style [`TemplateStore::insert`].
    pub fn with_template(mut self, key: PromptKey, text: impl Into<String>) -> Self {
        self.insert(key, PromptTemplate::new(text));
        self
    }

    /// Look up the template for a key.
    pub fn get(&self, key: &PromptKey) -> Option<&PromptTemplate> {
        self.partitions
            .get(&(key.domain, key.input_form))?
            .get(&(key.subject(), key.mode, key.language))
    }

    /// Every registered key, sorted.
    pub fn keys(&self) -> Vec<PromptKey> {
        let mut keys: Vec<PromptKey> = self
            .partitions
            .iter()
            .flat_map(|(&(domain, input_form), partition)| {
                partition.keys().map(move |&(subject, mode, language)| PromptKey {
                    domain,
                    card_kind: match subject {
                        Subject::Catalog => None,
                        Subject::Card(kind) => Some(kind),
                    },
                    input_form,
                    mode,
                    language,
                })
            })
            .collect();
        keys.sort();
        keys
    }

    /// Legal keys with no template.
    pub fn missing_keys(&self) -> Vec<PromptKey> {
        PromptKey::all_legal()
            .into_iter()
            .filter(|key| self.get(key).is_none())
            .collect()
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.partitions.values().map(HashMap::len).sum()
    }

    /// Whether the store holds no templates.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
