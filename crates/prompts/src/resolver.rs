//! Prompt resolver.

use std::sync::Arc;
use tracing::debug;

use deckgen_core::{CardKind, Domain, InputForm, Language, Mode, PromptKey};

use crate::error::{PromptError, Result};
use crate::store::TemplateStore;
use crate::template::Variables;

/// A fully substituted prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPrompt {
    /// Key of the template that produced it
    pub key: PromptKey,
    /// Final prompt text
    pub text: String,
}

/// Picks exactly one template per request and substitutes its variables.
#[derive(Debug, Clone)]
pub struct PromptResolver {
    store: Arc<TemplateStore>,
}

impl PromptResolver {
    /// Create a resolver over a shared store.
    pub fn new(store: Arc<TemplateStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    /// Resolve a prompt from its individual axes.
    pub fn resolve(
        &self,
        domain: Domain,
        card_kind: Option<CardKind>,
        input_form: InputForm,
        mode: Mode,
        language: Language,
        variables: &Variables,
    ) -> Result<ResolvedPrompt> {
        let key = PromptKey::new(domain, card_kind, input_form, mode, language)?;
        self.resolve_key(&key, variables)
    }

    /// Resolve a prompt for an already-built key.
    pub fn resolve_key(&self, key: &PromptKey, variables: &Variables) -> Result<ResolvedPrompt> {
        key.validate()?;

        let template = self
            .store
            .get(key)
            .ok_or(PromptError::TemplateNotFound(*key))?;

        let text = template
            .render(variables)
            .map_err(|missing| PromptError::MissingPlaceholder { key: *key, missing })?;

        debug!(%key, prompt_len = text.len(), "Resolved prompt");
        Ok(ResolvedPrompt { key: *key, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_vars(language: Language) -> Variables {
        [
            ("lang", language.as_str()),
            ("TOPIC", "Rust ownership"),
            ("TEXT_CONTENT", "Every value has a single owner."),
            ("FILENAME", "ownership.md"),
            ("SECTION_TITLE", "Moves"),
            ("NUMBER", "5"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn builtin() -> PromptResolver {
        PromptResolver::new(Arc::new(TemplateStore::builtin().unwrap()))
    }

    #[test]
    fn test_every_legal_key_resolves_cleanly() {
        let resolver = builtin();
        for key in PromptKey::all_legal() {
            let prompt = resolver.resolve_key(&key, &full_vars(key.language)).unwrap();
            // cloze syntax like {{c1::...}} is not a placeholder
            let leftover = crate::PromptTemplate::new(prompt.text.clone());
            assert!(leftover.placeholders().is_empty(), "unresolved placeholder in {key}");
            assert_eq!(prompt.key, key);
        }
    }

    #[test]
    fn test_catalog_section_mode_not_allowed() {
        let resolver = builtin();
        for form in InputForm::ALL {
            for language in Language::ALL {
                let err = resolver
                    .resolve(Domain::Catalog, None, form, Mode::Section, language, &full_vars(language))
                    .unwrap_err();
                assert!(matches!(err, PromptError::ModeNotAllowed { domain: Domain::Catalog, .. }));
            }
        }
    }

    #[test]
    fn test_card_kind_presence() {
        let resolver = builtin();
        let vars = full_vars(Language::En);
        let err = resolver
            .resolve(Domain::Flashcard, None, InputForm::Text, Mode::Topic, Language::En, &vars)
            .unwrap_err();
        assert!(matches!(err, PromptError::CardKindRequired(Domain::Flashcard)));

        let err = resolver
            .resolve(
                Domain::Catalog,
                Some(CardKind::Basic),
                InputForm::Text,
                Mode::Topic,
                Language::En,
                &vars,
            )
            .unwrap_err();
        assert!(matches!(err, PromptError::UnexpectedCardKind { kind: CardKind::Basic, .. }));
    }

    #[test]
    fn test_missing_placeholders_listed() {
        let key = PromptKey::flashcard(CardKind::Basic, InputForm::Text, Mode::Section, Language::En)
            .unwrap();
        let store = TemplateStore::new()
            .with_template(key, "{{SECTION_TITLE}} {{TEXT_CONTENT}} {{NUMBER}} {{lang}}");
        let resolver = PromptResolver::new(Arc::new(store));

        let vars: Variables = [("lang".to_string(), "en".to_string())].into_iter().collect();
        match resolver.resolve_key(&key, &vars).unwrap_err() {
            PromptError::MissingPlaceholder { missing, .. } => {
                assert_eq!(missing, vec!["NUMBER", "SECTION_TITLE", "TEXT_CONTENT"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_template_not_found() {
        let resolver = PromptResolver::new(Arc::new(TemplateStore::new()));
        let err = resolver
            .resolve(
                Domain::Flashcard,
                Some(CardKind::Cloze),
                InputForm::File,
                Mode::Full,
                Language::Ja,
                &Variables::new(),
            )
            .unwrap_err();
        assert!(matches!(err, PromptError::TemplateNotFound(_)));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let resolver = builtin();
        let vars = full_vars(Language::Zh);
        let key = PromptKey::flashcard(
            CardKind::MultipleChoice,
            InputForm::Text,
            Mode::Full,
            Language::Zh,
        )
        .unwrap();
        let first = resolver.resolve_key(&key, &vars).unwrap();
        let second = resolver.resolve_key(&key, &vars).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_substituted_values_present() {
        let resolver = builtin();
        let vars = full_vars(Language::En);
        let prompt = resolver
            .resolve(
                Domain::Flashcard,
                Some(CardKind::Basic),
                InputForm::Text,
                Mode::Section,
                Language::En,
                &vars,
            )
            .unwrap();
        assert!(prompt.text.contains("Moves"));
        assert!(prompt.text.contains("Every value has a single owner."));
        assert!(prompt.text.contains('5'));
    }
}
