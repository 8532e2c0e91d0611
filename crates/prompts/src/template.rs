//! Prompt templates with `{{NAME}}` placeholders.

use regex::{Captures, Regex};
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

/// Variables supplied to a template, by placeholder name.
pub type Variables = HashMap<String, String>;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").expect("valid placeholder regex")
    })
}

/// A prompt template.
///
/// The set of required placeholders is derived from the text, so it can never
/// drift from what the template actually references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
    placeholders: BTreeSet<String>,
}

impl PromptTemplate {
    /// Create a template from raw text.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let placeholders = placeholder_regex()
            .captures_iter(&text)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();
        Self { text, placeholders }
    }

    /// Raw template text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Placeholder names referenced by the text.
    pub fn placeholders(&self) -> &BTreeSet<String> {
        &self.placeholders
    }

    /// Placeholders not present in `vars`, sorted.
    pub fn missing(&self, vars: &Variables) -> Vec<String> {
        self.placeholders
            .iter()
            .filter(|name| !vars.contains_key(name.as_str()))
            .cloned()
            .collect()
    }

    /// Substitute every placeholder in one pass.
    ///
    /// Tokens are matched whole, so `{{TOPIC}}` never touches `{{TOPIC_ID}}`,
    /// and inserted values are not scanned again. Returns the missing names if
    /// any placeholder has no value.
    pub fn render(&self, vars: &Variables) -> std::result::Result<String, Vec<String>> {
        let missing = self.missing(vars);
        if !missing.is_empty() {
            return Err(missing);
        }

        let rendered = placeholder_regex().replace_all(&self.text, |caps: &Captures<'_>| {
            match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        });
        Ok(rendered.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_placeholders_derived_from_text() {
        let t = PromptTemplate::new("Make {{NUMBER}} cards on {{TOPIC}} in {{lang}}; {{TOPIC}} again");
        let names: Vec<&str> = t.placeholders().iter().map(String::as_str).collect();
        assert_eq!(names, vec!["NUMBER", "TOPIC", "lang"]);
    }

    #[test]
    fn test_render_missing_sorted() {
        let t = PromptTemplate::new("{{TOPIC}} {{NUMBER}} {{FILENAME}}");
        let err = t.render(&vars(&[("NUMBER", "3")])).unwrap_err();
        assert_eq!(err, vec!["FILENAME".to_string(), "TOPIC".to_string()]);
    }

    #[test]
    fn test_no_partial_match() {
        let t = PromptTemplate::new("{{TOPIC}} / {{TOPIC_ID}}");
        let out = t.render(&vars(&[("TOPIC", "X"), ("TOPIC_ID", "42")])).unwrap();
        assert_eq!(out, "X / 42");
    }

    #[test]
    fn test_values_not_rescanned() {
        let t = PromptTemplate::new("Topic: {{TOPIC}}");
        let out = t
            .render(&vars(&[("TOPIC", "{{TEXT_CONTENT}}"), ("TEXT_CONTENT", "secret")]))
            .unwrap();
        assert_eq!(out, "Topic: {{TEXT_CONTENT}}");
    }

    #[test]
    fn test_extra_variables_ignored() {
        let t = PromptTemplate::new("plain {{lang}}");
        let out = t.render(&vars(&[("lang", "en"), ("UNUSED", "x")])).unwrap();
        assert_eq!(out, "plain en");
    }

    #[test]
    fn test_json_braces_are_not_placeholders() {
        let t = PromptTemplate::new(r#"Return {"cards": [{"question": "..."}]} for {{TOPIC}}"#);
        assert_eq!(t.placeholders().len(), 1);
        let out = t.render(&vars(&[("TOPIC", "Rust")])).unwrap();
        assert!(out.starts_with(r#"Return {"cards""#));
    }
}
