//! Prompt templates and resolution for deckgen.
//!
//! A [`TemplateStore`] is loaded once (from the built-in set or a TOML file)
//! and shared behind an `Arc`; [`PromptResolver`] picks exactly one template
//! for a request and substitutes its `{{NAME}}` placeholders.

#![warn(missing_docs)]

mod error;
mod template;
mod store;
mod resolver;

pub use error::{PromptError, Result};
pub use template::{PromptTemplate, Variables};
pub use store::{TemplateStore, DEFAULT_TEMPLATES};
pub use resolver::{PromptResolver, ResolvedPrompt};
