//! AI side of deckgen: the gateway seam, the response parser, the integrity
//! check and the workflow orchestrator that ties them to prompt resolution.

#![warn(missing_docs)]

pub mod error;
pub mod gateway;
pub mod openai_compat;
pub mod parser;
pub mod integrity;
pub mod workflow;

pub use error::{ErrorKind, Result, WorkflowError};
pub use gateway::{AiGateway, Attachment, GatewayError};
pub use openai_compat::{GatewayConfig, OpenAiCompatGateway};
pub use parser::{parse_catalog, parse_flashcards, ParsedResponse};
pub use integrity::IntegrityError;
pub use workflow::{CatalogRequest, FlashcardRequest, Orchestrator, Source, MAX_ATTEMPTS};
