//! `deckgen.toml` loading.
//!
//! Priority: CLI flag > environment > TOML file > built-in default.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use deckgen_ai::openai_compat::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use deckgen_ai::GatewayConfig;

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "deckgen.toml";

const ENV_BASE_URL: &str = "DECKGEN_BASE_URL";
const ENV_MODEL: &str = "DECKGEN_MODEL";
const ENV_OUTPUT_DIR: &str = "DECKGEN_OUTPUT_DIR";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// AI provider settings
    pub ai: AiConfig,
    /// Prompt template settings
    pub prompts: PromptsConfig,
    /// Export settings
    pub export: ExportConfig,
    /// File the settings were read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
    /// Environment variables that overrode file values
    #[serde(skip)]
    pub env_overrides: Vec<&'static str>,
}

/// `[ai]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AiConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub stream: bool,
    pub temperature: f32,
}

/// `[prompts]` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PromptsConfig {
    /// Template file replacing the built-in set
    pub template_path: Option<PathBuf>,
}

/// `[export]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    /// Tag used when `--tag` is not given
    pub default_tag: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            ai: AiConfig::default(),
            prompts: PromptsConfig::default(),
            export: ExportConfig::default(),
            source: None,
            env_overrides: Vec::new(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: "DECKGEN_API_KEY".to_string(),
            stream: false,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("exports"),
            default_tag: deckgen_core::DEFAULT_TAG.to_string(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// With `path` the file must exist. Without it `./deckgen.toml` is read
    /// when present and defaults are used otherwise. Environment overrides are
    /// applied afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse TOML text; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `DECKGEN_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(ENV_BASE_URL) {
            self.ai.base_url = url;
            self.env_overrides.push(ENV_BASE_URL);
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.ai.model = model;
            self.env_overrides.push(ENV_MODEL);
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.export.output_dir = PathBuf::from(dir);
            self.env_overrides.push(ENV_OUTPUT_DIR);
        }
    }

    /// Report where the settings came from.
    ///
    /// Call once logging is initialised.
    pub fn log_source(&self) {
        match &self.source {
            Some(path) => info!("Loaded config from {}", path.display()),
            None => debug!("No {} found, using defaults", DEFAULT_CONFIG_PATH),
        }
        for name in &self.env_overrides {
            debug!("{} overrides the config file", name);
        }
    }

    /// Gateway settings, reading the API key from `ai.api_key_env`.
    pub fn gateway_config(&self) -> GatewayConfig {
        let api_key = std::env::var(&self.ai.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            debug!("{} not set, calling the provider without a key", self.ai.api_key_env);
        }
        GatewayConfig {
            base_url: self.ai.base_url.clone(),
            model: self.ai.model.clone(),
            api_key,
            temperature: self.ai.temperature,
        }
    }
}
