//! Settings loading from TOML files and environment variables.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::generate::prompt::DIFF_PLACEHOLDER;

/// Default maximum diff length in characters.
pub const DEFAULT_MAX_DIFF_LENGTH: usize = 4000;

/// Repository-level config file name, looked up in the working tree root.
pub const REPO_CONFIG_FILE: &str = ".diffscribe.toml";

pub const ENV_API_URL: &str = "DIFFSCRIBE_API_URL";
pub const ENV_MODEL: &str = "DIFFSCRIBE_MODEL";
pub const ENV_PROMPT: &str = "DIFFSCRIBE_PROMPT";
pub const ENV_MAX_DIFF_LENGTH: &str = "DIFFSCRIBE_MAX_DIFF_LENGTH";
pub const ENV_STRICT_STREAM: &str = "DIFFSCRIBE_STRICT_STREAM";
pub const ENV_REQUEST_TIMEOUT: &str = "DIFFSCRIBE_REQUEST_TIMEOUT";

/// Validated settings for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_url: String,
    pub model: String,
    /// Prompt template, always contains `{diff}`.
    pub prompt: String,
    pub max_diff_length: usize,
    /// Fail on malformed stream lines instead of dropping them.
    pub strict_stream: bool,
    pub request_timeout: Option<Duration>,
}

/// One layer of settings before presence checks.
///
/// Accepts both snake_case keys and the camelCase names used by editor
/// settings (`apiUrl`, `maxDiffLength`).
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PartialSettings {
    #[serde(alias = "apiUrl")]
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub prompt: Option<String>,
    #[serde(alias = "maxDiffLength")]
    pub max_diff_length: Option<usize>,
    #[serde(alias = "strictStream")]
    pub strict_stream: Option<bool>,
    #[serde(alias = "requestTimeoutSecs")]
    pub request_timeout_secs: Option<u64>,
}

impl PartialSettings {
    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    /// Parse TOML text; `origin` is only used for error reporting.
    pub fn from_toml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::ParseFailed {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Overlay `other` on top of `self`; values set in `other` win.
    pub fn merge(self, other: PartialSettings) -> Self {
        Self {
            api_url: other.api_url.or(self.api_url),
            model: other.model.or(self.model),
            prompt: other.prompt.or(self.prompt),
            max_diff_length: other.max_diff_length.or(self.max_diff_length),
            strict_stream: other.strict_stream.or(self.strict_stream),
            request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
        }
    }

    /// Read `DIFFSCRIBE_*` environment variables into a layer.
    ///
    /// Empty variables are ignored. Invalid numeric or boolean values log a
    /// warning and leave the setting unset.
    pub fn from_env() -> Self {
        Self {
            api_url: env_string(ENV_API_URL),
            model: env_string(ENV_MODEL),
            prompt: env_string(ENV_PROMPT),
            max_diff_length: env_parsed(ENV_MAX_DIFF_LENGTH),
            strict_stream: env_parsed(ENV_STRICT_STREAM),
            request_timeout_secs: env_parsed(ENV_REQUEST_TIMEOUT),
        }
    }

    /// Run presence checks and produce [`Settings`].
    ///
    /// All missing keys are reported together. Blank strings count as missing.
    /// A request timeout of 0 seconds means no timeout.
    pub fn validate(self) -> Result<Settings, ConfigError> {
        let api_url = non_blank(self.api_url);
        let model = non_blank(self.model);
        let prompt = non_blank(self.prompt);

        let mut missing = Vec::new();
        if api_url.is_none() {
            missing.push("api_url");
        }
        if model.is_none() {
            missing.push("model");
        }
        if prompt.is_none() {
            missing.push("prompt");
        }

        let (Some(api_url), Some(model), Some(prompt)) = (api_url, model, prompt) else {
            return Err(ConfigError::Missing(missing));
        };

        if !prompt.contains(DIFF_PLACEHOLDER) {
            return Err(ConfigError::MissingDiffPlaceholder);
        }

        Ok(Settings {
            api_url,
            model,
            prompt,
            max_diff_length: self.max_diff_length.unwrap_or(DEFAULT_MAX_DIFF_LENGTH),
            strict_stream: self.strict_stream.unwrap_or(false),
            request_timeout: self
                .request_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        })
    }
}

/// Path of the per-user config file, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("diffscribe").join("config.toml"))
}

/// Load settings for an invocation.
///
/// With `explicit` set, only that file is read. Otherwise the user config
/// file and then `<workdir>/.diffscribe.toml` are layered, skipping files
/// that do not exist. Environment variables are applied last.
pub fn load_settings(
    explicit: Option<&Path>,
    workdir: Option<&Path>,
) -> Result<Settings, ConfigError> {
    let mut layered = PartialSettings::default();

    match explicit {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            layered = layered.merge(PartialSettings::from_file(path)?);
        }
        None => {
            let candidates = [
                user_config_path(),
                workdir.map(|dir| dir.join(REPO_CONFIG_FILE)),
            ];
            for path in candidates.into_iter().flatten() {
                if path.is_file() {
                    debug!("Loading config from {}", path.display());
                    layered = layered.merge(PartialSettings::from_file(&path)?);
                }
            }
        }
    }

    layered.merge(PartialSettings::from_env()).validate()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn env_string(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(v) if !v.is_empty() => Some(v),
        _ => None,
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Invalid {} value '{}', ignoring", key, raw);
            None
        }
    }
}
