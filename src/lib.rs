//! Ask an OpenAI-compatible chat model one fixed question.
//!
//! The crate is split the same way the request flows: [`Credentials`] are
//! resolved once, an [`client::OpenAiClient`] is bound to them, and
//! [`runner::PromptRunner`] sends the single [`chat::ChatCompletion`]
//! request. Every fallible step reports through [`OpenAiError`].

use serde::Deserialize;
use std::{collections::HashMap, env, path::Path};

pub mod chat;
pub mod client;
pub mod runner;

pub use runner::{render, run_once, PromptRunner};

/// Default endpoint, used when `OPENAI_BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

/// Name of the variable holding the API credential.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Name of the variable overriding [`DEFAULT_BASE_URL`].
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OpenAiError {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub param: Option<String>,
    pub code: Option<String>,
}

impl OpenAiError {
    pub fn new(message: impl Into<String>, error_type: impl Into<String>) -> OpenAiError {
        OpenAiError {
            message: message.into(),
            error_type: error_type.into(),
            param: None,
            code: None,
        }
    }
}

impl std::fmt::Display for OpenAiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for OpenAiError {}

impl From<reqwest::Error> for OpenAiError {
    fn from(value: reqwest::Error) -> Self {
        OpenAiError::new(value.to_string(), "reqwest")
    }
}

impl From<reqwest::header::InvalidHeaderValue> for OpenAiError {
    fn from(value: reqwest::header::InvalidHeaderValue) -> Self {
        OpenAiError::new(format!("invalid API key: {value}"), "invalid_credentials")
    }
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

pub type ApiResponseOrError<T> = Result<T, OpenAiError>;

/// Where requests go and what they authenticate with.
///
/// The key is optional: a missing key is not rejected up front, the request
/// is simply sent without an `Authorization` header and the service answers
/// with its own authentication error.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: Option<String>,
    base_url: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: parse_base_url(base_url.into()),
        }
    }

    /// Credentials without a key.
    pub fn anonymous(base_url: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: parse_base_url(base_url.into()),
        }
    }

    /// Reads `OPENAI_API_KEY` and `OPENAI_BASE_URL` from the process
    /// environment, falling back to a `.env` file found by searching upward
    /// from the working directory.
    ///
    /// The `.env` file is only read, never applied to the process
    /// environment.
    pub fn from_env() -> Self {
        let dotenv = discover_dotenv();
        Self::from_layers(|name| env::var(name).ok(), &dotenv)
    }

    /// Resolves each variable from `env` first and `dotenv` second. A
    /// variable set in `env` wins even when empty; an empty value then
    /// counts as unset.
    pub fn from_layers<F>(env: F, dotenv: &HashMap<String, String>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| {
            env(name)
                .or_else(|| dotenv.get(name).cloned())
                .filter(|value| !value.is_empty())
        };

        let base_url = lookup(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Self {
            api_key: lookup(API_KEY_VAR),
            base_url: parse_base_url(base_url),
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn parse_base_url(mut value: String) -> String {
    if !value.ends_with('/') {
        value.push('/');
    }
    value
}

/// Finds the nearest `.env` and returns its values. A missing file yields an
/// empty map.
pub fn discover_dotenv() -> HashMap<String, String> {
    match dotenvy::dotenv_iter() {
        Ok(iter) => collect_dotenv(iter),
        Err(error) if error.not_found() => {
            log::debug!("no .env file found");
            HashMap::new()
        }
        Err(error) => {
            log::warn!("could not read .env file: {error}");
            HashMap::new()
        }
    }
}

/// Parses the dotenv file at `path`.
pub fn dotenv_values(path: impl AsRef<Path>) -> Result<HashMap<String, String>, dotenvy::Error> {
    Ok(collect_dotenv(dotenvy::from_path_iter(path)?))
}

fn collect_dotenv<R: std::io::Read>(iter: dotenvy::Iter<R>) -> HashMap<String, String> {
    iter.filter_map(|item| match item {
        Ok(pair) => Some(pair),
        Err(error) => {
            log::warn!("skipping malformed .env line: {error}");
            None
        }
    })
    .collect()
}
