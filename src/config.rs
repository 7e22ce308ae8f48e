//! Layered settings.
//!
//! Sources are merged in order, later ones winning:
//! 1. built-in defaults
//! 2. a TOML file (`--config`, else `./delve.toml`, else the user config dir)
//! 3. `DELVE_*` environment variables, `__` separating nested keys
//!    (e.g. `DELVE_MODEL`, `DELVE_RETRY__MAX_ATTEMPTS`)
//!
//! Command-line flags are applied on top by the binary.

use crate::error::Result;
use crate::retry::RetryPolicy;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model for every stage.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// File name looked up in the working directory.
const LOCAL_CONFIG: &str = "delve.toml";

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Model used by all three stages
    pub model: String,
    /// Number of research questions the coordinator is asked for
    pub questions: usize,
    /// Cap on research requests in flight; unbounded when unset
    pub max_concurrency: Option<usize>,
    /// Sampling temperature; model default when unset
    pub temperature: Option<f32>,
    pub api: ApiSettings,
    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            questions: 5,
            max_concurrency: None,
            temperature: None,
            api: ApiSettings::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Connection and authentication settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    /// API key; prefer `api_key_env` over putting the key in a file
    pub api_key: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Cached OAuth credentials file; defaults to `~/.gemini/oauth_creds.json`
    pub oauth_credentials: Option<PathBuf>,
    /// Limit for a whole non-streaming call, and for each pause in a streamed one
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            api_key_env: "GEMINI_API_KEY".to_string(),
            oauth_credentials: None,
            timeout_secs: 300,
            connect_timeout_secs: 10,
        }
    }
}

impl Settings {
    /// Load settings from defaults, the config file and the environment.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        Ok(Self::figment(config_file).extract()?)
    }

    /// The merged provider chain behind [`Settings::load`].
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));

        if let Some(path) = config_file.map(Path::to_path_buf).or_else(discover_config_file) {
            tracing::debug!(path = %path.display(), "Loading config file");
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed("DELVE_").split("__"))
    }
}

fn discover_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }
    directories::ProjectDirs::from("dev", "delve", "delve")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .filter(|path| path.exists())
}
