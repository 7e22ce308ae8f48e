//! Credential resolution for the model API.
//!
//! Delve never runs a login flow. It uses an API key when one is configured or
//! exported, and otherwise falls back to an OAuth access token that some other
//! tool has already cached on disk.

use crate::config::ApiSettings;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Secondary variable consulted when the configured one is unset.
const FALLBACK_KEY_ENV: &str = "GOOGLE_API_KEY";

/// How requests are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Sent as the `x-goog-api-key` header
    ApiKey(String),
    /// Sent as an `Authorization: Bearer` header
    AccessToken(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            Credentials::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
        }
    }
}

#[derive(Deserialize)]
struct CachedOAuth {
    access_token: Option<String>,
    /// Milliseconds since the Unix epoch
    expiry_date: Option<u64>,
}

impl Credentials {
    /// Resolve credentials from settings and the process environment.
    pub fn resolve(settings: &ApiSettings) -> Result<Self> {
        Self::resolve_with(settings, |name| std::env::var(name).ok())
    }

    /// Resolve credentials using `env` to look up environment variables.
    ///
    /// Order: explicit key in settings, the configured key variable, the
    /// fallback key variable, then the cached OAuth token file.
    pub fn resolve_with<F>(settings: &ApiSettings, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let nonblank = |k: &String| !k.trim().is_empty();
        let key = settings
            .api_key
            .clone()
            .filter(nonblank)
            .or_else(|| env(&settings.api_key_env).filter(nonblank))
            .or_else(|| env(FALLBACK_KEY_ENV).filter(nonblank));
        if let Some(key) = key {
            return Ok(Credentials::ApiKey(key.trim().to_string()));
        }

        let path = settings
            .oauth_credentials
            .clone()
            .or_else(default_oauth_path)
            .ok_or_else(|| {
                Error::Credentials(format!("{} is not set", settings.api_key_env))
            })?;

        if !path.exists() {
            return Err(Error::Credentials(format!(
                "{} is not set and no cached OAuth credentials were found at {}",
                settings.api_key_env,
                path.display()
            )));
        }

        tracing::debug!(path = %path.display(), "Using cached OAuth credentials");
        Self::from_oauth_file(&path)
    }

    /// Read an access token from a cached OAuth credentials file.
    pub fn from_oauth_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let cached: CachedOAuth = serde_json::from_str(&raw)?;

        let token = cached
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::Credentials(format!("no access_token in {}", path.display()))
            })?;

        if let Some(expiry) = cached.expiry_date {
            let now_ms = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            if expiry <= now_ms {
                return Err(Error::Credentials(format!(
                    "cached access token in {} has expired; sign in again with the tool that created it",
                    path.display()
                )));
            }
        }

        Ok(Credentials::AccessToken(token))
    }
}

fn default_oauth_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().join(".gemini").join("oauth_creds.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn settings() -> ApiSettings {
        ApiSettings {
            oauth_credentials: Some(PathBuf::from("/nonexistent/oauth_creds.json")),
            ..ApiSettings::default()
        }
    }

    #[test]
    fn test_explicit_key_wins() {
        let mut s = settings();
        s.api_key = Some("from-config".to_string());
        let creds = Credentials::resolve_with(&s, |_| Some("from-env".to_string())).unwrap();
        assert_eq!(creds, Credentials::ApiKey("from-config".to_string()));
    }

    #[test]
    fn test_configured_env_var() {
        let s = settings();
        let creds = Credentials::resolve_with(&s, |name| {
            (name == "GEMINI_API_KEY").then(|| "abc".to_string())
        })
        .unwrap();
        assert_eq!(creds, Credentials::ApiKey("abc".to_string()));
    }

    #[test]
    fn test_fallback_env_var() {
        let s = settings();
        let creds = Credentials::resolve_with(&s, |name| {
            (name == "GOOGLE_API_KEY").then(|| "xyz".to_string())
        })
        .unwrap();
        assert_eq!(creds, Credentials::ApiKey("xyz".to_string()));
    }

    #[test]
    fn test_blank_config_key_falls_through() {
        let mut s = settings();
        s.api_key = Some(String::new());
        let creds = Credentials::resolve_with(&s, |name| {
            (name == "GEMINI_API_KEY").then(|| "abc".to_string())
        })
        .unwrap();
        assert_eq!(creds, Credentials::ApiKey("abc".to_string()));
    }

    #[test]
    fn test_blank_env_key_falls_through() {
        let s = settings();
        let creds = Credentials::resolve_with(&s, |name| match name {
            "GEMINI_API_KEY" => Some("  ".to_string()),
            "GOOGLE_API_KEY" => Some("xyz".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(creds, Credentials::ApiKey("xyz".to_string()));
    }

    #[test]
    fn test_blank_keys_fall_through_to_oauth() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"access_token": "ya29.token"}}"#).unwrap();

        let mut s = settings();
        s.api_key = Some(" ".to_string());
        s.oauth_credentials = Some(file.path().to_path_buf());
        let creds = Credentials::resolve_with(&s, |_| Some(String::new())).unwrap();
        assert_eq!(creds, Credentials::AccessToken("ya29.token".to_string()));
    }

    #[test]
    fn test_missing_everything() {
        let err = Credentials::resolve_with(&settings(), |_| None).unwrap_err();
        assert!(matches!(err, Error::Credentials(_)));
    }

    #[test]
    fn test_oauth_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"access_token": "ya29.token", "refresh_token": "r", "expiry_date": {}}}"#,
            u64::MAX
        )
        .unwrap();

        let mut s = settings();
        s.oauth_credentials = Some(file.path().to_path_buf());
        let creds = Credentials::resolve_with(&s, |_| None).unwrap();
        assert_eq!(creds, Credentials::AccessToken("ya29.token".to_string()));
    }

    #[test]
    fn test_expired_oauth_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"access_token": "old", "expiry_date": 1}}"#).unwrap();

        let err = Credentials::from_oauth_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn test_debug_redacts() {
        let creds = Credentials::ApiKey("secret".to_string());
        assert!(!format!("{:?}", creds).contains("secret"));
    }
}
