//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - TOML configuration file (`config.toml`)
//! - Environment variables (with `APP_` prefix, `__` between nesting levels)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Platform variables: `HOST`, `PORT`, `OPENAI_API_KEY`
//! 2. Environment variables (`APP_SERVER__PORT`, `APP_OPENAI__CHAT_MODEL`, ...)
//! 3. Configuration file (`config.toml`)
//! 4. Default values (defined in the Default impl)
//!
//! ## Example `config.toml`:
//! ```toml
//! [openai]
//! chat_model = "gpt-4o-mini"
//!
//! [analysis]
//! history_limit = 5
//!
//! [[auth.users]]
//! token = "dev-token"
//! user_id = "user-1"
//! ```
//!
//! Tokens are values rather than table keys: the `config` crate lowercases
//! keys, and bearer tokens are case-sensitive.

use crate::analysis::history::DEFAULT_HISTORY_LIMIT;
use crate::analysis::text_metrics::DEFAULT_MIN_GAP_SECONDS;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main application configuration, one struct per concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub openai: OpenAiConfig,
    pub storage: StorageConfig,
    pub analysis: AnalysisConfig,
    pub auth: AuthConfig,
}

/// Where the HTTP server listens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// OpenAI-compatible endpoint used for transcription and every chat call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub transcription_model: String,
    pub chat_model: String,
    /// Spoken language hint passed to transcription (ISO 639-1)
    pub language: String,
    pub timeout_secs: u64,
}

/// Blob storage and temporary files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory uploaded recordings are written to
    pub blob_root: String,
    /// Externally reachable base of the `/blobs` route, used to build upload/download URLs
    pub public_base_url: String,
    pub url_expiry_secs: u64,
    /// Directory for per-request downloads; empty means the OS temp dir
    pub temp_dir: String,
    pub max_upload_bytes: usize,
    /// SQLite file holding reports and prompts; empty keeps them in memory
    pub database_path: String,
}

/// Tunables of the analysis pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Past sessions handed to the advice model
    pub history_limit: usize,
    /// Gaps shorter than this (seconds) are not pauses
    pub min_gap_seconds: f64,
    /// Longest accepted prompt topic, in characters
    pub max_prompt_type_chars: usize,
}

/// Accepted bearer tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub users: Vec<AuthUser>,
}

/// One bearer token and the user id it authenticates as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub token: String,
    pub user_id: String,
}

impl AuthConfig {
    /// User id for an exact (case-sensitive) token match.
    pub fn user_for_token(&self, token: &str) -> Option<&str> {
        self.users
            .iter()
            .find(|user| user.token == token)
            .map(|user| user.user_id.as_str())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 4000,
            },
            openai: OpenAiConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: String::new(),
                transcription_model: "whisper-1".to_string(),
                chat_model: "gpt-4o-mini".to_string(),
                language: "en".to_string(),
                timeout_secs: 120,
            },
            storage: StorageConfig {
                blob_root: "uploads".to_string(),
                public_base_url: "http://127.0.0.1:4000/api/v1/blobs".to_string(),
                url_expiry_secs: 900,
                temp_dir: String::new(),
                max_upload_bytes: 50 * 1024 * 1024,
                database_path: "data/speech-coach.db".to_string(),
            },
            analysis: AnalysisConfig {
                history_limit: DEFAULT_HISTORY_LIMIT,
                min_gap_seconds: DEFAULT_MIN_GAP_SECONDS,
                max_prompt_type_chars: 100,
            },
            auth: AuthConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then `config.toml`, then `APP_*`, then platform variables.
    pub fn load() -> Result<Self> {
        Self::load_from("config")
    }

    /// Same as [`AppConfig::load`] with the file looked up under `file_stem`
    /// (any extension the `config` crate understands).
    pub fn load_from(file_stem: &str) -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        // Deployment platforms set these without the APP_ prefix
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(key) = env::var("OPENAI_API_KEY") {
            settings = settings.set_override("openai.api_key", key)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.openai.timeout_secs == 0 {
            return Err(anyhow::anyhow!("OpenAI timeout must be greater than 0"));
        }

        if self.storage.url_expiry_secs == 0 {
            return Err(anyhow::anyhow!("Presigned URL expiry must be greater than 0"));
        }

        if self.storage.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        if self.analysis.history_limit == 0 {
            return Err(anyhow::anyhow!("History limit must be greater than 0"));
        }

        if !(self.analysis.min_gap_seconds >= 0.0) {
            return Err(anyhow::anyhow!("Minimum pause gap cannot be negative"));
        }

        if self.analysis.max_prompt_type_chars == 0 {
            return Err(anyhow::anyhow!("Max prompt type length must be greater than 0"));
        }

        for (i, user) in self.auth.users.iter().enumerate() {
            if user.token.trim().is_empty() || user.user_id.trim().is_empty() {
                return Err(anyhow::anyhow!("auth.users[{}] needs a token and a user_id", i));
            }
            if user.user_id.contains('/') {
                return Err(anyhow::anyhow!("auth.users[{}]: user_id cannot contain '/'", i));
            }
        }

        Ok(())
    }

    /// Directory for per-request temporary audio files.
    pub fn temp_dir(&self) -> PathBuf {
        if self.storage.temp_dir.trim().is_empty() {
            env::temp_dir()
        } else {
            PathBuf::from(&self.storage.temp_dir)
        }
    }
}
