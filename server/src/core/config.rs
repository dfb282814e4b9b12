//! Layered application configuration
//!
//! Configuration is resolved from three layers, in increasing precedence:
//! 1. defaults (hard-coded below)
//! 2. a JSON config file (profile directory `~/.chatdock/chatdock.json`, or
//!    `--config`/`CHATDOCK_CONFIG` if set)
//! 3. CLI flags / environment variables
//!
//! Each layer is deserialized into an `Option`-shaped `*FileConfig` struct and
//! merged field-by-field into the previous layer, so that any field left
//! unset in a higher-precedence layer falls through to the one below it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_HOST, DEFAULT_MAX_CONVERSATION_HISTORY, DEFAULT_PORT,
    DEFAULT_SESSION_TTL_DAYS,
};
use crate::utils::file::expand_path;
use crate::utils::string::parse_string_array;

// =============================================================================
// File-layer config (all-Optional, deserialized from JSON)
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_origins: Option<Vec<String>>,
}

impl ServerFileConfig {
    fn merge(self, other: Self) -> Self {
        Self {
            host: other.host.or(self.host),
            port: other.port.or(self.port),
            cors_origins: other.cors_origins.or(self.cors_origins),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthFileConfig {
    pub enabled: Option<bool>,
    pub token_secret: Option<String>,
    pub token_expiry_days: Option<u32>,
}

impl AuthFileConfig {
    fn merge(self, other: Self) -> Self {
        Self {
            enabled: other.enabled.or(self.enabled),
            token_secret: other.token_secret.or(self.token_secret),
            token_expiry_days: other.token_expiry_days.or(self.token_expiry_days),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LlmFileConfig {
    pub enabled: Option<bool>,
    pub model: Option<String>,
    pub region: Option<String>,
}

impl LlmFileConfig {
    fn merge(self, other: Self) -> Self {
        Self {
            enabled: other.enabled.or(self.enabled),
            model: other.model.or(self.model),
            region: other.region.or(self.region),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AdapterEndpointFileConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl AdapterEndpointFileConfig {
    fn merge(self, other: Self) -> Self {
        Self {
            endpoint: other.endpoint.or(self.endpoint),
            api_key: other.api_key.or(self.api_key),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PipelineFileConfig {
    pub mock_enabled: Option<bool>,
    pub streaming_enabled: Option<bool>,
    pub max_conversation_history: Option<usize>,
}

impl PipelineFileConfig {
    fn merge(self, other: Self) -> Self {
        Self {
            mock_enabled: other.mock_enabled.or(self.mock_enabled),
            streaming_enabled: other.streaming_enabled.or(self.streaming_enabled),
            max_conversation_history: other
                .max_conversation_history
                .or(self.max_conversation_history),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UpdateFileConfig {
    pub enabled: Option<bool>,
}

impl UpdateFileConfig {
    fn merge(self, other: Self) -> Self {
        Self {
            enabled: other.enabled.or(self.enabled),
        }
    }
}

/// Top-level JSON config file shape. Every field is optional; a config file
/// only needs to specify the values it wants to override.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileConfig {
    #[serde(default)]
    pub debug: Option<bool>,
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub auth: AuthFileConfig,
    #[serde(default)]
    pub llm: LlmFileConfig,
    #[serde(default)]
    pub retrieval: AdapterEndpointFileConfig,
    #[serde(default)]
    pub analytics: AdapterEndpointFileConfig,
    #[serde(default)]
    pub pipeline: PipelineFileConfig,
    #[serde(default)]
    pub update: UpdateFileConfig,
}

impl FileConfig {
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            debug: other.debug.or(self.debug),
            server: self.server.merge(other.server),
            auth: self.auth.merge(other.auth),
            llm: self.llm.merge(other.llm),
            retrieval: self.retrieval.merge(other.retrieval),
            analytics: self.analytics.merge(other.analytics),
            pipeline: self.pipeline.merge(other.pipeline),
            update: self.update.merge(other.update),
        }
    }

    /// Build a file-layer config from CLI flags / environment variables
    fn from_cli(cli: &CliConfig) -> Self {
        Self {
            debug: if cli.debug { Some(true) } else { None },
            server: ServerFileConfig {
                host: cli.host.clone(),
                port: cli.port,
                cors_origins: cli.cors_origins.as_deref().map(parse_string_array),
            },
            auth: AuthFileConfig {
                enabled: if cli.auth_enabled { Some(true) } else { None },
                token_secret: cli.token_secret.clone(),
                token_expiry_days: cli.token_expiry_days,
            },
            llm: LlmFileConfig {
                enabled: if cli.llm_enabled { Some(true) } else { None },
                model: cli.llm_model.clone(),
                region: cli.llm_region.clone(),
            },
            retrieval: AdapterEndpointFileConfig {
                endpoint: cli.retrieval_endpoint.clone(),
                api_key: cli.retrieval_api_key.clone(),
            },
            analytics: AdapterEndpointFileConfig {
                endpoint: cli.analytics_endpoint.clone(),
                api_key: cli.analytics_api_key.clone(),
            },
            pipeline: PipelineFileConfig {
                mock_enabled: if cli.mock_enabled { Some(true) } else { None },
                streaming_enabled: if cli.streaming_enabled {
                    Some(true)
                } else {
                    None
                },
                max_conversation_history: cli.max_conversation_history,
            },
            update: UpdateFileConfig {
                enabled: if cli.no_update_check { Some(false) } else { None },
            },
        }
    }
}

// =============================================================================
// Runtime config (fully resolved, no Options where a default always applies)
// =============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub enabled: bool,
    pub token_secret: String,
    pub token_expiry_days: u32,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub enabled: bool,
    pub model: String,
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct AdapterEndpointConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

impl AdapterEndpointConfig {
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mock_enabled: bool,
    pub streaming_enabled: bool,
    pub max_conversation_history: usize,
}

#[derive(Debug, Clone)]
pub struct UpdateConfig {
    pub enabled: bool,
}

/// Fully resolved application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub debug: bool,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub llm: LlmConfig,
    pub retrieval: AdapterEndpointConfig,
    pub analytics: AdapterEndpointConfig,
    pub pipeline: PipelineConfig,
    pub update: UpdateConfig,
    /// Data directory override passed on the CLI, resolved by `AppStorage`
    pub data_dir_override: Option<String>,
}

impl AppConfig {
    /// Load configuration, merging (in increasing precedence):
    /// 1. defaults
    /// 2. the profile-directory config file (`~/.chatdock/chatdock.json`)
    /// 3. an explicit `--config`/`CHATDOCK_CONFIG` file, if set
    /// 4. CLI flags / environment variables
    pub fn load(cli: &CliConfig) -> Result<Self> {
        let mut file_config = FileConfig::default();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            tracing::trace!(path = %profile_path.display(), "Loading profile config");
            file_config = file_config.merge(FileConfig::load_from_file(&profile_path)?);
        }

        if let Some(explicit_path) = &cli.config_path {
            let path = expand_path(explicit_path);
            tracing::trace!(path = %path.display(), "Loading explicit config");
            file_config = file_config.merge(FileConfig::load_from_file(&path)?);
        }

        file_config = file_config.merge(FileConfig::from_cli(cli));

        let config = Self {
            debug: file_config.debug.unwrap_or(false),
            server: ServerConfig {
                host: file_config
                    .server
                    .host
                    .unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: file_config.server.port.unwrap_or(DEFAULT_PORT),
                cors_origins: file_config.server.cors_origins.unwrap_or_default(),
            },
            auth: AuthConfig {
                enabled: file_config.auth.enabled.unwrap_or(false),
                token_secret: file_config.auth.token_secret.unwrap_or_else(|| {
                    tracing::warn!(
                        "No token secret configured; generating an ephemeral one for this process"
                    );
                    uuid::Uuid::new_v4().to_string()
                }),
                token_expiry_days: file_config
                    .auth
                    .token_expiry_days
                    .unwrap_or(DEFAULT_SESSION_TTL_DAYS),
            },
            llm: LlmConfig {
                enabled: file_config.llm.enabled.unwrap_or(false),
                model: file_config
                    .llm
                    .model
                    .unwrap_or_else(|| "anthropic.claude-3-5-sonnet-20241022-v2:0".to_string()),
                region: file_config.llm.region.unwrap_or_else(|| "us-east-1".to_string()),
            },
            retrieval: AdapterEndpointConfig {
                endpoint: file_config.retrieval.endpoint,
                api_key: file_config.retrieval.api_key,
            },
            analytics: AdapterEndpointConfig {
                endpoint: file_config.analytics.endpoint,
                api_key: file_config.analytics.api_key,
            },
            pipeline: PipelineConfig {
                mock_enabled: file_config.pipeline.mock_enabled.unwrap_or(false),
                streaming_enabled: file_config.pipeline.streaming_enabled.unwrap_or(true),
                max_conversation_history: file_config
                    .pipeline
                    .max_conversation_history
                    .unwrap_or(DEFAULT_MAX_CONVERSATION_HISTORY),
            },
            update: UpdateConfig {
                enabled: file_config.update.enabled.unwrap_or(true),
            },
            data_dir_override: cli.data_dir.clone(),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }
        if self.auth.enabled && self.auth.token_secret.len() < 16 {
            anyhow::bail!("Token secret must be at least 16 characters when auth is enabled");
        }
        Ok(())
    }
}

/// Get the profile config path (~/.chatdock/chatdock.json)
fn get_profile_config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

/// Check if host binds to all network interfaces
pub(crate) fn is_all_interfaces(host: &str) -> bool {
    matches!(host, "0.0.0.0" | "::" | "[::]")
}
