//! Command line argument parsing

use clap::{Parser, Subcommand};

use super::constants::{DEFAULT_HOST, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(name = "chatdock", version, about = "Chat job-dispatcher backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Host to bind to
    #[arg(long, env = "CHATDOCK_HOST")]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(long, env = "CHATDOCK_PORT")]
    pub port: Option<u16>,

    /// Enable debug mode (verbose logging, request/response capture)
    #[arg(long, env = "CHATDOCK_DEBUG")]
    pub debug: bool,

    /// Path to a JSON config file (overrides the profile-directory config)
    #[arg(long, env = "CHATDOCK_CONFIG")]
    pub config: Option<String>,

    /// Override data directory
    #[arg(long, env = "CHATDOCK_DATA_DIR")]
    pub data_dir: Option<String>,

    /// Enable session authentication (disabled uses a fixed local user)
    #[arg(long, env = "CHATDOCK_AUTH_ENABLED")]
    pub auth_enabled: bool,

    /// HMAC secret used to sign session tokens
    #[arg(long, env = "CHATDOCK_TOKEN_SECRET")]
    pub token_secret: Option<String>,

    /// Session token expiry, in days
    #[arg(long, env = "CHATDOCK_TOKEN_EXPIRY_DAYS")]
    pub token_expiry_days: Option<u32>,

    /// Force the mock pipeline path regardless of adapter availability
    #[arg(long, env = "CHATDOCK_MOCK_ENABLED")]
    pub mock_enabled: bool,

    /// Enable the LLM adapter (Bedrock Converse API)
    #[arg(long, env = "CHATDOCK_LLM_ENABLED")]
    pub llm_enabled: bool,

    /// Bedrock model id used for chat completion
    #[arg(long, env = "CHATDOCK_LLM_MODEL")]
    pub llm_model: Option<String>,

    /// AWS region for the Bedrock runtime client
    #[arg(long, env = "CHATDOCK_LLM_REGION")]
    pub llm_region: Option<String>,

    /// Enable token-level streaming responses
    #[arg(long, env = "CHATDOCK_STREAMING_ENABLED")]
    pub streaming_enabled: bool,

    /// Maximum number of prior messages included as conversation context
    #[arg(long, env = "CHATDOCK_MAX_HISTORY")]
    pub max_conversation_history: Option<usize>,

    /// Retrieval adapter base URL (kNN + lexical search service)
    #[arg(long, env = "CHATDOCK_RETRIEVAL_ENDPOINT")]
    pub retrieval_endpoint: Option<String>,

    /// Retrieval adapter API key
    #[arg(long, env = "CHATDOCK_RETRIEVAL_API_KEY")]
    pub retrieval_api_key: Option<String>,

    /// Analytics adapter base URL (submits/polls search jobs)
    #[arg(long, env = "CHATDOCK_ANALYTICS_ENDPOINT")]
    pub analytics_endpoint: Option<String>,

    /// Analytics adapter API key
    #[arg(long, env = "CHATDOCK_ANALYTICS_API_KEY")]
    pub analytics_api_key: Option<String>,

    /// Allowed CORS origins (comma-separated, or JSON array)
    #[arg(long, env = "CHATDOCK_CORS_ORIGINS")]
    pub cors_origins: Option<String>,

    /// Disable the npm update check on startup
    #[arg(long, env = "CHATDOCK_NO_UPDATE_CHECK")]
    pub no_update_check: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the server (default)
    Start,
    /// System maintenance commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SystemCommands {
    /// Check that the local schema is migrated to the current version
    Migrate,
    /// Delete the local data directory
    Prune {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

/// CLI configuration resolved from parsed arguments, prior to merging
/// with file/env configuration layers.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub debug: bool,
    pub config_path: Option<String>,
    pub data_dir: Option<String>,
    pub auth_enabled: bool,
    pub token_secret: Option<String>,
    pub token_expiry_days: Option<u32>,
    pub mock_enabled: bool,
    pub llm_enabled: bool,
    pub llm_model: Option<String>,
    pub llm_region: Option<String>,
    pub streaming_enabled: bool,
    pub max_conversation_history: Option<usize>,
    pub retrieval_endpoint: Option<String>,
    pub retrieval_api_key: Option<String>,
    pub analytics_endpoint: Option<String>,
    pub analytics_api_key: Option<String>,
    pub cors_origins: Option<String>,
    pub no_update_check: bool,
}

/// Parse CLI arguments, returning the resolved config and any subcommand
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();

    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        debug: cli.debug,
        config_path: cli.config,
        data_dir: cli.data_dir,
        auth_enabled: cli.auth_enabled,
        token_secret: cli.token_secret,
        token_expiry_days: cli.token_expiry_days,
        mock_enabled: cli.mock_enabled,
        llm_enabled: cli.llm_enabled,
        llm_model: cli.llm_model,
        llm_region: cli.llm_region,
        streaming_enabled: cli.streaming_enabled,
        max_conversation_history: cli.max_conversation_history,
        retrieval_endpoint: cli.retrieval_endpoint,
        retrieval_api_key: cli.retrieval_api_key,
        analytics_endpoint: cli.analytics_endpoint,
        analytics_api_key: cli.analytics_api_key,
        cors_origins: cli.cors_origins,
        no_update_check: cli.no_update_check,
    };

    (config, cli.command)
}

impl CliConfig {
    /// Default host, falling back to the platform default
    pub fn host_or_default(&self) -> String {
        self.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string())
    }

    /// Default port, falling back to the platform default
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_or_default() {
        let cfg = CliConfig::default();
        assert_eq!(cfg.host_or_default(), DEFAULT_HOST);
    }

    #[test]
    fn test_port_or_default() {
        let cfg = CliConfig::default();
        assert_eq!(cfg.port_or_default(), DEFAULT_PORT);
    }
}
