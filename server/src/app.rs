//! Core application

use std::sync::Arc;

use anyhow::Result;

use crate::api::ApiServer;
use crate::core::banner;
use crate::core::cli::{self, CliConfig, Commands, SystemCommands};
use crate::core::config::AppConfig;
use crate::core::constants::{
    APP_NAME_LOWER, ENV_LOG, TOPIC_JOB_UPDATE, TOPIC_MESSAGE_NEW, TOPIC_STREAM_END,
    TOPIC_STREAM_START, TOPIC_STREAM_TOKEN,
};
use crate::core::shutdown::ShutdownService;
use crate::core::storage::AppStorage;
use crate::core::update;
use crate::data::sqlite::SqliteService;
use crate::domain::adapters::analytics::{FakeAnalyticsAdapter, HttpAnalyticsAdapter};
use crate::domain::adapters::llm::{BedrockLlmAdapter, FakeLlmAdapter};
use crate::domain::adapters::retrieval::{FakeRetrievalAdapter, HttpRetrievalAdapter};
use crate::domain::adapters::{AdapterContainer, AnalyticsAdapter, LlmAdapter, RetrievalAdapter};
use crate::domain::conversation::ConversationService;
use crate::domain::events::EventBus;
use crate::domain::job::JobStore;
use crate::domain::pipeline::PipelineConfig as DomainPipelineConfig;
use crate::domain::query::QueryService;
use crate::domain::scheduler::TaskScheduler;
use crate::domain::session::{SessionEvent, SessionRegistry};

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: AppConfig,
    pub storage: AppStorage,
    pub database: Arc<SqliteService>,
    pub conversations: Arc<ConversationService>,
    pub jobs: Arc<JobStore>,
    pub events: Arc<EventBus>,
    pub sessions: Arc<SessionRegistry>,
    pub scheduler: Arc<TaskScheduler>,
    pub adapters: Arc<AdapterContainer>,
    pub query_service: Arc<QueryService>,
}

impl CoreApp {
    /// Run the application with CLI argument parsing
    pub async fn run() -> Result<()> {
        dotenvy::dotenv().ok();
        Self::init_logging();

        tracing::debug!("Application starting");

        let (cli_config, command) = cli::parse();
        tracing::trace!(command = ?command, "Parsed command");

        match command {
            Some(Commands::System { command: system_cmd }) => {
                return Self::handle_system_command(system_cmd);
            }
            Some(Commands::Start) | None => {}
        }

        let app = Self::init(&cli_config).await?;
        Self::start_server(app).await
    }

    async fn init(cli: &CliConfig) -> Result<Self> {
        let config = AppConfig::load(cli)?;
        let storage = AppStorage::init(&config).await?;
        let database = Arc::new(SqliteService::init(&storage).await?);
        let shutdown = ShutdownService::new(database.clone());

        let events = Arc::new(EventBus::with_max_queue_depth(
            crate::core::constants::EVENT_BUS_MAX_QUEUE_DEPTH,
        ));
        let sessions = Arc::new(SessionRegistry::new());

        let conversations = Arc::new(ConversationService::new(database.pool().clone()));
        let jobs = Arc::new(JobStore::new(database.pool().clone()));
        let scheduler = Arc::new(TaskScheduler::new(jobs.clone()));

        let llm: Arc<dyn LlmAdapter> = if config.llm.enabled {
            Arc::new(BedrockLlmAdapter::from_env(config.llm.model.clone()).await)
        } else {
            Arc::new(FakeLlmAdapter::unavailable())
        };

        let retrieval: Arc<dyn RetrievalAdapter> = match &config.retrieval.endpoint {
            Some(endpoint) => Arc::new(HttpRetrievalAdapter::new(endpoint.clone())),
            None => Arc::new(FakeRetrievalAdapter::unavailable()),
        };

        let analytics: Arc<dyn AnalyticsAdapter> = match &config.analytics.endpoint {
            Some(endpoint) => Arc::new(HttpAnalyticsAdapter::new(endpoint.clone())),
            None => Arc::new(FakeAnalyticsAdapter::unavailable()),
        };

        let adapters = Arc::new(AdapterContainer::new(llm, retrieval, analytics.clone()));
        let query_service = Arc::new(QueryService::new(database.pool().clone(), analytics));

        Ok(Self {
            shutdown,
            config,
            storage,
            database,
            conversations,
            jobs,
            events,
            sessions,
            scheduler,
            adapters,
            query_service,
        })
    }

    /// The resolved Pipeline Engine configuration, derived from `AppConfig`.
    pub fn pipeline_config(&self) -> DomainPipelineConfig {
        DomainPipelineConfig {
            streaming_enabled: self.config.pipeline.streaming_enabled,
            mock_enabled: self.config.pipeline.mock_enabled,
        }
    }

    fn handle_system_command(cmd: SystemCommands) -> Result<()> {
        match cmd {
            SystemCommands::Migrate => Self::check_migration(),
            SystemCommands::Prune { yes } => Self::prune_data(yes),
        }
    }

    fn check_migration() -> Result<()> {
        let data_dir = AppStorage::resolve_data_dir();
        println!("Data directory: {}", data_dir.display());
        println!("Schema version: {}", crate::data::sqlite::schema::SCHEMA_VERSION);
        Ok(())
    }

    fn prune_data(skip_confirm: bool) -> Result<()> {
        use anyhow::Context;

        let data_dir = AppStorage::resolve_data_dir();

        if !data_dir.exists() {
            println!(
                "Nothing to prune. Data directory does not exist: {}",
                data_dir.display()
            );
            return Ok(());
        }

        let data_dir = data_dir.canonicalize().unwrap_or(data_dir);

        println!("This will permanently delete the local data directory:");
        println!("  {}", data_dir.display());
        println!();
        println!(
            "Make sure the server is not running. \
             Deleting data while the server is running will cause data corruption."
        );

        if !skip_confirm {
            print!("\nContinue? [y/N] ");
            std::io::Write::flush(&mut std::io::stdout())?;

            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;

            if !matches!(input.trim().to_lowercase().as_str(), "y" | "yes") {
                println!("Aborted.");
                return Ok(());
            }
        }

        std::fs::remove_dir_all(&data_dir)
            .with_context(|| format!("Failed to delete data directory: {}", data_dir.display()))?;
        println!("Pruned: {}", data_dir.display());
        Ok(())
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);

        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }

    async fn start_server(app: Self) -> Result<()> {
        // Install signal handlers FIRST (before any blocking calls)
        app.shutdown.install_signal_handlers();

        // Spawn update check (runs in background, prints notification when ready)
        if app.config.update.enabled {
            tokio::spawn(async {
                if let Some(new_version) = update::check_for_update().await {
                    banner::print_update_available(update::current_version(), &new_version);
                }
            });
        } else {
            tracing::debug!("Update check disabled by config");
        }

        app.start_background_tasks().await?;

        banner::print_banner(
            &app.config.server.host,
            app.config.server.port,
            app.config.auth.enabled,
            &app.config.auth.token_secret,
            &app.storage.data_dir().display().to_string(),
        );

        let server = ApiServer::new(app);
        let app = server.start().await?;
        app.shutdown.shutdown().await;

        Ok(())
    }

    pub async fn start_background_tasks(&self) -> Result<()> {
        self.shutdown
            .register(self.database.start_checkpoint_task(self.shutdown.subscribe()))
            .await;

        self.bridge_events_to_sessions().await;

        tracing::debug!("Background tasks started");
        Ok(())
    }

    /// Wire the Event Bus (C1) to the Session Registry (C2): every event
    /// published on a topic a client cares about is forwarded to every
    /// attached SSE session as a `SessionEvent`. Without this bridge
    /// `events.publish(...)` calls from the pipeline and Stream Driver
    /// never reach a client.
    async fn bridge_events_to_sessions(&self) {
        for topic in [
            TOPIC_STREAM_START,
            TOPIC_STREAM_TOKEN,
            TOPIC_STREAM_END,
            TOPIC_JOB_UPDATE,
            TOPIC_MESSAGE_NEW,
        ] {
            let sessions = self.sessions.clone();
            self.events
                .subscribe(topic, move |event| {
                    let sessions = sessions.clone();
                    async move {
                        sessions
                            .broadcast(SessionEvent {
                                event_type: event.topic,
                                data: event.payload,
                            })
                            .await;
                        Ok(())
                    }
                })
                .await;
        }
    }
}
