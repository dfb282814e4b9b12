// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "ChatDock";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "chatdock";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".chatdock";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "chatdock.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "CHATDOCK_CONFIG";

// =============================================================================
// Environment Variables - Debug
// =============================================================================

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "CHATDOCK_DEBUG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "CHATDOCK_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "CHATDOCK_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "CHATDOCK_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5588;

// =============================================================================
// Environment Variables - Storage
// =============================================================================

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "CHATDOCK_DATA_DIR";

// =============================================================================
// Authentication
// =============================================================================

/// Environment variable for the session token signing secret
pub const ENV_TOKEN_SECRET: &str = "CHATDOCK_TOKEN_SECRET";

/// Cookie name for session token
pub const SESSION_COOKIE_NAME: &str = "chatdock_session";

/// Default session TTL in days
pub const DEFAULT_SESSION_TTL_DAYS: u32 = 30;

/// Default user id used when auth is disabled (single-user local mode)
pub const DEFAULT_USER_ID: &str = "local";

// =============================================================================
// SQLite Database
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "chatdock.db";

/// SQLite connection pool max connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite cache size (negative = KB, so -64000 = 64MB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

/// SQLite WAL auto-checkpoint threshold (pages, ~4MB at 1000)
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// WAL checkpoint interval in seconds (5 minutes)
pub const SQLITE_CHECKPOINT_INTERVAL_SECS: u64 = 300;

// =============================================================================
// Request Body Limits
// =============================================================================

/// Default body limit for API requests (2 MB, messages can carry block payloads)
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

// =============================================================================
// Shutdown
// =============================================================================

/// Graceful shutdown timeout in seconds
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Update Check
// =============================================================================

/// NPM registry URL for checking latest version
pub const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org/chatdock/latest";

/// Update check HTTP timeout in seconds
pub const UPDATE_CHECK_TIMEOUT_SECS: u64 = 3;

/// Number of retry attempts for update check
pub const UPDATE_CHECK_RETRIES: u32 = 2;

/// Delay between retry attempts in milliseconds
pub const UPDATE_CHECK_RETRY_DELAY_MS: u64 = 500;

/// Environment variable to disable update check
pub const ENV_NO_UPDATE_CHECK: &str = "CHATDOCK_NO_UPDATE_CHECK";

// =============================================================================
// Event Bus (C1)
// =============================================================================

/// Topic for stream start events
pub const TOPIC_STREAM_START: &str = "stream.start";

/// Topic for stream token events
pub const TOPIC_STREAM_TOKEN: &str = "stream.token";

/// Topic for stream end events
pub const TOPIC_STREAM_END: &str = "stream.end";

/// Topic for job status/progress updates
pub const TOPIC_JOB_UPDATE: &str = "job.update";

/// Topic announcing a new persisted message (for late SSE joiners)
pub const TOPIC_MESSAGE_NEW: &str = "message.new";

/// Maximum buffered (undelivered) non-terminal events retained per topic
/// before the oldest non-terminal event is dropped.
pub const EVENT_BUS_MAX_QUEUE_DEPTH: usize = 1000;

// =============================================================================
// Task Scheduler (C4)
// =============================================================================

/// Size of the bounded worker pool used to offload blocking adapter I/O
pub const WORKER_POOL_SIZE: usize = 8;

/// Grace period allowed for in-flight jobs during shutdown (seconds)
pub const SCHEDULER_SHUTDOWN_GRACE_SECS: u64 = 10;

// =============================================================================
// External Adapters (C5)
// =============================================================================

/// Maximum connection-failure retry attempts before declaring `unavailable`
pub const ADAPTER_MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for adapter retry backoff (milliseconds)
pub const ADAPTER_RETRY_BASE_DELAY_MS: u64 = 200;

/// Hard per-call deadline for adapter calls (seconds)
pub const ADAPTER_CALL_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Pipeline / Conversation (C6)
// =============================================================================

/// Maximum number of prior messages included as conversation history context
pub const DEFAULT_MAX_CONVERSATION_HISTORY: usize = 20;

/// Default analytics query time window when a request doesn't specify one
/// (seconds), ending now
pub const DEFAULT_ANALYTICS_WINDOW_SECS: i64 = 86_400;

/// Retrieval adapter top-K document count for the `retrieve` stage
pub const DEFAULT_RETRIEVAL_TOP_K: usize = 5;

/// Characters of a retrieved document's content kept in the prompt blob
pub const RETRIEVAL_CONTENT_TRUNCATE_CHARS: usize = 500;

// =============================================================================
// SSE (Session Registry transport)
// =============================================================================

/// Interval between SSE keep-alive comment frames (seconds)
pub const SSE_KEEPALIVE_INTERVAL_SECS: u64 = 15;
