//! Domain logic: conversation orchestration, the Pipeline Engine, and the
//! external adapters/infrastructure it runs on.
//!
//! - `adapters` - LLM/retrieval/analytics backends behind narrow traits (C5)
//! - `blocks` - block taxonomy and the `extract_blocks` stage (§6)
//! - `conversation` - conversation/message orchestration over SQLite
//! - `error` - unified domain error type, mapped to the caller-facing taxonomy (§7)
//! - `events` - process-local event bus (C1)
//! - `job` - job lifecycle store enforcing the status DAG (C3)
//! - `mock` - mock response generator used when the LLM adapter is unavailable
//! - `pipeline` - the Pipeline Engine: classify/retrieve/generate/extract (C6)
//! - `query` - analytics query execution and result caching (§6)
//! - `scheduler` - bounded worker pool running pipeline/stream tasks (C4)
//! - `session` - live SSE session registry (C2)
//! - `stream_driver` - streamed assistant turns (C7)
//! - `time_bucket` - time series bucketing for the Visualization Classifier
//! - `visualization` - classifies analytics results into chart/table shapes (§4.6.3)

pub mod adapters;
pub mod blocks;
pub mod conversation;
pub mod error;
pub mod events;
pub mod job;
pub mod mock;
pub mod pipeline;
pub mod query;
pub mod scheduler;
pub mod session;
pub mod stream_driver;
pub mod time_bucket;
pub mod visualization;

pub use blocks::{Block, BlockType};
pub use conversation::{Conversation, ConversationService, Message, MessageRole};
pub use error::{ErrorKind, PipelineError};
pub use events::{Event, EventBus};
pub use job::{Job, JobStatus, JobStore, JobType};
pub use pipeline::{Intent, PipelineConfig, PipelineOutcome, PipelinePrep};
pub use query::{QueryResult, QueryService};
pub use scheduler::{CancelToken, TaskScheduler};
pub use session::{SessionEvent, SessionId, SessionRegistry};
pub use stream_driver::StreamDriver;
