//! Data storage layer
//!
//! - `sqlite` - the single embedded database: jobs, conversations, messages,
//!   cached query results.
//! - `error` - unified error type for the data layer.

pub mod error;
pub mod sqlite;

pub use error::DataError;
pub use sqlite::SqliteService;
