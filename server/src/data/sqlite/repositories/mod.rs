//! Repository layer: typed query functions over the SQLite pool
//!
//! Each submodule owns one table and exposes plain async functions rather
//! than a trait — there is only ever one backend, so the indirection the
//! teacher used to support multiple repository implementations is dropped.

pub mod cached_query_result;
pub mod conversation;
pub mod job;
pub mod message;
