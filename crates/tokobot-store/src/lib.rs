//! # tokobot-store
//!
//! Session store implementations: one opaque blob per client identity.
//!
//! - [`SqliteSessionStore`]: durable, sqlx-backed
//! - [`MemorySessionStore`]: process-local, for tests and ephemeral runs
//! - [`TimedStore`]: bounds every call of another store with a timeout

mod memory;
mod sqlite;
mod timed;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;
pub use timed::TimedStore;
