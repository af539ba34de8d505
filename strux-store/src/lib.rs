//! Session store backends for strux.
//!
//! Implements the [`strux_core::SessionStore`] contract twice: an
//! in-memory map for tests and short-lived processes, and a file-backed
//! store writing one JSON document per session for durability across
//! restarts. Both are last-writer-wins under concurrent writers; neither
//! attempts linearizable consistency.

/// File-backed store, one JSON document per session.
pub mod file;
/// In-memory store.
pub mod memory;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;
