//! mediadex progress crate - the cross-process job progress board.
//!
//! Entries live in a shared SQLite file so the job workers, the HTTP layer
//! and any other process pointed at the same file see one board.

pub mod error;
pub mod migrations;
pub mod store;

pub use error::ProgressError;
pub use store::ProgressStore;
