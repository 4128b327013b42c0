//! mediadex jobs crate - the asynchronous job pipeline.
//!
//! A job is submitted to the [`JobRunner`], which hands it to a worker and
//! returns its id at once. The worker runs it through the [`Pipeline`]:
//! submit to the gateway, poll until processed, fetch and store the content,
//! insert it into the index. The poll/ingest stage runs under a bounded
//! [`RetryPolicy`]. Progress is published through a [`ProgressReporter`].

pub mod error;
pub mod pipeline;
pub mod poll;
pub mod reporter;
pub mod retry;
pub mod runner;
pub mod state_machine;
pub mod store;

pub use error::JobError;
pub use pipeline::{Pipeline, PipelineSettings};
pub use poll::{PollOutcome, PollSettings};
pub use reporter::{HttpReporter, ProgressReporter, StoreReporter};
pub use retry::RetryPolicy;
pub use runner::JobRunner;
pub use store::{JobStatusView, JobStore};
