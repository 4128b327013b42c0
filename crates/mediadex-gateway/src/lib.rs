//! mediadex gateway crate - the external media indexing service.
//!
//! [`MediaGateway`] is the contract the job pipeline drives: submit media,
//! poll its processing state, fetch the generated content. The only
//! implementation talking to a real service is [`VideoIndexerClient`].

pub mod client;
pub mod error;
pub mod gateway;
pub mod summary;

pub use client::{GatewaySettings, VideoIndexerClient};
pub use error::GatewayError;
pub use gateway::{GatewayStatus, MediaGateway};
pub use summary::{SummaryLength, SummaryModel, SummaryRequest, SummaryStyle, ValidationError};
