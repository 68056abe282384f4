//! Mediaload API Library
//!
//! HTTP binding for the chunked upload assembler: handlers, error rendering,
//! routing and server setup.

pub mod error;
mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use handlers::upload::{UploadForm, UploadResponse};
