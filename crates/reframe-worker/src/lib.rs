//! Command-line worker for vertical reframing.
//!
//! Runs exactly one job per invocation: it validates the request, owns the
//! temporary work directory, drives the reframe pipeline and removes partial
//! output on failure.

pub mod cli;
pub mod config;
pub mod error;
pub mod job;
pub mod logging;

pub use cli::Args;
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use job::{run_job, run_job_with};
pub use logging::{init_tracing, JobLogger};
