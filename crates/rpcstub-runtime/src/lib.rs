//! # rpcstub Runtime
//!
//! Reference implementation of the wire protocol that generated stubs speak:
//! JSON-RPC 1.1 envelopes, a job service that runs submitted calls on their
//! own worker threads, and a client that polls those jobs with bounded
//! exponential backoff.
//!
//! ```rust,ignore
//! use rpcstub_runtime::{client::Client, jobs::JobService};
//!
//! let mut service = JobService::default();
//! service.register("Calc", "add", false, |_, params| {
//!     let sum: i64 = params.iter().filter_map(|v| v.as_i64()).sum();
//!     Ok(vec![sum.into()])
//! });
//!
//! let client = Client::new(std::sync::Arc::new(service), "Calc");
//! let result = client.call_async("add", vec![1.into(), 2.into()], None)?;
//! ```

pub mod client;
pub mod error;
pub mod jobs;
pub mod protocol;

pub use error::{Error, Result};
