//! Runtime errors.

use thiserror::Error;

use crate::protocol::RpcError;

/// Errors surfaced to callers of the client.
#[derive(Debug, Error)]
pub enum Error {
    /// The service answered with an error envelope.
    #[error("{0}")]
    Server(RpcError),

    /// The cancel token was set while waiting for a job.
    #[error("job {job_id} was cancelled")]
    Cancelled { job_id: String },

    /// The transport failed to deliver the request or read the response.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response did not have the expected shape.
    #[error("malformed response: {0}")]
    Protocol(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
