//! Worker and pipeline error types

use std::time::Duration;

use game_replay::{ParseError, ReplayError};
use thiserror::Error;

use crate::jobs::{JobId, JobStatus};

/// One engine session failed. Recoverable per ply; never retried here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineFailure {
    #[error("Failed to spawn engine: {0}")]
    Spawn(String),

    #[error("Engine I/O error: {0}")]
    Io(String),

    #[error("Engine not ready after {0:?}")]
    ReadyTimeout(Duration),

    #[error("Search did not finish within {0:?}")]
    SearchTimeout(Duration),

    #[error("Engine did not exit within {0:?}")]
    ExitTimeout(Duration),

    #[error("Engine exited (code {0:?}) before reporting a best move")]
    Crashed(Option<i32>),

    #[error("Engine exited with code {0:?}")]
    BadExit(Option<i32>),
}

impl EngineFailure {
    /// Stable reason code for logs and API consumers.
    pub fn reason(&self) -> &'static str {
        match self {
            EngineFailure::Spawn(_) => "spawn",
            EngineFailure::Io(_) => "io",
            EngineFailure::ReadyTimeout(_) => "ready_timeout",
            EngineFailure::SearchTimeout(_) => "search_timeout",
            EngineFailure::ExitTimeout(_) => "exit_timeout",
            EngineFailure::Crashed(_) => "crashed",
            EngineFailure::BadExit(_) => "bad_exit",
        }
    }
}

/// The generated commentary could not be used.
#[derive(Error, Debug)]
pub enum CommentaryError {
    #[error("Commentary reply has no JSON array")]
    Format,

    #[error("Commentary reply is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Text generation request failed: {0}")]
    Generation(String),

    #[error("Text generation timed out after {0:?}")]
    Timeout(Duration),
}

/// A job record could not be read or written.
#[derive(Error, Debug)]
pub enum PersistenceFailure {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Stored job data is malformed: {0}")]
    Corrupt(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Transcript-level failure of a whole analysis.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("SQS error: {0}")]
    Sqs(String),

    #[error("Secrets Manager error: {0}")]
    SecretsManager(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceFailure),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
