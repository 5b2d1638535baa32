//! Move analysis pipeline: UCI engine sessions, the per-game coordinator,
//! coaching commentary and the durable job runner.

pub mod analysis;
pub mod analyzer;
pub mod commentary;
pub mod config;
pub mod db;
pub mod error;
pub mod gemini;
pub mod jobs;
pub mod records;
pub mod sqs;
pub mod stockfish;
pub mod uci;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use analyzer::{AnalysisSettings, GameAnalyzer};
pub use commentary::{Commentary, CommentarySynthesizer, TextGenerator};
pub use error::{AnalysisError, CommentaryError, EngineFailure, PersistenceFailure, WorkerError};
pub use jobs::{AnalysisJob, JobId, JobRunner, JobStatus, JobStore, NewJob};
pub use records::{CommentaryRecord, GameAnalysis, PlyRecord};
