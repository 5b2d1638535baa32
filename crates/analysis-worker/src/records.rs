//! Per-ply and per-comment records shared by the pipeline, the job store
//! and the HTTP layer.

use game_replay::GameMetadata;
use serde::{Deserialize, Serialize};

use crate::analysis::GameSummary;

/// Engine facts for one half-move. Scores are normalized so that positive
/// favors White.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlyRecord {
    pub move_number: u32,
    pub played_move: String,
    pub eval: Option<i32>,
    pub best_move: Option<String>,
    pub depth: Option<u32>,
}

impl PlyRecord {
    /// Record for a ply whose engine session failed.
    pub fn unevaluated(move_number: u32, played_move: String) -> Self {
        Self {
            move_number,
            played_move,
            eval: None,
            best_move: None,
            depth: None,
        }
    }

    pub fn is_evaluated(&self) -> bool {
        self.eval.is_some()
    }
}

/// One coaching remark. Advisory: keyed by `move_number`, may be sparse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentaryRecord {
    pub move_number: u32,
    pub comment: String,
}

/// Everything the engine stage produced for one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameAnalysis {
    pub metadata: GameMetadata,
    pub records: Vec<PlyRecord>,
    pub summary: GameSummary,
}
