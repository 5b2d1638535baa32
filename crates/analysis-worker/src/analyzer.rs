//! Per-game analysis pipeline
//!
//! Replays the transcript and runs one engine session per ply. An engine
//! failure empties that ply's record and the game carries on.

use std::sync::Arc;

use game_replay::{translate_engine_move, GamePosition, GameReplay};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::analysis;
use crate::config::{EngineSettings, EngineTimeouts};
use crate::error::{AnalysisError, EngineFailure};
use crate::records::{GameAnalysis, PlyRecord};
use crate::stockfish::{evaluate_position, EngineLauncher, StockfishLauncher};
use crate::uci::SearchOutcome;

/// Search parameters injected into the analyzer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalysisSettings {
    pub depth: u32,

    /// Concurrent engine sessions per game (1 = strictly sequential)
    pub engine_workers: usize,

    pub timeouts: EngineTimeouts,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            depth: 12,
            engine_workers: 1,
            timeouts: EngineTimeouts::default(),
        }
    }
}

impl From<&EngineSettings> for AnalysisSettings {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            depth: settings.depth,
            engine_workers: settings.engine_workers,
            timeouts: settings.timeouts,
        }
    }
}

/// Drives replay and engine sessions for whole games.
#[derive(Clone)]
pub struct GameAnalyzer {
    launcher: Arc<dyn EngineLauncher>,
    settings: AnalysisSettings,
}

impl GameAnalyzer {
    pub fn new(launcher: Arc<dyn EngineLauncher>, settings: AnalysisSettings) -> Self {
        Self { launcher, settings }
    }

    /// Analyzer backed by the configured Stockfish binary.
    pub fn stockfish(settings: &EngineSettings) -> Self {
        Self::new(
            Arc::new(StockfishLauncher::new(settings)),
            AnalysisSettings::from(settings),
        )
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Analyze a full movetext transcript.
    ///
    /// Only an unreadable transcript is an error; engine failures show up
    /// as absent fields in the affected records.
    pub async fn analyze_transcript(&self, pgn: &str) -> Result<GameAnalysis, AnalysisError> {
        let mut replay = GameReplay::from_transcript(pgn)?;
        let plies = replay.ply_count();
        let first_mover = replay.start_position().side_to_move();

        info!(
            plies,
            depth = self.settings.depth,
            engine_workers = self.settings.engine_workers,
            "Starting analysis"
        );

        let records = if self.worker_count() <= 1 {
            self.analyze_sequential(&mut replay).await?
        } else {
            self.analyze_pooled(&replay).await?
        };

        let ends_in_checkmate = replay.final_position().is_checkmate();
        let summary = analysis::summarize(&records, first_mover, ends_in_checkmate);

        let evaluated = records.iter().filter(|r| r.is_evaluated()).count();
        info!(
            plies,
            evaluated,
            white_accuracy = summary.white.accuracy,
            black_accuracy = summary.black.accuracy,
            "Analysis complete"
        );

        Ok(GameAnalysis {
            metadata: replay.metadata().clone(),
            records,
            summary,
        })
    }

    /// Engine sessions per game, capped at the CPU count.
    fn worker_count(&self) -> usize {
        self.settings.engine_workers.min(num_cpus::get()).max(1)
    }

    async fn analyze_sequential(&self, replay: &mut GameReplay) -> Result<Vec<PlyRecord>, AnalysisError> {
        let total = replay.ply_count();
        let mut records = Vec::with_capacity(total);

        for ply in 1..=total {
            let before = replay.position_before_ply(ply)?;
            let played = replay.played_move(ply)?.san.clone();

            let outcome = evaluate_position(
                self.launcher.as_ref(),
                before.fen(),
                self.settings.depth,
                self.settings.timeouts,
            )
            .await;
            records.push(build_record(ply, played, &before, outcome));

            replay.apply_ply(ply)?;
        }

        Ok(records)
    }

    /// Bounded pool keyed by ply index. Results land in their slot, not in
    /// completion order.
    async fn analyze_pooled(&self, replay: &GameReplay) -> Result<Vec<PlyRecord>, AnalysisError> {
        let total = replay.ply_count();
        let workers = self.worker_count();
        debug!(workers, total, "Evaluating plies on worker pool");

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        let mut played_moves = Vec::with_capacity(total);

        let mut cursor = replay.clone();
        for ply in 1..=total {
            let before = cursor.position_before_ply(ply)?;
            let played = cursor.played_move(ply)?.san.clone();
            played_moves.push(played.clone());
            cursor.apply_ply(ply)?;

            let launcher = self.launcher.clone();
            let semaphore = semaphore.clone();
            let settings = self.settings;
            tasks.spawn(async move {
                // The semaphore is never closed
                let _permit = semaphore.acquire_owned().await;
                let outcome =
                    evaluate_position(launcher.as_ref(), before.fen(), settings.depth, settings.timeouts)
                        .await;
                (ply, build_record(ply, played, &before, outcome))
            });
        }

        let mut slots: Vec<Option<PlyRecord>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((ply, record)) => slots[ply - 1] = Some(record),
                Err(e) => error!(error = %e, "Ply evaluation task failed"),
            }
        }

        Ok(slots
            .into_iter()
            .zip(played_moves)
            .enumerate()
            .map(|(idx, (slot, played))| {
                slot.unwrap_or_else(|| PlyRecord::unevaluated(idx as u32 + 1, played))
            })
            .collect())
    }
}

/// Turn one session result into a record. `before` is the position the
/// engine searched, which is also where its candidate move is legal.
fn build_record(
    ply: usize,
    played_move: String,
    before: &GamePosition,
    outcome: Result<SearchOutcome, EngineFailure>,
) -> PlyRecord {
    let move_number = ply as u32;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(ply, reason = e.reason(), error = %e, "Engine failed, ply left unevaluated");
            return PlyRecord::unevaluated(move_number, played_move);
        }
    };

    let eval = outcome
        .score
        .map(|score| score.to_centipawns() * before.side_to_move().score_sign());

    let best_move = outcome.best_move.as_deref().and_then(|token| {
        let san = translate_engine_move(token, before);
        if san.is_none() {
            debug!(ply, token, fen = before.fen(), "Engine move not legal in replayed position");
        }
        san
    });

    PlyRecord {
        move_number,
        played_move,
        eval,
        best_move,
        depth: outcome.depth,
    }
}
