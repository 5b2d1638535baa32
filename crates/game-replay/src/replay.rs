//! Ply cursor over a loaded transcript.

use shakmaty::uci::UciMove;

use crate::error::{ParseError, ReplayError};
use crate::game_data::GameMetadata;
use crate::pgn::{load_transcript, PlayedMove, Transcript};
use crate::position::{display_san, GamePosition};

/// Walks a game forward one ply at a time.
///
/// Plies are 1-based: ply `n` is the n-th half-move of the transcript and
/// `position_before_ply(n)` is the board it was played on.
#[derive(Debug, Clone)]
pub struct GameReplay {
    transcript: Transcript,
    current: GamePosition,
    applied: usize,
}

impl GameReplay {
    pub fn from_transcript(text: &str) -> Result<Self, ParseError> {
        Ok(Self::new(load_transcript(text)?))
    }

    pub fn new(transcript: Transcript) -> Self {
        let current = transcript.start.clone();
        Self {
            transcript,
            current,
            applied: 0,
        }
    }

    pub fn metadata(&self) -> &GameMetadata {
        &self.transcript.metadata
    }

    pub fn ply_count(&self) -> usize {
        self.transcript.moves.len()
    }

    /// Number of plies already applied to the cursor.
    pub fn plies_applied(&self) -> usize {
        self.applied
    }

    /// Position before the first ply.
    pub fn start_position(&self) -> &GamePosition {
        &self.transcript.start
    }

    pub fn current_position(&self) -> &GamePosition {
        &self.current
    }

    pub fn played_move(&self, ply: usize) -> Result<&PlayedMove, ReplayError> {
        self.check_range(ply)?;
        Ok(&self.transcript.moves[ply - 1])
    }

    /// Position immediately before ply `ply` is played.
    ///
    /// Cheap when `ply` is the next ply to apply; any other ply is
    /// re-derived from the start position.
    pub fn position_before_ply(&self, ply: usize) -> Result<GamePosition, ReplayError> {
        self.check_range(ply)?;
        if ply == self.applied + 1 {
            return Ok(self.current.clone());
        }

        let mut pos = self.transcript.start.clone();
        for played in &self.transcript.moves[..ply - 1] {
            pos = pos.after(played.mv.clone());
        }
        Ok(pos)
    }

    /// Advance the cursor by playing ply `ply`, which must be the next one.
    pub fn apply_ply(&mut self, ply: usize) -> Result<(), ReplayError> {
        self.check_range(ply)?;
        if ply != self.applied + 1 {
            return Err(ReplayError::OutOfOrder {
                expected: self.applied + 1,
                requested: ply,
            });
        }

        let mv = self.transcript.moves[ply - 1].mv.clone();
        self.current = self.current.after(mv);
        self.applied = ply;
        Ok(())
    }

    /// Position after the last ply of the game.
    pub fn final_position(&self) -> GamePosition {
        let mut pos = self.current.clone();
        for played in &self.transcript.moves[self.applied..] {
            pos = pos.after(played.mv.clone());
        }
        pos
    }

    /// See [`translate_engine_move`].
    pub fn translate_engine_move(&self, token: &str, at: &GamePosition) -> Option<String> {
        translate_engine_move(token, at)
    }

    fn check_range(&self, ply: usize) -> Result<(), ReplayError> {
        let total = self.ply_count();
        if ply == 0 || ply > total {
            return Err(ReplayError::PlyOutOfRange { ply, total });
        }
        Ok(())
    }
}

/// Convert an engine coordinate move (`e7e5`, `e7e8q`) into SAN at `at`.
///
/// Returns `None` when the token is malformed or illegal in that position.
pub fn translate_engine_move(token: &str, at: &GamePosition) -> Option<String> {
    let uci: UciMove = token.trim().parse().ok()?;
    let mv = uci.to_move(at.board()).ok()?;
    Some(display_san(at.board(), mv))
}
