//! Immutable position snapshots handed to the engine.

use serde::{Deserialize, Serialize};
use shakmaty::{fen::Fen, san::San, CastlingMode, Chess, Color, EnPassantMode, Move, Position};

use crate::error::ParseError;

/// Side to move in a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// Engine scores are reported from the mover's point of view; this is
    /// the factor that turns them into White's point of view.
    pub fn score_sign(self) -> i32 {
        match self {
            Side::White => 1,
            Side::Black => -1,
        }
    }

    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

/// A serialized board state plus the board it was derived from.
///
/// Produced by the replay, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct GamePosition {
    board: Chess,
    fen: String,
}

impl GamePosition {
    pub fn startpos() -> Self {
        Self::from_board(Chess::default())
    }

    pub fn from_fen(fen: &str) -> Result<Self, ParseError> {
        let parsed: Fen = fen
            .trim()
            .parse()
            .map_err(|e| ParseError::InvalidFen(format!("{fen}: {e}")))?;
        let board = parsed
            .into_position::<Chess>(CastlingMode::Standard)
            .map_err(|e| ParseError::InvalidFen(format!("{fen}: {e}")))?;
        Ok(Self::from_board(board))
    }

    pub(crate) fn from_board(board: Chess) -> Self {
        let fen = Fen::from_position(&board, EnPassantMode::Legal).to_string();
        Self { board, fen }
    }

    /// FEN string, as sent with `position fen`.
    pub fn fen(&self) -> &str {
        &self.fen
    }

    pub fn side_to_move(&self) -> Side {
        self.board.turn().into()
    }

    pub fn board(&self) -> &Chess {
        &self.board
    }

    pub fn is_checkmate(&self) -> bool {
        self.board.is_checkmate()
    }

    /// Position after playing `mv`, which must be legal here.
    pub(crate) fn after(&self, mv: Move) -> Self {
        let mut board = self.board.clone();
        board.play_unchecked(mv);
        Self::from_board(board)
    }
}

/// SAN with check/mate suffix for a legal move at `board`.
pub(crate) fn display_san(board: &Chess, mv: Move) -> String {
    let mut san = San::from_move(board, mv.clone()).to_string();
    let mut after = board.clone();
    after.play_unchecked(mv);
    if after.is_checkmate() {
        san.push('#');
    } else if after.is_check() {
        san.push('+');
    }
    san
}
