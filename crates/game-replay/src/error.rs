use thiserror::Error;

/// A transcript that cannot be turned into a sequence of legal moves.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid or empty PGN: no moves found")]
    Empty,

    #[error("Illegal or unreadable move '{token}' at ply {ply}")]
    IllegalMove { ply: usize, token: String },

    #[error("Invalid FEN header: {0}")]
    InvalidFen(String),
}

/// Misuse of the ply cursor. These indicate a caller bug, not bad input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("Ply {ply} is out of range (game has {total} plies)")]
    PlyOutOfRange { ply: usize, total: usize },

    #[error("Ply {requested} cannot be applied next; expected ply {expected}")]
    OutOfOrder { expected: usize, requested: usize },
}
