//! Game replay: movetext loading, ply-by-ply board state and notation
//! conversion between engine coordinate moves and SAN.

pub mod error;
pub mod game_data;
pub mod pgn;
pub mod position;
pub mod replay;

pub use error::{ParseError, ReplayError};
pub use game_data::GameMetadata;
pub use pgn::{load_transcript, PlayedMove, Transcript};
pub use position::{GamePosition, Side};
pub use replay::{translate_engine_move, GameReplay};
