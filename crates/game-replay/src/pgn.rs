//! Movetext loading: lightweight regex-based parser with permissive
//! move resolution.

use regex::Regex;
use shakmaty::{san::San, uci::UciMove, CastlingMode, Chess, Move, Position, Role};

use crate::error::ParseError;
use crate::game_data::GameMetadata;
use crate::position::{display_san, GamePosition};

/// One half-move of the transcript, already validated against the board.
#[derive(Debug, Clone)]
pub struct PlayedMove {
    /// Canonical SAN with check suffix, whatever form the transcript used
    pub san: String,
    /// Coordinate form, e.g. `e2e4`
    pub uci: String,
    pub(crate) mv: Move,
}

/// A loaded game: headers, start position and the legal move sequence.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub metadata: GameMetadata,
    pub start: GamePosition,
    pub moves: Vec<PlayedMove>,
}

/// Parse a movetext string into a validated move sequence.
///
/// Tolerates comments, variations, NAGs, move numbers, result tokens and
/// the usual notation slips (`0-0`, `e2e4`, `Ng1f3`, missing `x`).
pub fn load_transcript(text: &str) -> Result<Transcript, ParseError> {
    let (metadata, start_fen) = parse_headers(text);

    let start = match start_fen {
        Some(fen) => GamePosition::from_fen(&fen)?,
        None => GamePosition::startpos(),
    };

    let tokens = movetext_tokens(text);
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut board = start.board().clone();
    let mut moves = Vec::with_capacity(tokens.len());

    for (i, token) in tokens.iter().enumerate() {
        let mv = resolve_move(&board, token).ok_or_else(|| ParseError::IllegalMove {
            ply: i + 1,
            token: token.clone(),
        })?;

        let san = display_san(&board, mv.clone());
        let uci = mv.to_uci(CastlingMode::Standard).to_string();
        board.play_unchecked(mv.clone());
        moves.push(PlayedMove { san, uci, mv });
    }

    Ok(Transcript {
        metadata,
        start,
        moves,
    })
}

/// Extract header tags. Returns the metadata and the `FEN` tag, if any.
fn parse_headers(text: &str) -> (GameMetadata, Option<String>) {
    let header_re = Regex::new(r#"\[(\w+)\s+"((?:[^"\\]|\\.)*)"\s*\]"#).unwrap();

    let mut metadata = GameMetadata::default();
    let mut fen = None;

    for cap in header_re.captures_iter(text) {
        let value = cap[2].replace(r#"\""#, "\"").replace(r"\\", r"\");
        match &cap[1] {
            "White" => metadata.white = value,
            "Black" => metadata.black = value,
            "Result" => metadata.result = value,
            "Date" => metadata.date = Some(value),
            "TimeControl" => metadata.time_control = Some(value),
            "ECO" => metadata.eco = Some(value),
            "Event" => metadata.event = Some(value),
            "Link" => metadata.link = Some(value),
            "FEN" if !value.trim().is_empty() => fen = Some(value),
            _ => {}
        }
    }

    (metadata, fen)
}

/// Split movetext into candidate move tokens, dropping everything that
/// is not a move.
fn movetext_tokens(text: &str) -> Vec<String> {
    // Tag values may hold brackets, so match on the quoted value
    let header_re = Regex::new(r#"\[\w+\s+"(?:[^"\\]|\\.)*"\s*\]"#).unwrap();
    let no_headers = header_re.replace_all(text, " ");

    let comment_re = Regex::new(r"\{[^}]*\}|;[^\n]*").unwrap();
    let no_comments = comment_re.replace_all(&no_headers, " ");

    let movetext = strip_variations(&no_comments);

    let number_re = Regex::new(r"^\d+\.+").unwrap();

    movetext
        .split_whitespace()
        .filter_map(|raw| {
            if is_result(raw) {
                return None;
            }
            let token = number_re.replace(raw, "");
            let token = token.trim_start_matches('.');
            let token = token.strip_suffix("e.p.").unwrap_or(token);
            if token.is_empty() || is_result(token) || token.starts_with('$') {
                return None;
            }
            // Bare annotation glyphs separated from their move
            if token.chars().all(|c| c == '!' || c == '?') {
                return None;
            }
            Some(token.to_string())
        })
        .collect()
}

/// Remove `( ... )` variations, including nested ones.
fn strip_variations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

fn is_result(token: &str) -> bool {
    matches!(token, "1-0" | "0-1" | "1/2-1/2" | "½-½" | "*")
}

/// Resolve one token to a legal move at `board`, trying SAN first and
/// coordinate forms after.
fn resolve_move(board: &Chess, token: &str) -> Option<Move> {
    let clean = token.trim_end_matches(|c: char| matches!(c, '+' | '#' | '!' | '?'));
    let clean = match clean {
        "0-0" | "o-o" => "O-O",
        "0-0-0" | "o-o-o" => "O-O-O",
        other => other,
    };

    if let Ok(san) = clean.parse::<San>() {
        if let Ok(mv) = san.to_move(board) {
            return Some(mv);
        }
    }

    coordinate_move(board, clean)
}

/// `e2e4`, `e2-e4`, `e7e8=Q`, `Ng1f3` and friends.
fn coordinate_move(board: &Chess, token: &str) -> Option<Move> {
    let first = token.chars().next()?;
    let (role, rest) = if matches!(first, 'K' | 'Q' | 'R' | 'B' | 'N' | 'P') {
        (Role::from_char(first.to_ascii_lowercase()), &token[1..])
    } else {
        (None, token)
    };

    let compact: String = rest
        .chars()
        .filter(|c| !matches!(c, '-' | 'x' | ':' | '='))
        .collect::<String>()
        .to_ascii_lowercase();

    let uci: UciMove = compact.parse().ok()?;
    let mv = uci.to_move(board).ok()?;

    match role {
        Some(expected) if expected != mv.role() => None,
        _ => Some(mv),
    }
}
