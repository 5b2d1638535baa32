//! UCI output classification, kept apart from process I/O.

use serde::{Deserialize, Serialize};

/// Base magnitude for forced-mate scores.
pub const MATE_SCORE: i32 = 10_000;

/// Any score beyond this magnitude is a mate score.
pub const MATE_THRESHOLD: i32 = 9_000;

/// Score as reported by the engine, from the side to move's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Score {
    Centipawns(i32),
    /// Mate in N moves; negative means the side to move gets mated
    Mate(i32),
}

impl Score {
    /// Collapse onto a single integer scale where every mate sorts beyond
    /// every centipawn score.
    pub fn to_centipawns(self) -> i32 {
        match self {
            Score::Centipawns(cp) => cp.clamp(-MATE_THRESHOLD, MATE_THRESHOLD),
            Score::Mate(0) => -MATE_SCORE,
            Score::Mate(n) if n > 0 => MATE_SCORE - n,
            Score::Mate(n) => -MATE_SCORE - n,
        }
    }
}

/// Fields carried by an `info` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressInfo {
    pub depth: Option<u32>,
    pub score: Option<Score>,
    pub pv: Vec<String>,
}

impl ProgressInfo {
    /// `currmove`/`hashfull` chatter carries neither and never supersedes
    /// a real search report.
    pub fn is_report(&self) -> bool {
        self.score.is_some() || !self.pv.is_empty()
    }
}

/// One line of engine output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLine {
    Ready,
    Progress(ProgressInfo),
    /// `bestmove <token>`; `None` for `bestmove (none)`
    BestMove(Option<String>),
    Unrecognized,
}

/// Classify a raw output line.
pub fn classify_line(line: &str) -> EngineLine {
    let trimmed = line.trim();
    let mut parts = trimmed.split_whitespace();

    match parts.next() {
        Some("readyok") => EngineLine::Ready,
        Some("bestmove") => {
            let token = parts
                .next()
                .filter(|t| *t != "(none)" && *t != "0000")
                .map(String::from);
            EngineLine::BestMove(token)
        }
        Some("info") if !trimmed.starts_with("info string") => {
            EngineLine::Progress(parse_info(trimmed))
        }
        _ => EngineLine::Unrecognized,
    }
}

fn parse_info(line: &str) -> ProgressInfo {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut info = ProgressInfo::default();

    let mut i = 1;
    while i < parts.len() {
        match parts[i] {
            "depth" => {
                info.depth = parts.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            "score" => {
                let value = parts.get(i + 2).and_then(|v| v.parse::<i32>().ok());
                info.score = match (parts.get(i + 1).copied(), value) {
                    (Some("cp"), Some(cp)) => Some(Score::Centipawns(cp)),
                    (Some("mate"), Some(n)) => Some(Score::Mate(n)),
                    _ => info.score,
                };
                i += 3;
            }
            "pv" => {
                // pv runs to the end of the line
                info.pv = parts[i + 1..].iter().map(|m| m.to_string()).collect();
                break;
            }
            _ => i += 1,
        }
    }

    info
}

/// What a finished search produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub depth: Option<u32>,
    pub score: Option<Score>,
    pub best_move: Option<String>,
    pub pv: Vec<String>,
}

/// Consumes classified lines during one search.
///
/// Only the last report before `bestmove` counts; earlier reports are
/// replaced, not merged.
#[derive(Debug, Default)]
pub struct SearchTracker {
    last: Option<ProgressInfo>,
}

impl SearchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line. Returns the outcome once the terminating line arrives.
    pub fn observe(&mut self, line: EngineLine) -> Option<SearchOutcome> {
        match line {
            EngineLine::Progress(info) if info.is_report() => {
                self.last = Some(info);
                None
            }
            EngineLine::BestMove(best_move) => {
                // The bestmove token alone names the candidate
                let last = self.last.take().unwrap_or_default();
                Some(SearchOutcome {
                    depth: last.depth,
                    score: last.score,
                    best_move,
                    pv: last.pv,
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_progress() {
        let line = "info depth 20 seldepth 25 multipv 1 score cp 35 nodes 100000 nps 1000 pv e2e4 e7e5 g1f3";
        assert_eq!(
            classify_line(line),
            EngineLine::Progress(ProgressInfo {
                depth: Some(20),
                score: Some(Score::Centipawns(35)),
                pv: vec!["e2e4".into(), "e7e5".into(), "g1f3".into()],
            })
        );
    }

    #[test]
    fn test_classify_mate_and_bounds() {
        let line = "info depth 12 score mate -3 upperbound nodes 10 pv h7h6";
        match classify_line(line) {
            EngineLine::Progress(info) => assert_eq!(info.score, Some(Score::Mate(-3))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_classify_other_lines() {
        assert_eq!(classify_line("readyok\n"), EngineLine::Ready);
        assert_eq!(
            classify_line("bestmove e7e5 ponder g1f3"),
            EngineLine::BestMove(Some("e7e5".into()))
        );
        assert_eq!(classify_line("bestmove (none)"), EngineLine::BestMove(None));
        assert_eq!(classify_line("info string NNUE enabled"), EngineLine::Unrecognized);
        assert_eq!(classify_line("id name Stockfish 16"), EngineLine::Unrecognized);
        assert_eq!(classify_line("uciok"), EngineLine::Unrecognized);
    }

    #[test]
    fn test_last_report_wins() {
        let mut tracker = SearchTracker::new();
        for line in [
            "info depth 1 score cp 90 pv d2d4",
            "info depth 2 score mate 4 pv e2e4 e7e5",
            "info depth 3 score cp 15 pv g1f3",
            "info depth 3 currmove b1c3 currmovenumber 2",
        ] {
            assert!(tracker.observe(classify_line(line)).is_none());
        }
        let outcome = tracker.observe(classify_line("bestmove g1f3")).unwrap();
        assert_eq!(outcome.depth, Some(3));
        assert_eq!(outcome.score, Some(Score::Centipawns(15)));
        assert_eq!(outcome.best_move.as_deref(), Some("g1f3"));
        assert_eq!(outcome.pv, vec!["g1f3".to_string()]);
    }

    #[test]
    fn test_bestmove_without_reports() {
        let mut tracker = SearchTracker::new();
        let outcome = tracker.observe(EngineLine::BestMove(Some("e2e4".into()))).unwrap();
        assert_eq!(outcome.depth, None);
        assert_eq!(outcome.score, None);
    }

    #[test]
    fn test_bestmove_none_ignores_reported_pv() {
        let mut tracker = SearchTracker::new();
        assert!(tracker
            .observe(classify_line("info depth 5 score cp 10 pv e2e4"))
            .is_none());
        let outcome = tracker.observe(classify_line("bestmove (none)")).unwrap();
        assert_eq!(outcome.best_move, None);
        assert_eq!(outcome.depth, Some(5));
        assert_eq!(outcome.pv, vec!["e2e4".to_string()]);
    }

    #[test]
    fn test_mate_sorts_beyond_centipawns() {
        let mate_in_one = Score::Mate(1).to_centipawns();
        assert_eq!(mate_in_one, 9_999);
        assert!(mate_in_one > Score::Centipawns(500).to_centipawns());
        assert!(mate_in_one > Score::Mate(2).to_centipawns());
        assert!(Score::Mate(-1).to_centipawns() < Score::Centipawns(-5_000).to_centipawns());
        assert_eq!(Score::Mate(0).to_centipawns(), -MATE_SCORE);
        assert_eq!(Score::Centipawns(20_000).to_centipawns(), MATE_THRESHOLD);
    }
}
