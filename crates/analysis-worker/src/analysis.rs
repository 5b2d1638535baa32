/// Move classification and game summary: pure functions only
/// (No Engine/Replay dependencies)
use game_replay::Side;
use serde::{Deserialize, Serialize};

use crate::records::PlyRecord;
use crate::uci::MATE_THRESHOLD;

/// Upper bound of each band, in centipawns lost
const BEST_MAX: i32 = 0;
const EXCELLENT_BELOW: i32 = 10;
const GOOD_BELOW: i32 = 50;
const INACCURACY_BELOW: i32 = 100;
const MISTAKE_BELOW: i32 = 200;

/// Per-move losses are capped here
const MAX_CP_LOSS: i32 = 500;

/// Quality band of a played move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Best,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl Classification {
    /// Band for a cp loss. Throwing away a mate is always a blunder.
    pub fn from_loss(cp_loss: i32, lost_mate: bool) -> Self {
        match cp_loss {
            _ if lost_mate => Self::Blunder,
            l if l <= BEST_MAX => Self::Best,
            l if l < EXCELLENT_BELOW => Self::Excellent,
            l if l < GOOD_BELOW => Self::Good,
            l if l < INACCURACY_BELOW => Self::Inaccuracy,
            l if l < MISTAKE_BELOW => Self::Mistake,
            _ => Self::Blunder,
        }
    }
}

/// How one ply was judged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveVerdict {
    pub move_number: u32,
    pub side: Side,
    pub cp_loss: i32,
    pub classification: Classification,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifications {
    pub best: u32,
    pub excellent: u32,
    pub good: u32,
    pub inaccuracy: u32,
    pub mistake: u32,
    pub blunder: u32,
}

impl Classifications {
    fn count(&mut self, classification: Classification) {
        let slot = match classification {
            Classification::Best => &mut self.best,
            Classification::Excellent => &mut self.excellent,
            Classification::Good => &mut self.good,
            Classification::Inaccuracy => &mut self.inaccuracy,
            Classification::Mistake => &mut self.mistake,
            Classification::Blunder => &mut self.blunder,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SideSummary {
    pub accuracy: f64,
    pub avg_cp_loss: f64,
    pub moves_judged: u32,
    pub classifications: Classifications,
}

impl Default for SideSummary {
    fn default() -> Self {
        Self {
            accuracy: 100.0,
            avg_cp_loss: 0.0,
            moves_judged: 0,
            classifications: Classifications::default(),
        }
    }
}

impl SideSummary {
    fn finish(&mut self, total_loss: i32) {
        self.accuracy = round1(accuracy(total_loss, self.moves_judged));
        if self.moves_judged > 0 {
            self.avg_cp_loss = round1(f64::from(total_loss) / f64::from(self.moves_judged));
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub white: SideSummary,
    pub black: SideSummary,
    pub verdicts: Vec<MoveVerdict>,
}

impl GameSummary {
    fn side_mut(&mut self, side: Side) -> &mut SideSummary {
        match side {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        }
    }
}

fn is_mate_score(eval: i32) -> bool {
    eval.abs() > MATE_THRESHOLD
}

/// Scores around one ply, both from White's point of view, seen from
/// the side that played it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlyScores {
    before: i32,
    after: i32,
}

impl PlyScores {
    pub fn new(before: i32, after: i32, mover: Side) -> Self {
        let sign = mover.score_sign();
        Self {
            before: before * sign,
            after: after * sign,
        }
    }

    /// The mover had a forced mate and played out of it, or had none and
    /// walked into one.
    pub fn lost_mate(self) -> bool {
        match (is_mate_score(self.before), is_mate_score(self.after)) {
            (true, false) => self.before > 0,
            (false, true) => self.after < 0,
            _ => false,
        }
    }

    /// Centipawns given up by the move, in `0..=MAX_CP_LOSS`.
    pub fn cp_loss(self) -> i32 {
        if is_mate_score(self.before) && is_mate_score(self.after) {
            // Between two mate scores only a change of owner matters
            return if (self.before > 0) == (self.after > 0) {
                0
            } else {
                MAX_CP_LOSS
            };
        }
        (self.before - self.after).clamp(0, MAX_CP_LOSS)
    }

    pub fn classify(self) -> Classification {
        Classification::from_loss(self.cp_loss(), self.lost_mate())
    }
}

/// Accuracy percentage from the average cp loss over `judged` moves.
pub fn accuracy(total_cp_loss: i32, judged: u32) -> f64 {
    if judged == 0 {
        return 100.0;
    }
    let acpl = f64::from(total_cp_loss) / f64::from(judged);
    (100.0 * (1.0 / (1.0 + acpl / 100.0)).sqrt()).clamp(0.0, 100.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Judge every ply whose surrounding scores are both known.
///
/// `records[i].eval` is the score before ply `i + 1`, so the loss of a ply
/// is measured against the next record. The last ply has no following
/// record and is judged only when it delivers checkmate.
pub fn summarize(records: &[PlyRecord], first_mover: Side, ends_in_checkmate: bool) -> GameSummary {
    let mut summary = GameSummary::default();
    let mut white_loss = 0;
    let mut black_loss = 0;
    let mut side = first_mover;

    for (idx, record) in records.iter().enumerate() {
        let mover = side;
        side = side.opponent();

        let is_last = idx + 1 == records.len();
        let (cp_loss, classification) = if is_last && ends_in_checkmate {
            (0, Classification::Best)
        } else {
            match (record.eval, records.get(idx + 1).and_then(|r| r.eval)) {
                (Some(before), Some(after)) => {
                    let scores = PlyScores::new(before, after, mover);
                    (scores.cp_loss(), scores.classify())
                }
                _ => continue,
            }
        };

        let side_summary = summary.side_mut(mover);
        side_summary.moves_judged += 1;
        side_summary.classifications.count(classification);
        match mover {
            Side::White => white_loss += cp_loss,
            Side::Black => black_loss += cp_loss,
        }

        summary.verdicts.push(MoveVerdict {
            move_number: record.move_number,
            side: mover,
            cp_loss,
            classification,
        });
    }

    summary.white.finish(white_loss);
    summary.black.finish(black_loss);
    summary
}
