//! Coaching commentary from an external text generator.
//!
//! The generator is asked for a bare JSON array but nothing guarantees it
//! complies, so the reply goes through [`extract_commentary`] before use.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CommentaryError;
use crate::records::{CommentaryRecord, PlyRecord};

/// Instruction sent with every request.
pub const COACH_INSTRUCTION: &str = "\
You are a chess coach. Given a JSON array of moves with fields:
  moveNumber, playedMove, eval, bestMove, depth
Return **only** a JSON array of objects:
  { \"moveNumber\": <n>, \"comment\": \"<one-sentence coaching tip>\" }
Do **not** include any explanatory text or markdown, just the raw JSON.
Give a comment for every move you can.";

/// One request in, raw reply text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, instruction: &str, input: &str) -> Result<String, CommentaryError>;
}

/// Remark count differs from the number of plies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthMismatch {
    pub expected: usize,
    pub received: usize,
}

impl fmt::Display for LengthMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Expected {} comments, but got {}",
            self.expected, self.received
        )
    }
}

/// Parsed remarks plus an optional length warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commentary {
    pub remarks: Vec<CommentaryRecord>,
    pub mismatch: Option<LengthMismatch>,
}

impl Commentary {
    /// Remark for a given ply, if the generator produced one.
    pub fn for_move(&self, move_number: u32) -> Option<&CommentaryRecord> {
        self.remarks.iter().find(|r| r.move_number == move_number)
    }
}

/// Pull the remark array out of a free-text reply.
///
/// Strips one fenced block, then parses everything between the first `[`
/// and the last `]`. A count different from `expected` is reported, not
/// rejected.
pub fn extract_commentary(raw: &str, expected: usize) -> Result<Commentary, CommentaryError> {
    let fence_re = Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)```").unwrap();
    let trimmed = raw.trim();
    let text = match fence_re.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => trimmed,
    };

    let (start, end) = match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => return Err(CommentaryError::Format),
    };

    let remarks: Vec<CommentaryRecord> = serde_json::from_str(&text[start..=end])?;

    let mismatch = (remarks.len() != expected).then(|| LengthMismatch {
        expected,
        received: remarks.len(),
    });
    if let Some(m) = &mismatch {
        warn!(expected = m.expected, received = m.received, "Commentary length mismatch");
    }

    Ok(Commentary { remarks, mismatch })
}

/// Sends a game's records to the generator and parses the reply.
#[derive(Clone)]
pub struct CommentarySynthesizer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl CommentarySynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub async fn synthesize(&self, records: &[PlyRecord]) -> Result<Commentary, CommentaryError> {
        let input = serde_json::to_string_pretty(records)?;

        let raw = tokio::time::timeout(self.timeout, self.generator.generate(COACH_INSTRUCTION, &input))
            .await
            .map_err(|_| CommentaryError::Timeout(self.timeout))??;
        debug!(len = raw.len(), "Generator reply received");

        let commentary = extract_commentary(&raw, records.len())?;
        info!(remarks = commentary.remarks.len(), "Commentary parsed");
        Ok(commentary)
    }
}
