//! Synchronous whole-game analysis with coaching commentary

use analysis_worker::{CommentarySynthesizer, GameAnalyzer};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub pgn: Option<String>,
}

/// POST /api/analysis
///
/// Engine failures on single plies come back as null fields. Commentary
/// that cannot be produced turns the response into a 502 that still
/// carries the analysis.
pub async fn analyze_game(
    Extension(analyzer): Extension<GameAnalyzer>,
    Extension(commentary): Extension<Option<CommentarySynthesizer>>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<JsonValue>, AppError> {
    let pgn = body
        .pgn
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing PGN".into()))?;

    let analysis = analyzer.analyze_transcript(pgn).await?;

    let (remarks, warning) = match &commentary {
        Some(synthesizer) => match synthesizer.synthesize(&analysis.records).await {
            Ok(c) => (c.remarks, c.mismatch.map(|m| m.to_string())),
            Err(e) => {
                return Err(AppError::CommentaryUnavailable {
                    detail: format!("Coaching text unavailable: {e}"),
                    analysis: Box::new(analysis),
                })
            }
        },
        None => (Vec::new(), Some("Commentary is not configured".to_string())),
    };

    Ok(Json(json!({
        "analysis": analysis.records,
        "commentary": remarks,
        "commentaryWarning": warning,
        "summary": analysis.summary,
        "metadata": analysis.metadata,
    })))
}
