//! Integration tests: commentary synthesis over analyzed games.

mod common;

use std::sync::Arc;
use std::time::Duration;

use analysis_worker::testing::{Script, ScriptedLauncher, SilentGenerator, StubGenerator};
use analysis_worker::{CommentaryError, CommentarySynthesizer, PlyRecord};
use common::{analyzer, OPEN_GAME};

fn sample_records() -> Vec<PlyRecord> {
    ["e4", "e5", "Nf3", "Nc6", "Bb5"]
        .iter()
        .enumerate()
        .map(|(i, san)| PlyRecord {
            move_number: i as u32 + 1,
            played_move: san.to_string(),
            eval: Some(20),
            best_move: None,
            depth: Some(12),
        })
        .collect()
}

#[tokio::test]
async fn test_generator_receives_records_as_json() {
    let analysis = analyzer(ScriptedLauncher::always(Script::reply(10, 20, "e7e5")), 1)
        .analyze_transcript(OPEN_GAME)
        .await
        .unwrap();

    let generator = Arc::new(StubGenerator::replying(
        r#"[{"moveNumber":1,"comment":"a"},{"moveNumber":2,"comment":"b"},{"moveNumber":3,"comment":"c"},{"moveNumber":4,"comment":"d"}]"#,
    ));
    let synthesizer = CommentarySynthesizer::new(generator.clone(), Duration::from_secs(1));
    let commentary = synthesizer.synthesize(&analysis.records).await.unwrap();

    assert_eq!(commentary.remarks.len(), 4);
    assert_eq!(commentary.mismatch, None);

    let inputs = generator.inputs();
    assert_eq!(inputs.len(), 1);
    let sent: Vec<PlyRecord> = serde_json::from_str(&inputs[0]).unwrap();
    assert_eq!(sent, analysis.records);
}

#[tokio::test]
async fn test_short_reply_is_kept_with_mismatch() {
    let reply = "Here you go:\n```json\n[\n  {\"moveNumber\": 1, \"comment\": \"Central.\"},\n  {\"moveNumber\": 3, \"comment\": \"Develops.\"},\n  {\"moveNumber\": 5, \"comment\": \"Pins.\"}\n]\n```";
    let synthesizer =
        CommentarySynthesizer::new(Arc::new(StubGenerator::replying(reply)), Duration::from_secs(1));

    let commentary = synthesizer.synthesize(&sample_records()).await.unwrap();

    assert_eq!(commentary.remarks.len(), 3);
    let mismatch = commentary.mismatch.unwrap();
    assert_eq!((mismatch.expected, mismatch.received), (5, 3));
    assert_eq!(mismatch.to_string(), "Expected 5 comments, but got 3");
    assert_eq!(commentary.for_move(3).unwrap().comment, "Develops.");
    assert!(commentary.for_move(2).is_none());
}

#[tokio::test]
async fn test_prose_reply_is_a_format_error() {
    let synthesizer = CommentarySynthesizer::new(
        Arc::new(StubGenerator::replying("I cannot analyze this game.")),
        Duration::from_secs(1),
    );
    let err = synthesizer.synthesize(&sample_records()).await.unwrap_err();
    assert!(matches!(err, CommentaryError::Format));
}

#[tokio::test]
async fn test_broken_json_is_a_parse_error() {
    let synthesizer = CommentarySynthesizer::new(
        Arc::new(StubGenerator::replying(r#"[{"moveNumber": 1, "comment": }]"#)),
        Duration::from_secs(1),
    );
    let err = synthesizer.synthesize(&sample_records()).await.unwrap_err();
    assert!(matches!(err, CommentaryError::Parse(_)));
}

#[tokio::test]
async fn test_generator_failure_propagates() {
    let synthesizer = CommentarySynthesizer::new(
        Arc::new(StubGenerator::failing("quota exceeded")),
        Duration::from_secs(1),
    );
    let err = synthesizer.synthesize(&sample_records()).await.unwrap_err();
    assert!(matches!(err, CommentaryError::Generation(msg) if msg == "quota exceeded"));
}

#[tokio::test]
async fn test_silent_generator_times_out() {
    let limit = Duration::from_millis(100);
    let synthesizer = CommentarySynthesizer::new(Arc::new(SilentGenerator), limit);
    let err = synthesizer.synthesize(&sample_records()).await.unwrap_err();
    assert!(matches!(err, CommentaryError::Timeout(d) if d == limit));
}
