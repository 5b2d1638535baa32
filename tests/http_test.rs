//! Integration tests: HTTP endpoints against an in-process server.
//!
//! Engines and the text generator are scripted; jobs go through the
//! in-process queue onto a memory store.

mod common;

use std::sync::Arc;
use std::time::Duration;

use analysis_worker::testing::{Script, ScriptedLauncher, StubGenerator};
use analysis_worker::TextGenerator;
use common::{analyzer, client, spawn_app, TestApp, OPEN_GAME};
use serde_json::{json, Value};

const FOUR_REMARKS: &str = r#"[
  {"moveNumber": 1, "comment": "Claims the center."},
  {"moveNumber": 2, "comment": "Mirrors White."},
  {"moveNumber": 3, "comment": "Attacks e5."},
  {"moveNumber": 4, "comment": "Defends e5."}
]"#;

async fn app_with(generator: Option<Arc<dyn TextGenerator>>) -> TestApp {
    spawn_app(
        analyzer(ScriptedLauncher::always(Script::reply(10, 20, "e7e5")), 1),
        generator,
    )
    .await
}

async fn analyze(app: &TestApp, body: Value) -> (u16, Value) {
    let res = client()
        .post(app.url("/api/analysis"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = res.status().as_u16();
    (status, res.json().await.unwrap())
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health() {
    let app = app_with(None).await;
    let res = client().get(app.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

// ---------------------------------------------------------------------------
// Synchronous analysis
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_analysis_with_commentary() {
    let app = app_with(Some(Arc::new(StubGenerator::replying(FOUR_REMARKS)))).await;
    let (status, body) = analyze(&app, json!({ "pgn": OPEN_GAME })).await;

    assert_eq!(status, 200);
    let records = body["analysis"].as_array().unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0]["moveNumber"], 1);
    assert_eq!(records[0]["playedMove"], "e4");
    assert_eq!(records[0]["eval"], 20);
    assert_eq!(records[0]["bestMove"], Value::Null);
    assert_eq!(records[1]["eval"], -20);
    assert_eq!(records[1]["bestMove"], "e5");
    assert_eq!(records[1]["depth"], 10);

    let commentary = body["commentary"].as_array().unwrap();
    assert_eq!(commentary.len(), 4);
    assert_eq!(commentary[2]["comment"], "Attacks e5.");
    assert_eq!(body["commentaryWarning"], Value::Null);
    assert_eq!(body["summary"]["white"]["movesJudged"], 2);
}

#[tokio::test]
async fn test_short_commentary_is_flagged() {
    let reply = r#"[{"moveNumber": 1, "comment": "Fine."}, {"moveNumber": 4, "comment": "Solid."}]"#;
    let app = app_with(Some(Arc::new(StubGenerator::replying(reply)))).await;
    let (status, body) = analyze(&app, json!({ "pgn": OPEN_GAME })).await;

    assert_eq!(status, 200);
    assert_eq!(body["commentary"].as_array().unwrap().len(), 2);
    assert_eq!(body["commentaryWarning"], "Expected 4 comments, but got 2");
}

#[tokio::test]
async fn test_analysis_without_generator() {
    let app = app_with(None).await;
    let (status, body) = analyze(&app, json!({ "pgn": OPEN_GAME })).await;

    assert_eq!(status, 200);
    assert_eq!(body["analysis"].as_array().unwrap().len(), 4);
    assert_eq!(body["commentary"], json!([]));
    assert_eq!(body["commentaryWarning"], "Commentary is not configured");
}

#[tokio::test]
async fn test_generator_failure_still_returns_analysis() {
    let app = app_with(Some(Arc::new(StubGenerator::failing("quota exceeded")))).await;
    let (status, body) = analyze(&app, json!({ "pgn": OPEN_GAME })).await;

    assert_eq!(status, 502);
    assert!(body["detail"].as_str().unwrap().contains("quota exceeded"));
    assert_eq!(body["analysis"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_unparseable_reply_is_bad_gateway() {
    let app = app_with(Some(Arc::new(StubGenerator::replying("No moves to discuss.")))).await;
    let (status, body) = analyze(&app, json!({ "pgn": OPEN_GAME })).await;

    assert_eq!(status, 502);
    assert_eq!(body["analysis"][0]["eval"], 20);
}

#[tokio::test]
async fn test_missing_pgn() {
    let app = app_with(None).await;

    for body in [json!({}), json!({ "pgn": "" }), json!({ "pgn": "   " })] {
        let (status, body) = analyze(&app, body).await;
        assert_eq!(status, 400);
        assert_eq!(body["detail"], "Missing PGN");
    }
}

#[tokio::test]
async fn test_illegal_transcript() {
    let app = app_with(None).await;
    let (status, body) = analyze(&app, json!({ "pgn": "1. e4 e5 2. Ke3" })).await;

    assert_eq!(status, 400);
    assert!(body["detail"].as_str().unwrap().contains("Ke3"));
}

// ---------------------------------------------------------------------------
// Background jobs
// ---------------------------------------------------------------------------

async fn wait_for_terminal(app: &TestApp, job_id: i64) -> Value {
    for _ in 0..100 {
        let job: Value = client()
            .get(app.url(&format!("/api/analysis/jobs/{job_id}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if job["status"] == "done" || job["status"] == "error" {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {job_id} never finished");
}

#[tokio::test]
async fn test_job_submission_and_polling() {
    let app = app_with(None).await;
    let res = client()
        .post(app.url("/api/analysis/jobs"))
        .json(&json!({ "pgn": OPEN_GAME, "ownerId": "user-1", "gameId": "game-9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "pending");
    let job_id = body["jobId"].as_i64().unwrap();

    let job = wait_for_terminal(&app, job_id).await;
    assert_eq!(job["status"], "done");
    assert_eq!(job["ownerId"], "user-1");
    assert_eq!(job["gameId"], "game-9");
    assert_eq!(job["result"].as_array().unwrap().len(), 4);
    assert_eq!(job["result"][3]["eval"], -20);
    assert_eq!(job["error"], Value::Null);
}

#[tokio::test]
async fn test_job_with_illegal_transcript_is_rejected() {
    let app = app_with(None).await;
    let res = client()
        .post(app.url("/api/analysis/jobs"))
        .json(&json!({ "pgn": "1. e4 e5 2. Ke3", "ownerId": "user-1", "gameId": "game-9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);

    // Nothing was stored
    let res = client().get(app.url("/api/analysis/jobs/1")).send().await.unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_job_requires_owner() {
    let app = app_with(None).await;
    let res = client()
        .post(app.url("/api/analysis/jobs"))
        .json(&json!({ "pgn": OPEN_GAME, "ownerId": " ", "gameId": "game-9" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "Missing ownerId");
}

#[tokio::test]
async fn test_unknown_job() {
    let app = app_with(None).await;
    let res = client()
        .get(app.url("/api/analysis/jobs/12345"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "Job not found");
}
