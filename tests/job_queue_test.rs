//! Integration tests: the in-process job queue used when SQS is absent.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use analysis_worker::error::EngineFailure;
use analysis_worker::jobs::{MemoryJobStore, ABANDONED_DETAIL};
use analysis_worker::stockfish::{EngineIo, EngineLauncher};
use analysis_worker::testing::{Script, ScriptedEngine};
use analysis_worker::{JobRunner, JobStatus, JobStore, NewJob};
use async_trait::async_trait;
use coach_server::clients::local::LocalQueue;
use common::{analyzer, client, spawn_app_with_workers, TestApp, OPEN_GAME};
use serde_json::{json, Value};

/// Counts engine processes alive at once and remembers the peak.
#[derive(Default)]
struct Gauge {
    live: AtomicUsize,
    peak: AtomicUsize,
}

struct TrackedEngine {
    inner: ScriptedEngine,
    gauge: Arc<Gauge>,
}

impl Drop for TrackedEngine {
    fn drop(&mut self) {
        self.gauge.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl EngineIo for TrackedEngine {
    async fn send_line(&mut self, line: &str) -> Result<(), EngineFailure> {
        self.inner.send_line(line).await
    }

    async fn read_line(&mut self) -> Result<Option<String>, EngineFailure> {
        // Slow enough that sessions from different jobs would overlap
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.inner.read_line().await
    }

    async fn wait_exit(&mut self) -> Result<Option<i32>, EngineFailure> {
        self.inner.wait_exit().await
    }

    fn kill(&mut self) {
        self.inner.kill()
    }
}

struct TrackingLauncher {
    gauge: Arc<Gauge>,
}

#[async_trait]
impl EngineLauncher for TrackingLauncher {
    async fn launch(&self) -> Result<Box<dyn EngineIo>, EngineFailure> {
        let live = self.gauge.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(TrackedEngine {
            inner: ScriptedEngine::new(Script::reply(10, 20, "e7e5")),
            gauge: self.gauge.clone(),
        }))
    }
}

async fn submit(app: &TestApp, n: usize) -> i64 {
    let res = client()
        .post(app.url("/api/analysis/jobs"))
        .json(&json!({ "pgn": OPEN_GAME, "ownerId": "user-1", "gameId": format!("game-{n}") }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    body["jobId"].as_i64().unwrap()
}

async fn wait_for_done(app: &TestApp, job_ids: &[i64]) {
    for _ in 0..500 {
        let mut finished = 0;
        for &id in job_ids {
            let job = app.store.get(id).await.unwrap().unwrap();
            if job.status.is_terminal() {
                assert_eq!(job.status, JobStatus::Done, "job {id}: {:?}", job.error);
                finished += 1;
            }
        }
        if finished == job_ids.len() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("jobs never finished");
}

async fn peak_engines_for(workers: usize, jobs: usize) -> usize {
    let gauge = Arc::new(Gauge::default());
    let launcher = TrackingLauncher {
        gauge: gauge.clone(),
    };
    let app = spawn_app_with_workers(analyzer(launcher, 1), None, workers).await;

    let mut ids = Vec::new();
    for n in 0..jobs {
        ids.push(submit(&app, n).await);
    }
    wait_for_done(&app, &ids).await;

    assert_eq!(gauge.live.load(Ordering::SeqCst), 0);
    gauge.peak.load(Ordering::SeqCst)
}

#[tokio::test]
async fn test_single_worker_runs_one_job_at_a_time() {
    assert_eq!(peak_engines_for(1, 5).await, 1);
}

#[tokio::test]
async fn test_worker_limit_caps_concurrent_engines() {
    let peak = peak_engines_for(2, 6).await;
    assert!(peak <= 2, "peak {peak}");
}

#[tokio::test]
async fn test_start_sweeps_abandoned_claims() {
    let store = Arc::new(MemoryJobStore::new());
    let new_job = NewJob {
        owner_id: "user-1".into(),
        game_id: "game-1".into(),
        pgn: OPEN_GAME.into(),
    };
    let abandoned = store.create(new_job.clone()).await.unwrap();
    let recent = store.create(new_job).await.unwrap();
    store.claim(abandoned.id).await.unwrap();
    store.claim(recent.id).await.unwrap();
    store
        .backdate(abandoned.id, chrono::Duration::hours(2))
        .await;

    let runner = JobRunner::new(
        store.clone() as Arc<dyn JobStore>,
        analyzer(TrackingLauncher { gauge: Arc::default() }, 1),
    );
    LocalQueue::start(runner, 1, Duration::from_secs(3600))
        .await
        .unwrap();

    let abandoned = store.get(abandoned.id).await.unwrap().unwrap();
    assert_eq!(abandoned.status, JobStatus::Error);
    assert_eq!(abandoned.error.as_deref(), Some(ABANDONED_DETAIL));
    let recent = store.get(recent.id).await.unwrap().unwrap();
    assert_eq!(recent.status, JobStatus::InProgress);
}
