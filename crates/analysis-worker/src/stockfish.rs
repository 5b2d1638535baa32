//! Engine session over the UCI protocol (async I/O)
//!
//! One session evaluates exactly one position: spawn, handshake, search,
//! quit. The transport is behind [`EngineIo`] so tests can script it.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

use crate::config::{EngineSettings, EngineTimeouts};
use crate::error::EngineFailure;
use crate::uci::{classify_line, EngineLine, SearchOutcome, SearchTracker};

/// Line transport to one engine process.
#[async_trait]
pub trait EngineIo: Send {
    async fn send_line(&mut self, line: &str) -> Result<(), EngineFailure>;

    /// Next output line, or `None` once the engine closed its output.
    async fn read_line(&mut self) -> Result<Option<String>, EngineFailure>;

    /// Wait for the process to exit and return its exit code.
    async fn wait_exit(&mut self) -> Result<Option<i32>, EngineFailure>;

    /// Best-effort immediate termination.
    fn kill(&mut self);
}

/// Produces a fresh engine process per session.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn EngineIo>, EngineFailure>;

    /// Commands sent right after `uci`, e.g. `setoption` lines.
    fn setup_commands(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Stockfish process with piped stdin/stdout
pub struct StockfishProcess {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishProcess {
    pub fn spawn(path: &str) -> Result<Self, EngineFailure> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| EngineFailure::Spawn(format!("{path}: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineFailure::Spawn("stdin not captured".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineFailure::Spawn("stdout not captured".into()))?;

        Ok(Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }
}

#[async_trait]
impl EngineIo for StockfishProcess {
    async fn send_line(&mut self, line: &str) -> Result<(), EngineFailure> {
        self.stdin
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| EngineFailure::Io(format!("Failed to write to engine: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| EngineFailure::Io(format!("Failed to flush stdin: {e}")))
    }

    async fn read_line(&mut self) -> Result<Option<String>, EngineFailure> {
        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| EngineFailure::Io(format!("Failed to read from engine: {e}")))?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    async fn wait_exit(&mut self) -> Result<Option<i32>, EngineFailure> {
        let status = self
            .process
            .wait()
            .await
            .map_err(|e| EngineFailure::Io(format!("Failed to wait for engine: {e}")))?;
        Ok(status.code())
    }

    fn kill(&mut self) {
        let _ = self.process.start_kill();
    }
}

impl Drop for StockfishProcess {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

/// Launches the configured Stockfish binary.
#[derive(Clone, Debug)]
pub struct StockfishLauncher {
    path: String,
    threads: u32,
    hash_mb: u32,
}

impl StockfishLauncher {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            path: settings.stockfish_path.clone(),
            threads: settings.threads,
            hash_mb: settings.hash_mb,
        }
    }
}

#[async_trait]
impl EngineLauncher for StockfishLauncher {
    async fn launch(&self) -> Result<Box<dyn EngineIo>, EngineFailure> {
        Ok(Box::new(StockfishProcess::spawn(&self.path)?))
    }

    fn setup_commands(&self) -> Vec<String> {
        vec![
            format!("setoption name Threads value {}", self.threads),
            format!("setoption name Hash value {}", self.hash_mb),
            "setoption name UCI_AnalyseMode value true".to_string(),
        ]
    }
}

/// Handshake/search/teardown state machine for one position.
pub struct EngineSession {
    io: Box<dyn EngineIo>,
    timeouts: EngineTimeouts,
    terminated: bool,
}

impl EngineSession {
    /// Launch a process and send the identification + setup commands.
    pub async fn start(
        launcher: &dyn EngineLauncher,
        timeouts: EngineTimeouts,
    ) -> Result<Self, EngineFailure> {
        let io = launcher.launch().await?;
        let mut session = Self {
            io,
            timeouts,
            terminated: false,
        };

        session.send("uci").await?;
        for command in launcher.setup_commands() {
            session.send(&command).await?;
        }
        Ok(session)
    }

    /// Probe readiness and wait for `readyok`.
    pub async fn await_ready(&mut self) -> Result<(), EngineFailure> {
        self.send("isready").await?;

        let limit = self.timeouts.ready;
        match tokio::time::timeout(limit, self.read_until_ready()).await {
            Ok(result) => result,
            Err(_) => Err(EngineFailure::ReadyTimeout(limit)),
        }
    }

    /// Submit a position and a fixed-depth search.
    pub async fn search(&mut self, fen: &str, depth: u32) -> Result<(), EngineFailure> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await
    }

    /// Consume output until `bestmove`, then shut the engine down.
    pub async fn await_result(&mut self) -> Result<SearchOutcome, EngineFailure> {
        let limit = self.timeouts.search;
        let outcome = match tokio::time::timeout(limit, self.read_until_bestmove()).await {
            Ok(result) => result?,
            Err(_) => return Err(EngineFailure::SearchTimeout(limit)),
        };

        self.terminate().await?;
        Ok(outcome)
    }

    /// Send `quit` and wait for a clean exit.
    pub async fn terminate(&mut self) -> Result<(), EngineFailure> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;

        // The engine may already be gone; the exit code decides.
        let _ = self.send("quit").await;

        let limit = self.timeouts.exit;
        match tokio::time::timeout(limit, self.io.wait_exit()).await {
            Ok(Ok(Some(0))) => Ok(()),
            Ok(Ok(code)) => Err(EngineFailure::BadExit(code)),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                self.io.kill();
                Err(EngineFailure::ExitTimeout(limit))
            }
        }
    }

    async fn read_until_ready(&mut self) -> Result<(), EngineFailure> {
        loop {
            match self.next_line().await? {
                Some(EngineLine::Ready) => return Ok(()),
                Some(_) => continue,
                None => return Err(self.exited_early().await),
            }
        }
    }

    /// Only the last progress report before `bestmove` is kept.
    async fn read_until_bestmove(&mut self) -> Result<SearchOutcome, EngineFailure> {
        let mut tracker = SearchTracker::new();
        loop {
            match self.next_line().await? {
                Some(line) => {
                    if let Some(outcome) = tracker.observe(line) {
                        return Ok(outcome);
                    }
                }
                None => return Err(self.exited_early().await),
            }
        }
    }

    async fn send(&mut self, cmd: &str) -> Result<(), EngineFailure> {
        debug!(cmd, "SF <");
        self.io.send_line(cmd).await
    }

    async fn next_line(&mut self) -> Result<Option<EngineLine>, EngineFailure> {
        let line = self.io.read_line().await?;
        Ok(line.map(|raw| {
            let trimmed = raw.trim();
            debug!(line = trimmed, "SF >");
            classify_line(trimmed)
        }))
    }

    /// Output closed before the phase completed.
    async fn exited_early(&mut self) -> EngineFailure {
        self.terminated = true;
        let code = tokio::time::timeout(self.timeouts.exit, self.io.wait_exit())
            .await
            .ok()
            .and_then(Result::ok)
            .flatten();
        EngineFailure::Crashed(code)
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        if !self.terminated {
            self.io.kill();
        }
    }
}

/// Run one full session against `fen`. The raw score stays from the
/// side to move's point of view.
pub async fn evaluate_position(
    launcher: &dyn EngineLauncher,
    fen: &str,
    depth: u32,
    timeouts: EngineTimeouts,
) -> Result<SearchOutcome, EngineFailure> {
    let mut session = EngineSession::start(launcher, timeouts).await?;
    session.await_ready().await?;
    session.search(fen, depth).await?;
    session.await_result().await
}
