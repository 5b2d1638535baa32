//! Scripted engine and text generator for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::commentary::TextGenerator;
use crate::error::{CommentaryError, EngineFailure};
use crate::stockfish::{EngineIo, EngineLauncher};

type PositionReply = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// How one scripted engine process behaves.
#[derive(Clone)]
pub enum Script {
    /// Answer the handshake, print these lines after `go`, exit 0 on `quit`.
    Respond(Vec<String>),
    /// Like `Respond`, with the lines computed from the submitted FEN.
    ByPosition(PositionReply),
    /// Exit with this code as soon as the search starts.
    CrashOnSearch(i32),
    /// Never answer `isready`.
    NeverReady,
    /// Accept the search but never finish it.
    Stall,
    /// Finish the search but ignore `quit`.
    IgnoreQuit(Vec<String>),
}

impl Script {
    /// One progress line and a best move.
    pub fn reply(depth: u32, cp: i32, best: &str) -> Self {
        Script::Respond(vec![
            format!("info depth {depth} score cp {cp} nodes 1000 pv {best}"),
            format!("bestmove {best}"),
        ])
    }

    pub fn mate(depth: u32, moves: i32, best: &str) -> Self {
        Script::Respond(vec![
            format!("info depth {depth} score mate {moves} pv {best}"),
            format!("bestmove {best}"),
        ])
    }

    pub fn by_position(reply: impl Fn(&str) -> Vec<String> + Send + Sync + 'static) -> Self {
        Script::ByPosition(Arc::new(reply))
    }
}

/// In-memory engine process driven by a [`Script`].
pub struct ScriptedEngine {
    script: Script,
    log: Arc<Mutex<Vec<String>>>,
    output: VecDeque<String>,
    fen: Option<String>,
    exit_code: Option<i32>,
}

impl ScriptedEngine {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            log: Arc::default(),
            output: VecDeque::new(),
            fen: None,
            exit_code: None,
        }
    }

    fn start_search(&mut self) {
        match &self.script {
            Script::Respond(lines) | Script::IgnoreQuit(lines) => {
                self.output.extend(lines.iter().cloned())
            }
            Script::ByPosition(reply) => {
                let lines = reply(self.fen.as_deref().unwrap_or_default());
                self.output.extend(lines);
            }
            Script::CrashOnSearch(code) => self.exit_code = Some(*code),
            Script::NeverReady | Script::Stall => {}
        }
    }
}

#[async_trait]
impl EngineIo for ScriptedEngine {
    async fn send_line(&mut self, line: &str) -> Result<(), EngineFailure> {
        if self.exit_code.is_some() {
            return Err(EngineFailure::Io("Broken pipe".into()));
        }
        if let Ok(mut log) = self.log.lock() {
            log.push(line.to_string());
        }

        match line {
            "uci" => self
                .output
                .extend(["id name Scripted".to_string(), "uciok".to_string()]),
            "isready" => {
                if !matches!(self.script, Script::NeverReady) {
                    self.output.push_back("readyok".into());
                }
            }
            "quit" => {
                if !matches!(self.script, Script::IgnoreQuit(_)) {
                    self.exit_code = Some(0);
                }
            }
            _ if line.starts_with("position fen ") => {
                self.fen = Some(line["position fen ".len()..].to_string());
            }
            _ if line.starts_with("go") => self.start_search(),
            _ => {}
        }
        Ok(())
    }

    async fn read_line(&mut self) -> Result<Option<String>, EngineFailure> {
        if let Some(line) = self.output.pop_front() {
            return Ok(Some(format!("{line}\n")));
        }
        if self.exit_code.is_some() {
            return Ok(None);
        }
        std::future::pending().await
    }

    async fn wait_exit(&mut self) -> Result<Option<i32>, EngineFailure> {
        match self.exit_code {
            Some(code) => Ok(Some(code)),
            None => std::future::pending().await,
        }
    }

    fn kill(&mut self) {
        if self.exit_code.is_none() {
            self.exit_code = Some(-9);
        }
    }
}

/// Hands out one [`ScriptedEngine`] per session; `script_for(n)` decides
/// the behavior of the n-th launch (0-based).
pub struct ScriptedLauncher {
    script_for: Box<dyn Fn(usize) -> Script + Send + Sync>,
    launches: AtomicUsize,
    logs: Mutex<Vec<Arc<Mutex<Vec<String>>>>>,
}

impl ScriptedLauncher {
    pub fn new(script_for: impl Fn(usize) -> Script + Send + Sync + 'static) -> Self {
        Self {
            script_for: Box::new(script_for),
            launches: AtomicUsize::new(0),
            logs: Mutex::new(Vec::new()),
        }
    }

    /// Every launch behaves the same.
    pub fn always(script: Script) -> Self {
        Self::new(move |_| script.clone())
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Commands received by each launched engine, in launch order.
    pub fn commands(&self) -> Vec<Vec<String>> {
        let logs = match self.logs.lock() {
            Ok(logs) => logs.clone(),
            Err(_) => return Vec::new(),
        };
        logs.iter()
            .map(|log| log.lock().map(|l| l.clone()).unwrap_or_default())
            .collect()
    }
}

#[async_trait]
impl EngineLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn EngineIo>, EngineFailure> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst);
        let engine = ScriptedEngine::new((self.script_for)(n));
        if let Ok(mut logs) = self.logs.lock() {
            logs.push(engine.log.clone());
        }
        Ok(Box::new(engine))
    }

    fn setup_commands(&self) -> Vec<String> {
        vec!["setoption name Threads value 1".to_string()]
    }
}

/// Launcher whose engine binary cannot be started.
pub struct MissingEngine;

#[async_trait]
impl EngineLauncher for MissingEngine {
    async fn launch(&self) -> Result<Box<dyn EngineIo>, EngineFailure> {
        Err(EngineFailure::Spawn("no such file".into()))
    }
}

/// Canned text generator that records what it was asked.
pub struct StubGenerator {
    reply: Result<String, String>,
    inputs: Mutex<Vec<String>>,
}

impl StubGenerator {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().map(|i| i.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, _instruction: &str, input: &str) -> Result<String, CommentaryError> {
        if let Ok(mut inputs) = self.inputs.lock() {
            inputs.push(input.to_string());
        }
        self.reply.clone().map_err(CommentaryError::Generation)
    }
}

/// Generator that never answers.
pub struct SilentGenerator;

#[async_trait]
impl TextGenerator for SilentGenerator {
    async fn generate(&self, _instruction: &str, _input: &str) -> Result<String, CommentaryError> {
        std::future::pending().await
    }
}
