//! Fake collaborators: narration service, engine hook, control channel

use async_trait::async_trait;
use onair_sched::error::{Error, Result};
use onair_sched::narration::NarrationService;
use onair_sched::supervisor::EngineControl;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationMode {
    /// Text and audio both succeed
    Ok,
    /// Text succeeds, speech synthesis fails
    NoAudio,
    /// Every call fails immediately
    Down,
    /// Every call hangs well past any caller timeout
    Hang,
}

/// Narration stub that counts how often it was contacted
pub struct FakeNarration {
    mode: NarrationMode,
    output_dir: PathBuf,
    pub text_calls: AtomicUsize,
    pub tts_calls: AtomicUsize,
}

impl FakeNarration {
    pub fn new(mode: NarrationMode, output_dir: PathBuf) -> Self {
        Self {
            mode,
            output_dir,
            text_calls: AtomicUsize::new(0),
            tts_calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst) + self.tts_calls.load(Ordering::SeqCst)
    }

    async fn misbehave(&self) -> Error {
        if self.mode == NarrationMode::Hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Error::NarrationUnavailable("fake narration is down".to_string())
    }
}

#[async_trait]
impl NarrationService for FakeNarration {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            NarrationMode::Ok | NarrationMode::NoAudio => Ok(format!("Generated intro ({} chars prompt)", prompt.len())),
            _ => Err(self.misbehave().await),
        }
    }

    async fn synthesize(&self, content_item_id: Uuid, _text: &str) -> Result<PathBuf> {
        self.tts_calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            NarrationMode::Ok => {
                tokio::fs::create_dir_all(&self.output_dir).await?;
                let path = self.output_dir.join(format!("intro_{}.mp3", content_item_id));
                tokio::fs::write(&path, b"ID3").await?;
                Ok(path)
            }
            NarrationMode::NoAudio => Err(Error::NarrationUnavailable("tts failed".to_string())),
            _ => Err(self.misbehave().await),
        }
    }

    async fn health(&self) -> Result<()> {
        match self.mode {
            NarrationMode::Ok | NarrationMode::NoAudio => Ok(()),
            _ => Err(Error::NarrationUnavailable("fake narration is down".to_string())),
        }
    }
}

/// Engine hook that records reload requests
#[derive(Default)]
pub struct RecordingEngine {
    pub reloads: AtomicUsize,
    pub fail: AtomicBool,
}

#[async_trait]
impl EngineControl for RecordingEngine {
    async fn reload_playlist(&self) -> Result<String> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::ControlChannel("connection refused".to_string()));
        }
        Ok("OK".to_string())
    }
}

/// Address nothing is listening on
pub fn closed_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

/// Control-channel stub answering every command line with `reply`
///
/// Returns its address and the command lines it received.
pub async fn spawn_control_stub(reply: &'static str) -> (String, Arc<Mutex<Vec<String>>>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();

    let handle = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let log = log.clone();
            tokio::spawn(async move {
                let (read, mut write) = stream.into_split();
                let mut reader = BufReader::new(read);
                let mut line = String::new();
                if reader.read_line(&mut line).await.is_ok() {
                    log.lock().unwrap().push(line.trim_end().to_string());
                    let _ = write.write_all(format!("{}\n", reply).as_bytes()).await;
                }
            });
        }
    });

    (addr, received, handle)
}
