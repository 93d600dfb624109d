use crate::streaming::{ChunkStream, PlaybackChunk, PlaybackChunkStream, Utf8StreamDecoder};
use crate::{ApiError, GenerateProvider, GenerateRequest};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

/// Recording session that contains the original request and all chunks
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecordingSession {
    /// The request that was sent
    pub request: serde_json::Value,
    /// Timestamp of when the recording was started
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Body chunks as received from the server
    pub chunks: Vec<RecordedChunk>,
}

/// Single recorded chunk with timing info
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecordedChunk {
    /// Body text of this chunk
    pub data: String,
    /// Milliseconds since recording start
    pub timestamp_ms: u64,
}

/// Appends finished sessions to a JSON array file
pub struct ApiRecorder {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ApiRecorder {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn save_session(&self, session: RecordingSession) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut sessions: Vec<RecordingSession> = if self.path.exists() {
            let contents = std::fs::read_to_string(&self.path)
                .context("Failed to read recording file")?;
            serde_json::from_str(&contents).context("Failed to parse recording file")?
        } else {
            Vec::new()
        };
        sessions.push(session);

        let json = serde_json::to_string_pretty(&sessions)?;
        std::fs::write(&self.path, json).context("Failed to write recording file")?;
        debug!(
            "Saved recording session {} to {}",
            sessions.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Passes chunks through unchanged while recording them
///
/// Chunks are stored as text. A character split across two chunks is
/// recorded with the later one, so the recorded text concatenates to the
/// same body.
pub struct RecordingChunkStream {
    inner: Box<dyn ChunkStream>,
    decoder: Utf8StreamDecoder,
    session: Option<RecordingSession>,
    start_time: Instant,
    recorder: Arc<ApiRecorder>,
}

impl RecordingChunkStream {
    pub fn new(
        inner: Box<dyn ChunkStream>,
        request: serde_json::Value,
        recorder: Arc<ApiRecorder>,
    ) -> Self {
        Self {
            inner,
            decoder: Utf8StreamDecoder::new(),
            session: Some(RecordingSession {
                request,
                timestamp: chrono::Utc::now(),
                chunks: Vec::new(),
            }),
            start_time: Instant::now(),
            recorder,
        }
    }

    fn record(&mut self, data: String) {
        if data.is_empty() {
            return;
        }
        let timestamp_ms = self.start_time.elapsed().as_millis() as u64;
        if let Some(session) = self.session.as_mut() {
            session.chunks.push(RecordedChunk { data, timestamp_ms });
        }
    }
}

#[async_trait]
impl ChunkStream for RecordingChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.inner.next_chunk().await? {
            Some(chunk) => {
                let text = self.decoder.decode(&chunk, false);
                self.record(text);
                Ok(Some(chunk))
            }
            None => {
                let tail = self.decoder.decode(&[], true);
                self.record(tail);
                if let Some(session) = self.session.take() {
                    if let Err(e) = self.recorder.save_session(session) {
                        warn!("Failed to save recording: {e:#}");
                    }
                }
                Ok(None)
            }
        }
    }
}

/// Records every stream opened through the wrapped provider
pub struct RecordingProvider {
    inner: Arc<dyn GenerateProvider>,
    recorder: Arc<ApiRecorder>,
}

impl RecordingProvider {
    pub fn new(inner: Arc<dyn GenerateProvider>, recorder: ApiRecorder) -> Self {
        Self {
            inner,
            recorder: Arc::new(recorder),
        }
    }
}

#[async_trait]
impl GenerateProvider for RecordingProvider {
    async fn open_generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<Box<dyn ChunkStream>, ApiError> {
        let stream = self.inner.open_generate(request).await?;
        let request = serde_json::to_value(request)
            .map_err(|e| ApiError::Unknown(format!("Failed to serialize request: {e}")))?;
        Ok(Box::new(RecordingChunkStream::new(
            stream,
            request,
            self.recorder.clone(),
        )))
    }
}

/// Recorded sessions, handed out one per request in order
#[derive(Clone)]
pub struct PlaybackState {
    sessions: Arc<Vec<RecordingSession>>,
    index: Arc<Mutex<usize>>,
    pub fast: bool,
}

impl PlaybackState {
    pub fn from_file<P: AsRef<Path>>(path: P, fast: bool) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).context("Failed to read recording file")?;
        let sessions: Vec<RecordingSession> =
            serde_json::from_str(&contents).context("Failed to parse recording file")?;
        Ok(Self::from_sessions(sessions, fast))
    }

    pub fn from_sessions(sessions: Vec<RecordingSession>, fast: bool) -> Self {
        Self {
            sessions: Arc::new(sessions),
            index: Arc::new(Mutex::new(0)),
            fast,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Take the next session, or None if exhausted
    pub fn next_session(&self) -> Option<RecordingSession> {
        let mut idx = self.index.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let session = self.sessions.get(*idx)?.clone();
        *idx += 1;
        Some(session)
    }

    /// Turn a session's timestamps into per-chunk delays
    fn playback_chunks(&self, session: RecordingSession) -> Vec<PlaybackChunk> {
        let mut last_ms = 0;
        session
            .chunks
            .into_iter()
            .map(|chunk| {
                let delay_ms = if self.fast {
                    0
                } else {
                    chunk.timestamp_ms.saturating_sub(last_ms)
                };
                last_ms = chunk.timestamp_ms;
                PlaybackChunk {
                    data: chunk.data,
                    delay_ms,
                }
            })
            .collect()
    }
}

/// Serves recorded sessions instead of contacting a server
pub struct PlaybackProvider {
    state: PlaybackState,
}

impl PlaybackProvider {
    pub fn new(state: PlaybackState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl GenerateProvider for PlaybackProvider {
    async fn open_generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<Box<dyn ChunkStream>, ApiError> {
        let session = self.state.next_session().ok_or_else(|| {
            ApiError::InvalidResponse("No more recorded sessions to play back".to_string())
        })?;
        debug!(
            "Playing back {} recorded chunks for model {}",
            session.chunks.len(),
            request.model
        );
        Ok(Box::new(PlaybackChunkStream::new(
            self.state.playback_chunks(session),
        )))
    }
}
