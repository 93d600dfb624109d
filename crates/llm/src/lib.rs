//! Client-side plumbing for a locally hosted Ollama server
//!
//! This crate implements:
//! - Chunk sources for streaming responses (live HTTP and recorded playback)
//! - Incremental UTF-8 decoding and newline framing of the response body
//! - Parsing of the newline-delimited status records `/api/generate` emits
//! - The Ollama client itself (`/api/generate` and `/api/tags`)
//! - Recording of generate streams and their playback


pub mod ollama;
pub mod recording;
pub mod streaming;
pub mod types;

pub use ollama::{
    GenerateRequest, ModelInfo, OllamaClient, OllamaStreamHandler, RecordParser, StatusRecord,
};
pub use recording::{ApiRecorder, PlaybackProvider, PlaybackState, RecordingProvider};
pub use streaming::{
    ChunkStream, HttpChunkStream, LineBuffer, PlaybackChunk, PlaybackChunkStream,
    Utf8StreamDecoder,
};
pub use types::*;

use async_trait::async_trait;

/// Seam between the stream controller and whatever produces response bytes
#[async_trait]
pub trait GenerateProvider: Send + Sync {
    /// Issues a streaming generate request and returns the body once the
    /// response headers have arrived with a success status.
    async fn open_generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<Box<dyn ChunkStream>, ApiError>;
}
