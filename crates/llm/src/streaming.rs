//! Common streaming infrastructure
//!
//! This module provides the byte-level half of the response pipeline: chunk
//! sources for real HTTP responses and recorded playback (processed by the
//! same logic), a streaming UTF-8 decoder, and the newline framer.

use anyhow::Result;
use async_trait::async_trait;
use encoding_rs::{CoderResult, Decoder, UTF_8};
use reqwest::Response;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trait for streaming chunk sources (real HTTP response or recorded playback)
#[async_trait]
pub trait ChunkStream: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Real HTTP response chunk stream
pub struct HttpChunkStream {
    pub response: Response,
}

impl HttpChunkStream {
    pub fn new(response: Response) -> Self {
        Self { response }
    }
}

#[async_trait]
impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.response.chunk().await {
            Ok(Some(chunk)) => Ok(Some(chunk.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("HTTP chunk error: {}", e)),
        }
    }
}

/// Single recorded chunk with the delay to wait before delivering it
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaybackChunk {
    /// Raw body text of this chunk
    pub data: String,
    /// Milliseconds to wait before this chunk is delivered
    #[serde(default)]
    pub delay_ms: u64,
}

/// Recorded chunk stream for playback
pub struct PlaybackChunkStream {
    chunks: Vec<Vec<u8>>,
    delays: Vec<Duration>,
    current_index: usize,
}

impl PlaybackChunkStream {
    pub fn new(chunks: Vec<PlaybackChunk>) -> Self {
        let delays = chunks
            .iter()
            .map(|c| Duration::from_millis(c.delay_ms))
            .collect();
        let chunks = chunks.into_iter().map(|c| c.data.into_bytes()).collect();
        Self {
            chunks,
            delays,
            current_index: 0,
        }
    }

    /// Chunks delivered back to back, split at arbitrary byte offsets
    pub fn from_bytes(chunks: Vec<Vec<u8>>) -> Self {
        let delays = vec![Duration::ZERO; chunks.len()];
        Self {
            chunks,
            delays,
            current_index: 0,
        }
    }

    /// Same as `from_bytes`, but waits `delay` before every chunk
    pub fn with_delay(chunks: Vec<Vec<u8>>, delay: Duration) -> Self {
        let delays = vec![delay; chunks.len()];
        Self {
            chunks,
            delays,
            current_index: 0,
        }
    }
}

#[async_trait]
impl ChunkStream for PlaybackChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.current_index >= self.chunks.len() {
            return Ok(None);
        }

        let delay = self.delays[self.current_index];
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let chunk = std::mem::take(&mut self.chunks[self.current_index]);
        self.current_index += 1;
        Ok(Some(chunk))
    }
}

/// Incremental UTF-8 decoder
///
/// A multi-byte character split across two chunks is held back until the
/// rest of it arrives, so decoding chunk by chunk yields the same text as
/// decoding the whole body at once. Malformed input becomes U+FFFD.
pub struct Utf8StreamDecoder {
    decoder: Decoder,
}

impl Default for Utf8StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self {
            decoder: UTF_8.new_decoder(),
        }
    }

    /// Decode the next chunk. Pass `last = true` once the source is exhausted
    /// to flush any dangling partial sequence; the decoder starts over
    /// afterwards.
    pub fn decode(&mut self, bytes: &[u8], last: bool) -> String {
        let capacity = self
            .decoder
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or(bytes.len() * 3 + 4);
        let mut out = String::with_capacity(capacity);
        let mut src = bytes;

        loop {
            let (result, read, _had_replacements) =
                self.decoder.decode_to_string(src, &mut out, last);
            src = &src[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => {
                    let more = self
                        .decoder
                        .max_utf8_buffer_length(src.len())
                        .unwrap_or(src.len() * 3 + 4);
                    out.reserve(more.max(4));
                }
            }
        }

        // A finished decoder must not be fed again
        if last {
            self.decoder = UTF_8.new_decoder();
        }
        out
    }
}

/// Newline framer for decoded text
///
/// Complete lines are drained as soon as their newline arrives; the trailing
/// partial line stays in the buffer until more text comes in or `finish` is
/// called. Blank lines are skipped.
#[derive(Clone, Debug, Default)]
pub struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Append text and return every line it completed, in arrival order
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// Text received after the last newline
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// End of stream: hand out the unterminated remainder, if any
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }
}
