use super::types::StatusRecord;
use crate::streaming::{LineBuffer, Utf8StreamDecoder};
use tracing::{debug, warn};

/// Parses single lines of a generate stream into status records
#[derive(Debug, Default, Clone)]
pub struct RecordParser {
    failures: usize,
}

impl RecordParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one line. A malformed line is logged and skipped, it never
    /// aborts the stream.
    pub fn parse_line(&mut self, line: &str) -> Option<StatusRecord> {
        match serde_json::from_str::<StatusRecord>(line) {
            Ok(record) => {
                debug!("Received stream record '{line}'");
                if let Some(error) = &record.error {
                    warn!("Server reported an error in the stream: {error}");
                }
                Some(record)
            }
            Err(e) => {
                self.failures += 1;
                warn!("Failed to parse stream line '{}': {}", line, e);
                None
            }
        }
    }

    /// Number of lines that could not be parsed so far
    pub fn failures(&self) -> usize {
        self.failures
    }
}

/// Turns the raw bytes of a generate stream into text deltas
///
/// Bytes are decoded incrementally, framed into lines and parsed. The last
/// record marked `done` is retained as `final_data`.
#[derive(Default)]
pub struct OllamaStreamHandler {
    decoder: Utf8StreamDecoder,
    line_buffer: LineBuffer,
    parser: RecordParser,
    final_data: Option<StatusRecord>,
    records: usize,
}

impl OllamaStreamHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a chunk of body bytes and return the non-empty text deltas of
    /// every record it completed, in order
    pub fn process_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decoder.decode(chunk, false);
        let lines = self.line_buffer.push(&text);
        self.handle_lines(lines)
    }

    /// End of stream: flush the decoder and treat any unterminated remainder
    /// as one last (possibly malformed) record
    pub fn finish(&mut self) -> Vec<String> {
        let tail = self.decoder.decode(&[], true);
        let mut lines = self.line_buffer.push(&tail);
        lines.extend(self.line_buffer.finish());
        self.handle_lines(lines)
    }

    fn handle_lines(&mut self, lines: Vec<String>) -> Vec<String> {
        let mut deltas = Vec::new();
        for line in lines {
            let Some(record) = self.parser.parse_line(&line) else {
                continue;
            };
            self.records += 1;

            if let Some(delta) = record.delta() {
                deltas.push(delta.to_string());
            }
            if record.done {
                self.final_data = Some(record);
            }
        }
        deltas
    }

    /// The last terminal record seen, if any
    pub fn final_data(&self) -> Option<&StatusRecord> {
        self.final_data.as_ref()
    }

    pub fn take_final_data(&mut self) -> Option<StatusRecord> {
        self.final_data.take()
    }

    /// Successfully parsed records so far
    pub fn record_count(&self) -> usize {
        self.records
    }

    /// Lines skipped because they were not valid records
    pub fn parse_failures(&self) -> usize {
        self.parser.failures()
    }
}
