use super::{OutputView, Status};
use crate::render::{Preprocessed, ReasoningMarkers, RenderedFrame, Segment, SpanPhase};
use crossterm::style::{Attribute, SetAttribute};
use crossterm::tty::IsTty;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

const REASONING_START: &str = "[thinking]\n";
const REASONING_END: &str = "[/thinking]\n";

/// What is on the terminal, and the newest transcript in full
#[derive(Default)]
struct Transcript {
    printed: String,
    latest: String,
}

/// Streams the response to stdout and status lines to stderr
///
/// A terminal cannot redraw a rendered page. Each frame is turned into a
/// plain transcript with reasoning bracketed (and dimmed on a tty), and only
/// the part extending what was printed is written. A marker that has only
/// partly arrived is held back until a later frame shows what it becomes.
pub struct TerminalView {
    markers: ReasoningMarkers,
    styled: bool,
    transcript: Mutex<Transcript>,
    writer: Option<Arc<Mutex<Box<dyn Write + Send>>>>,
}

impl Default for TerminalView {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalView {
    pub fn new() -> Self {
        Self {
            markers: ReasoningMarkers::default(),
            styled: io::stdout().is_tty(),
            transcript: Mutex::new(Transcript::default()),
            writer: None,
        }
    }

    #[cfg(test)]
    pub fn with_test_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            styled: false,
            writer: Some(Arc::new(Mutex::new(writer))),
            ..Self::new()
        }
    }

    fn transcript(&self) -> MutexGuard<'_, Transcript> {
        self.transcript
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let result = match &self.writer {
            Some(writer) => {
                let mut writer = writer.lock().unwrap_or_else(|p| p.into_inner());
                writer
                    .write_all(text.as_bytes())
                    .and_then(|_| writer.flush())
            }
            None => {
                let mut stdout = io::stdout().lock();
                stdout
                    .write_all(text.as_bytes())
                    .and_then(|_| stdout.flush())
            }
        };
        if let Err(e) = result {
            trace!("Failed to write to stdout: {e}");
        }
    }

    fn advance_to(&self, transcript: &mut Transcript, next: String) {
        let text = continuation(&transcript.printed, &next, self.styled);
        self.write(&text);
        transcript.printed = next;
    }
}

fn dim() -> String {
    SetAttribute(Attribute::Dim).to_string()
}

fn reset() -> String {
    SetAttribute(Attribute::Reset).to_string()
}

/// `text` without a trailing partial `marker`
fn without_partial_marker<'a>(text: &'a str, marker: &str) -> &'a str {
    for len in (1..marker.len()).rev() {
        if marker.is_char_boundary(len) && text.ends_with(&marker[..len]) {
            return &text[..text.len() - len];
        }
    }
    text
}

/// Plain-text rendition of a preprocessed response
///
/// With `hold_back`, a partial marker at the very end is left out. The
/// result only grows while the buffer grows, except when a span turns out
/// to be empty and is dropped.
fn render_transcript(
    preprocessed: &Preprocessed,
    markers: &ReasoningMarkers,
    styled: bool,
    hold_back: bool,
) -> String {
    let segments = preprocessed.segments();
    let mut out = String::new();

    for (index, segment) in segments.iter().enumerate() {
        let is_last = hold_back && index + 1 == segments.len();
        match segment {
            Segment::Text(text) => {
                let text = if is_last {
                    without_partial_marker(text, &markers.open)
                } else {
                    text
                };
                out.push_str(text);
            }
            Segment::Reasoning(container) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                if styled {
                    out.push_str(&dim());
                }
                out.push_str(REASONING_START);

                let content = container.content.trim_start();
                if container.phase == SpanPhase::InProgress {
                    let content = if is_last {
                        without_partial_marker(content, &markers.close)
                    } else {
                        content
                    };
                    out.push_str(content);
                } else {
                    out.push_str(content);
                    if !content.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str(REASONING_END);
                    if styled {
                        out.push_str(&reset());
                    }
                }
            }
        }
    }
    out
}

/// Byte length of the longest common prefix, on a char boundary
fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, x), y)| x != y)
        .map_or(a.len().min(b.len()), |((index, _), _)| index)
}

/// What to write after `printed` so the terminal shows `next`
///
/// Printed text that `next` no longer contains cannot be taken back. The
/// diverging rest of `next` then continues on a new line.
fn continuation(printed: &str, next: &str, styled: bool) -> String {
    if let Some(rest) = next.strip_prefix(printed) {
        return rest.to_string();
    }

    let common = common_prefix_len(printed, next);
    let mut out = String::new();
    if styled {
        out.push_str(&reset());
    }
    if !printed.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&next[common..]);
    out
}

impl OutputView for TerminalView {
    fn begin(&self, _input: &str, model: &str) {
        *self.transcript() = Transcript::default();
        eprintln!("── {model} ──");
    }

    fn replace_output(&self, frame: &RenderedFrame) {
        let shown = render_transcript(&frame.preprocessed, &self.markers, self.styled, true);
        let mut transcript = self.transcript();
        transcript.latest =
            render_transcript(&frame.preprocessed, &self.markers, self.styled, false);
        self.advance_to(&mut transcript, shown);
    }

    fn set_status(&self, status: &Status) {
        if !status.is_terminal() {
            return;
        }

        // Whatever was held back will not be resolved anymore
        let mut transcript = self.transcript();
        let latest = transcript.latest.clone();
        self.advance_to(&mut transcript, latest);
        if self.styled {
            self.write(&reset());
        }
        eprintln!("\n[{status}]");
    }

    fn show_notice(&self, notice: &str) {
        eprintln!("{notice}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{IncrementalRenderer, ReasoningScanner};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn plain(text: &str, hold_back: bool) -> String {
        let preprocessed = ReasoningScanner::default().scan(text);
        render_transcript(&preprocessed, &ReasoningMarkers::default(), false, hold_back)
    }

    #[test]
    fn test_reasoning_is_bracketed() {
        assert_eq!(
            plain("Hi<think>why</think>Answer", false),
            "Hi\n[thinking]\nwhy\n[/thinking]\nAnswer"
        );
        assert_eq!(plain("Hi<think>\nstill", false), "Hi\n[thinking]\nstill");
        assert_eq!(plain("<think> </think>Answer", false), "Answer");
    }

    #[test]
    fn test_partial_markers_are_held_back() {
        assert_eq!(without_partial_marker("Hello <thi", "<think>"), "Hello ");
        assert_eq!(without_partial_marker("a < b", "<think>"), "a < b");
        assert_eq!(plain("Hello <th", true), "Hello ");
        assert_eq!(plain("Hello <th", false), "Hello <th");
        assert_eq!(plain("<think>why</th", true), "[thinking]\nwhy");
    }

    #[test]
    fn test_streamed_transcript_only_grows() {
        let text = "Hi <think>why</think>Answer";
        let mut previous = String::new();
        for end in (1..=text.len()).filter(|&end| text.is_char_boundary(end)) {
            let next = plain(&text[..end], true);
            assert!(
                next.starts_with(&previous),
                "{previous:?} is not a prefix of {next:?}"
            );
            previous = next;
        }
        assert_eq!(previous, "Hi \n[thinking]\nwhy\n[/thinking]\nAnswer");
    }

    #[test]
    fn test_continuation() {
        assert_eq!(continuation("ab", "abc", false), "c");
        assert_eq!(continuation("", "abc", false), "abc");
        // A dropped empty span stays on screen, the answer follows it
        assert_eq!(continuation("Hi \n[thinking]\n", "Hi there", false), "there");
        assert_eq!(continuation("Hi <", "Hi there", false), "\nthere");
        assert_eq!(common_prefix_len("é", "e"), 0);
    }

    #[test]
    fn test_view_streams_frames_and_flushes_on_status() {
        let buffer = SharedBuffer::default();
        let view = TerminalView::with_test_writer(Box::new(buffer.clone()));
        let renderer = IncrementalRenderer::default();

        view.begin("x", "m");
        for text in ["He", "Hello <thi", "Hello <think>plan", "Hello <think>plan</think>Hi"] {
            view.replace_output(&renderer.render(text));
        }
        assert_eq!(
            buffer.contents(),
            "Hello \n[thinking]\nplan\n[/thinking]\nHi"
        );

        view.begin("y", "m");
        view.replace_output(&renderer.render("Bye <"));
        view.set_status(&Status::Stopped);
        assert!(buffer.contents().ends_with("HiBye <"));
    }
}
