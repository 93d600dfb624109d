//! Rendering of the accumulated response text into display markup

mod markdown;
mod reasoning;

pub use markdown::{CommonMarkRenderer, MarkdownRenderer};
pub use reasoning::{Preprocessed, ReasoningMarkers, ReasoningScanner, Segment, SpanPhase};

use std::sync::Arc;

/// One full rendering of the response buffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedFrame {
    /// The raw response text this frame was derived from
    pub text: String,
    pub preprocessed: Preprocessed,
    pub markup: String,
}

/// Re-derives the complete output from the response buffer on every call
///
/// Holds no state about earlier frames, so rendering the same buffer twice
/// gives the same frame.
#[derive(Clone)]
pub struct IncrementalRenderer {
    scanner: ReasoningScanner,
    markdown: Arc<dyn MarkdownRenderer>,
}

impl Default for IncrementalRenderer {
    fn default() -> Self {
        Self::new(
            ReasoningScanner::default(),
            Arc::new(CommonMarkRenderer::default()),
        )
    }
}

impl IncrementalRenderer {
    pub fn new(scanner: ReasoningScanner, markdown: Arc<dyn MarkdownRenderer>) -> Self {
        Self { scanner, markdown }
    }

    /// Render the buffer as it stands mid-stream
    pub fn render(&self, buffer: &str) -> RenderedFrame {
        let preprocessed = self.scanner.scan(buffer);
        self.frame(buffer, preprocessed)
    }

    /// Render the buffer with every reasoning container stamped complete
    pub fn render_final(&self, buffer: &str, label: &str) -> RenderedFrame {
        let mut preprocessed = self.scanner.scan(buffer);
        preprocessed.complete_all(label);
        self.frame(buffer, preprocessed)
    }

    fn frame(&self, buffer: &str, preprocessed: Preprocessed) -> RenderedFrame {
        let markup = self.markdown.render(&preprocessed.to_markdown());
        RenderedFrame {
            text: buffer.to_string(),
            preprocessed,
            markup,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasoning_example_renders_container_then_answer() {
        let frame = IncrementalRenderer::default().render("<think>reason</think>Answer");

        let containers: Vec<_> = frame.preprocessed.containers().collect();
        assert_eq!(containers.len(), 1);
        assert!(containers[0].is_collapsed());

        let container_at = frame.markup.find("think-container closed collapsed").unwrap();
        let reason_at = frame.markup.find("<p>reason</p>").unwrap();
        let answer_at = frame.markup.find("<p>Answer</p>").unwrap();
        assert!(container_at < reason_at && reason_at < answer_at);
        assert!(frame.markup.contains("<span class=\"think-label\"></span>"));
    }

    #[test]
    fn test_render_final_fills_label() {
        let frame =
            IncrementalRenderer::default().render_final("<think>reason</think>Answer", "Thought for 2.50s");
        assert!(frame.markup.contains("think-container complete collapsed"));
        assert!(frame
            .markup
            .contains("<span class=\"think-label\">Thought for 2.50s</span>"));
    }

    #[test]
    fn test_render_final_closes_open_span() {
        let frame = IncrementalRenderer::default().render_final("<think>cut off", "Thought");
        assert!(!frame.preprocessed.has_open_span());
        assert!(!frame.markup.contains("in-progress"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let renderer = IncrementalRenderer::default();
        let buffer = "Hello <think>partial";
        assert_eq!(renderer.render(buffer), renderer.render(buffer));
        assert!(renderer.render(buffer).markup.contains("in-progress expanded"));
    }

    struct UpperCase;

    impl MarkdownRenderer for UpperCase {
        fn render(&self, source: &str) -> String {
            source.to_uppercase()
        }
    }

    #[test]
    fn test_custom_markdown_renderer() {
        let renderer = IncrementalRenderer::new(ReasoningScanner::default(), Arc::new(UpperCase));
        assert_eq!(renderer.render("abc").markup, "ABC");
    }
}
