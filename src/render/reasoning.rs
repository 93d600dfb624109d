//! Classification of reasoning spans in the accumulated response text
//!
//! Models like qwen3 or deepseek-r1 wrap their chain of thought in
//! `<think>…</think>`. The scanner is re-run over the whole buffer after
//! every delta: a span that is still open on one tick may be closed on the
//! next, so no earlier classification is kept.

use regex::Regex;

/// Delimiters of a reasoning span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningMarkers {
    pub open: String,
    pub close: String,
}

impl Default for ReasoningMarkers {
    fn default() -> Self {
        Self {
            open: "<think>".to_string(),
            close: "</think>".to_string(),
        }
    }
}

/// Lifecycle of one reasoning container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanPhase {
    /// Start marker seen, no end marker yet
    InProgress,
    /// Paired span, duration label not yet known
    Closed,
    /// Stamped by the finalizer
    Complete,
}

impl SpanPhase {
    fn css_class(self) -> &'static str {
        match self {
            SpanPhase::InProgress => "in-progress",
            SpanPhase::Closed => "closed",
            SpanPhase::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fold {
    Collapsed,
    Expanded,
}

/// Presentational container for the content of one reasoning span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningContainer {
    pub content: String,
    pub phase: SpanPhase,
    pub fold: Fold,
    /// Duration label, filled in at finalization
    pub label: Option<String>,
}

impl ReasoningContainer {
    fn closed(content: &str) -> Self {
        Self {
            content: content.to_string(),
            phase: SpanPhase::Closed,
            fold: Fold::Collapsed,
            label: None,
        }
    }

    fn in_progress(content: &str) -> Self {
        Self {
            content: content.to_string(),
            phase: SpanPhase::InProgress,
            fold: Fold::Expanded,
            label: None,
        }
    }

    pub fn toggle(&mut self) {
        self.fold = match self.fold {
            Fold::Collapsed => Fold::Expanded,
            Fold::Expanded => Fold::Collapsed,
        };
    }

    pub fn is_collapsed(&self) -> bool {
        self.fold == Fold::Collapsed
    }

    /// Mark the span finished and attach the duration label. Finished
    /// containers start out collapsed.
    pub fn complete(&mut self, label: &str) {
        if !self.is_collapsed() {
            self.toggle();
        }
        self.phase = SpanPhase::Complete;
        self.label = Some(label.to_string());
    }

    fn label_text(&self) -> &str {
        match (self.phase, &self.label) {
            (_, Some(label)) => label,
            (SpanPhase::InProgress, None) => "Thinking…",
            _ => "",
        }
    }

    /// HTML block wrapping the content. The content sits between blank lines
    /// so the markdown renderer still formats it.
    fn write_markup(&self, out: &mut String) {
        let fold = match self.fold {
            Fold::Collapsed => "collapsed",
            Fold::Expanded => "expanded",
        };
        let expanded = !self.is_collapsed();

        out.push_str(&format!(
            "<div class=\"think-container {} {}\" data-phase=\"{}\">\n",
            self.phase.css_class(),
            fold,
            self.phase.css_class()
        ));
        out.push_str(&format!(
            "<button class=\"think-toggle\" aria-expanded=\"{expanded}\"><span class=\"think-label\">{}</span></button>\n",
            escape_html(self.label_text())
        ));
        out.push_str("<div class=\"think-content\">\n\n");
        out.push_str(self.content.trim());
        out.push_str("\n\n</div>\n</div>");
    }
}

/// A piece of the preprocessed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Reasoning(ReasoningContainer),
}

/// Result of scanning the response buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preprocessed {
    segments: Vec<Segment>,
}

impl Preprocessed {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[cfg(test)]
    pub fn containers(&self) -> impl Iterator<Item = &ReasoningContainer> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Reasoning(container) => Some(container),
            Segment::Text(_) => None,
        })
    }

    pub fn containers_mut(&mut self) -> impl Iterator<Item = &mut ReasoningContainer> {
        self.segments.iter_mut().filter_map(|segment| match segment {
            Segment::Reasoning(container) => Some(container),
            Segment::Text(_) => None,
        })
    }

    #[cfg(test)]
    pub fn has_open_span(&self) -> bool {
        self.containers()
            .any(|container| container.phase == SpanPhase::InProgress)
    }

    /// Stamp every container as complete with the given label
    pub fn complete_all(&mut self, label: &str) {
        for container in self.containers_mut() {
            container.complete(label);
        }
    }

    /// Markdown source with containers replaced by their HTML blocks
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Reasoning(container) => {
                    if !out.is_empty() && !out.ends_with("\n\n") {
                        out.push_str(if out.ends_with('\n') { "\n" } else { "\n\n" });
                    }
                    container.write_markup(&mut out);
                    out.push_str("\n\n");
                }
            }
        }
        out
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Segment::Text(last)) = self.segments.last_mut() {
            last.push_str(text);
        } else {
            self.segments.push(Segment::Text(text.to_string()));
        }
    }
}

/// Finds reasoning spans in text
#[derive(Debug, Clone)]
pub struct ReasoningScanner {
    markers: ReasoningMarkers,
    paired: Regex,
}

impl Default for ReasoningScanner {
    fn default() -> Self {
        Self::new(ReasoningMarkers::default())
    }
}

impl ReasoningScanner {
    pub fn new(markers: ReasoningMarkers) -> Self {
        let pattern = format!(
            "(?s){}(.*?){}",
            regex::escape(&markers.open),
            regex::escape(&markers.close)
        );
        Self {
            paired: Regex::new(&pattern).expect("escaped markers form a valid pattern"),
            markers,
        }
    }

    /// Split `text` into plain text and reasoning containers
    ///
    /// Paired spans are matched earliest first and never nest. Spans with
    /// only whitespace inside are dropped. An unmatched start marker after
    /// the last pair turns the rest of the text into one in-progress
    /// container, even while that rest is still empty.
    pub fn scan(&self, text: &str) -> Preprocessed {
        let mut result = Preprocessed::default();
        let mut last = 0;

        for captures in self.paired.captures_iter(text) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let inner = captures.get(1).map_or("", |m| m.as_str());

            result.push_text(&text[last..whole.start()]);
            if !inner.trim().is_empty() {
                result
                    .segments
                    .push(Segment::Reasoning(ReasoningContainer::closed(inner)));
            }
            last = whole.end();
        }

        let tail = &text[last..];
        match tail.find(&self.markers.open) {
            Some(pos) => {
                result.push_text(&tail[..pos]);
                let open_content = &tail[pos + self.markers.open.len()..];
                result
                    .segments
                    .push(Segment::Reasoning(ReasoningContainer::in_progress(
                        open_content,
                    )));
            }
            None => result.push_text(tail),
        }

        result
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
