use crate::persistence::{HistoryEntry, HistoryStore, MAX_HISTORY_ITEMS};
use crate::render::{IncrementalRenderer, RenderedFrame};
use crate::ui::{OutputView, Status};
use llm::StatusRecord;
use std::fmt;
use tracing::{debug, error, info};

/// Notice shown in place of the output when the model produced no text
pub const EMPTY_RESPONSE_NOTICE: &str = "The model returned an empty response.";

/// Label stamped on reasoning containers once a stream completes
#[derive(Debug, Clone, PartialEq)]
pub enum DurationLabel {
    /// Time spent generating tokens
    Eval(f64),
    /// Wall time of the whole request, used when no eval time was reported
    Total(f64),
    /// No timing information at all
    Unknown,
}

impl DurationLabel {
    pub fn from_record(final_data: Option<&StatusRecord>) -> Self {
        let Some(record) = final_data else {
            return DurationLabel::Unknown;
        };
        match (record.eval_duration, record.total_duration) {
            (Some(nanos), _) => DurationLabel::Eval(nanos_to_secs(nanos)),
            (None, Some(nanos)) => DurationLabel::Total(nanos_to_secs(nanos)),
            (None, None) => DurationLabel::Unknown,
        }
    }

    /// Seconds with two decimals, e.g. `2.50s`
    pub fn seconds(&self) -> Option<String> {
        match self {
            DurationLabel::Eval(secs) | DurationLabel::Total(secs) => Some(format!("{secs:.2}s")),
            DurationLabel::Unknown => None,
        }
    }

    /// Status shown once the run completed
    pub fn status(&self) -> Status {
        match self.seconds() {
            Some(seconds) => Status::Elapsed(seconds),
            None => Status::Done,
        }
    }
}

impl fmt::Display for DurationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationLabel::Eval(secs) => write!(f, "Thought for {secs:.2}s"),
            DurationLabel::Total(secs) => write!(f, "Thought for {secs:.2}s (total)"),
            DurationLabel::Unknown => write!(f, "Thought"),
        }
    }
}

fn nanos_to_secs(nanos: u64) -> f64 {
    nanos as f64 / 1_000_000_000.0
}

/// What a completed run left behind
#[derive(Debug, Clone)]
pub struct Finalized {
    /// The persisted exchange, `None` for an empty response
    pub entry: Option<HistoryEntry>,
    pub label: DurationLabel,
    pub frame: RenderedFrame,
}

/// Turns the buffer of a completed run into its final output and history entry
pub struct Finalizer<'a> {
    pub renderer: &'a IncrementalRenderer,
    pub view: &'a dyn OutputView,
    pub history: &'a dyn HistoryStore,
}

impl Finalizer<'_> {
    pub fn finalize(
        &self,
        input: &str,
        model: &str,
        buffer: &str,
        final_data: Option<&StatusRecord>,
    ) -> Finalized {
        let label = DurationLabel::from_record(final_data);

        if buffer.is_empty() {
            info!("Model {model} returned an empty response");
            self.view.show_notice(EMPTY_RESPONSE_NOTICE);
            self.view.set_status(&label.status());
            return Finalized {
                entry: None,
                label,
                frame: RenderedFrame::default(),
            };
        }

        let frame = self.renderer.render_final(buffer, &label.to_string());
        self.view.replace_output(&frame);
        self.view.set_status(&label.status());

        let entry = HistoryEntry::new(input.to_string(), frame.markup.clone(), model.to_string());
        match self.history.append_capped(entry.clone(), MAX_HISTORY_ITEMS) {
            Ok(entries) => debug!("History now holds {} entries", entries.len()),
            Err(e) => error!("Failed to save history: {e:#}"),
        }

        Finalized {
            entry: Some(entry),
            label,
            frame,
        }
    }
}
