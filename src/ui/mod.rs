pub mod html_page;
pub mod terminal;

use crate::render::RenderedFrame;
use std::fmt;
use std::sync::Arc;

pub use html_page::HtmlPageView;
pub use terminal::TerminalView;

/// Status line shown next to the output
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Requesting,
    Streaming,
    /// Completed, with the generation time
    Elapsed(String),
    /// Completed without timing information
    Done,
    Stopped,
    Failed(String),
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Requesting => write!(f, "Waiting for the server…"),
            Status::Streaming => write!(f, "Receiving…"),
            Status::Elapsed(seconds) => write!(f, "Time elapsed: {seconds}"),
            Status::Done => write!(f, "Done."),
            Status::Stopped => write!(f, "Stopped."),
            Status::Failed(detail) => write!(f, "Error occurred: {detail}"),
        }
    }
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Status::Requesting | Status::Streaming)
    }
}

/// Where the live output of a run is displayed
pub trait OutputView: Send + Sync {
    /// A new run takes over the output area
    fn begin(&self, input: &str, model: &str);

    /// Replace the whole output with a new frame
    fn replace_output(&self, frame: &RenderedFrame);

    fn set_status(&self, status: &Status);

    /// Replace the output with a short message instead of model text
    fn show_notice(&self, notice: &str);
}

/// Forwards every call to several views
pub struct MultiView {
    views: Vec<Arc<dyn OutputView>>,
}

impl MultiView {
    pub fn new(views: Vec<Arc<dyn OutputView>>) -> Self {
        Self { views }
    }
}

impl OutputView for MultiView {
    fn begin(&self, input: &str, model: &str) {
        for view in &self.views {
            view.begin(input, model);
        }
    }

    fn replace_output(&self, frame: &RenderedFrame) {
        for view in &self.views {
            view.replace_output(frame);
        }
    }

    fn set_status(&self, status: &Status) {
        for view in &self.views {
            view.set_status(status);
        }
    }

    fn show_notice(&self, notice: &str) {
        for view in &self.views {
            view.show_notice(notice);
        }
    }
}
