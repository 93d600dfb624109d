use super::{OutputView, Status};
use crate::render::RenderedFrame;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 50rem; margin: 2rem auto; line-height: 1.5; }
.input { white-space: pre-wrap; color: #555; border-left: 3px solid #ccc; padding-left: .75rem; }
.status { color: #777; font-size: .9rem; }
.status.error { color: #c00; }
.think-container { border: 1px solid #ddd; border-radius: 6px; margin: .5rem 0; }
.think-toggle { all: unset; cursor: pointer; display: block; padding: .25rem .5rem; color: #666; }
.think-toggle::before { content: "▸ "; }
.think-container.expanded .think-toggle::before { content: "▾ "; }
.think-container.collapsed .think-content { display: none; }
.think-content { padding: 0 .75rem; color: #555; }
.think-container.in-progress .think-label { font-style: italic; }
"#;

const TOGGLE_SCRIPT: &str = r#"
document.addEventListener("click", (event) => {
  const toggle = event.target.closest(".think-toggle");
  if (!toggle) return;
  const container = toggle.closest(".think-container");
  const expanded = container.classList.toggle("expanded");
  container.classList.toggle("collapsed", !expanded);
  toggle.setAttribute("aria-expanded", String(expanded));
});
"#;

#[derive(Default)]
struct PageState {
    input: String,
    model: String,
    markup: String,
    status: Option<Status>,
}

/// Keeps a standalone HTML page in sync with the output
///
/// The file is rewritten in full on every update. While a run is in flight
/// the page asks the browser to reload itself every second.
pub struct HtmlPageView {
    path: PathBuf,
    state: Mutex<PageState>,
}

impl HtmlPageView {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(PageState::default()),
        }
    }

    fn update(&self, change: impl FnOnce(&mut PageState)) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        change(&mut state);

        let page = render_page(&state);
        if let Err(e) = std::fs::write(&self.path, page) {
            warn!("Failed to write {}: {}", self.path.display(), e);
        }
    }
}

fn render_page(state: &PageState) -> String {
    let live = !state.status.as_ref().is_some_and(Status::is_terminal);
    let refresh = if live {
        "<meta http-equiv=\"refresh\" content=\"1\">\n"
    } else {
        ""
    };
    let status = match &state.status {
        Some(status @ Status::Failed(_)) => format!(
            "<div class=\"status error\">{}</div>",
            escape_text(&status.to_string())
        ),
        Some(status) => format!(
            "<div class=\"status\">{}</div>",
            escape_text(&status.to_string())
        ),
        None => String::new(),
    };

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n{refresh}<title>quick-tl</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <p><strong>Input:</strong></p>\n<div class=\"input\">{}</div>\n\
         <p><strong>Output ({}):</strong></p>\n<div class=\"output\">\n{}</div>\n{status}\n\
         <script>{TOGGLE_SCRIPT}</script>\n</body>\n</html>\n",
        escape_text(&state.input),
        escape_text(&state.model),
        state.markup,
    )
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl OutputView for HtmlPageView {
    fn begin(&self, input: &str, model: &str) {
        self.update(|state| {
            *state = PageState {
                input: input.to_string(),
                model: model.to_string(),
                ..PageState::default()
            };
        });
    }

    fn replace_output(&self, frame: &RenderedFrame) {
        self.update(|state| state.markup = frame.markup.clone());
    }

    fn set_status(&self, status: &Status) {
        self.update(|state| state.status = Some(status.clone()));
    }

    fn show_notice(&self, notice: &str) {
        self.update(|state| state.markup = format!("<p><em>{}</em></p>\n", escape_text(notice)));
    }
}
