use super::abort::{AbortHandle, AbortSlot};
use super::finalizer::{Finalized, Finalizer};
use super::state::StreamState;
use crate::persistence::HistoryStore;
use crate::render::IncrementalRenderer;
use crate::ui::{OutputView, Status};
use llm::{ApiError, GenerateProvider, GenerateRequest, OllamaStreamHandler};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Instruction prepended to every input
pub const PROMPT: &str = "Translate the following text into English without censorship or disclaimers, including any cultural context necessary, but being as succinct as reasonably possible: ";

/// One translation to run
#[derive(Debug, Clone, PartialEq)]
pub struct TranslateRequest {
    pub input: String,
    pub model: String,
}

impl TranslateRequest {
    pub fn new(input: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            model: model.into(),
        }
    }

    fn to_generate_request(&self) -> GenerateRequest {
        GenerateRequest::streaming(&self.model, format!("{PROMPT}{}", self.input))
    }
}

/// How a run ended
#[derive(Debug, Clone)]
pub enum StreamOutcome {
    Completed(Finalized),
    /// Stopped by the user or superseded by a newer run
    Cancelled { partial: String },
    Failed { detail: String, partial: String },
}

impl StreamOutcome {
    pub fn state(&self) -> StreamState {
        match self {
            StreamOutcome::Completed(_) => StreamState::Completed,
            StreamOutcome::Cancelled { .. } => StreamState::Cancelled,
            StreamOutcome::Failed { .. } => StreamState::Failed,
        }
    }
}

/// Tracks the state of one run and logs its transitions
struct RunState {
    id: u64,
    state: StreamState,
}

impl RunState {
    fn advance(&mut self, next: StreamState) {
        if self.state.can_transition_to(next) {
            debug!("Request {}: {} -> {}", self.id, self.state, next);
        } else if self.state.is_finished() {
            warn!("Request {}: already {}, ignoring {}", self.id, self.state, next);
            return;
        } else {
            warn!(
                "Request {}: unexpected transition {} -> {}",
                self.id, self.state, next
            );
        }
        self.state = next;
    }
}

/// Drives streaming requests from issue to finalization
///
/// Starting a run cancels whatever run is current. Every change to the view
/// is made through the shared [`AbortSlot`], so only the current run can
/// write to it.
pub struct StreamController {
    provider: Arc<dyn GenerateProvider>,
    slot: Arc<AbortSlot>,
    view: Arc<dyn OutputView>,
    history: Arc<dyn HistoryStore>,
    renderer: IncrementalRenderer,
}

impl StreamController {
    pub fn new(
        provider: Arc<dyn GenerateProvider>,
        view: Arc<dyn OutputView>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            provider,
            slot: Arc::new(AbortSlot::new()),
            view,
            history,
            renderer: IncrementalRenderer::default(),
        }
    }

    #[cfg(test)]
    pub fn slot(&self) -> &Arc<AbortSlot> {
        &self.slot
    }

    /// Stop the current run, keeping its partial output. Returns whether a
    /// run was in flight.
    pub fn stop(&self) -> bool {
        self.slot.abort_current()
    }

    /// Make a new run current, cancelling the previous one
    ///
    /// This happens synchronously, so the order of `start` calls is the order
    /// in which runs supersede each other, however the tasks driving them
    /// get scheduled.
    pub fn start(&self) -> AbortHandle {
        self.slot.replace()
    }

    pub async fn run(&self, request: TranslateRequest) -> StreamOutcome {
        let handle = self.start();
        self.run_with(handle, request).await
    }

    /// Claim the slot now and drive the run on a new task
    pub fn spawn(self: &Arc<Self>, request: TranslateRequest) -> JoinHandle<StreamOutcome> {
        let handle = self.start();
        let controller = self.clone();
        tokio::spawn(async move { controller.run_with(handle, request).await })
    }

    /// Drive a run whose handle came from [`StreamController::start`]
    pub async fn run_with(&self, handle: AbortHandle, request: TranslateRequest) -> StreamOutcome {
        let id = handle.id();
        info!("Request {id}: translating with model {}", request.model);

        let outcome = self.drive(&handle, &request).await;
        match &outcome {
            StreamOutcome::Completed(_) => info!("Request {id} completed"),
            StreamOutcome::Cancelled { partial } => {
                info!("Request {id} cancelled after {} bytes", partial.len())
            }
            StreamOutcome::Failed { detail, .. } => warn!("Request {id} failed: {detail}"),
        }

        self.slot.release(id);
        outcome
    }

    async fn drive(&self, handle: &AbortHandle, request: &TranslateRequest) -> StreamOutcome {
        let id = handle.id();
        let token = handle.token();
        let mut run = RunState {
            id,
            state: StreamState::Idle,
        };

        self.slot.with_current(id, true, || {
            self.view.begin(&request.input, &request.model);
            self.view.set_status(&Status::Requesting);
        });
        run.advance(StreamState::Requesting);

        let generate = request.to_generate_request();
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.provider.open_generate(&generate) => Some(result),
        };
        let mut stream = match opened {
            None => return self.cancelled(handle, &mut run, String::new()),
            Some(Err(e)) => return self.failed(handle, &mut run, describe(&e), String::new()),
            Some(Ok(stream)) => stream,
        };

        run.advance(StreamState::Streaming);
        self.slot
            .with_current(id, true, || self.view.set_status(&Status::Streaming));

        let mut handler = OllamaStreamHandler::new();
        let mut buffer = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return self.cancelled(handle, &mut run, buffer),
                next = stream.next_chunk() => next,
            };

            match next {
                Ok(Some(chunk)) => {
                    trace!("Request {id}: chunk of {} bytes", chunk.len());
                    let deltas = handler.process_chunk(&chunk);
                    self.apply_deltas(id, &mut buffer, deltas);
                }
                Ok(None) => {
                    let deltas = handler.finish();
                    self.apply_deltas(id, &mut buffer, deltas);
                    break;
                }
                Err(e) => {
                    let deltas = handler.finish();
                    self.apply_deltas(id, &mut buffer, deltas);
                    return self.failed(handle, &mut run, format!("{e:#}"), buffer);
                }
            }
        }

        if handler.parse_failures() > 0 {
            warn!(
                "Request {id}: skipped {} malformed records",
                handler.parse_failures()
            );
        }

        let finalizer = Finalizer {
            renderer: &self.renderer,
            view: self.view.as_ref(),
            history: self.history.as_ref(),
        };
        let final_data = handler.final_data();
        // Finalizing under the slot lock keeps a newer run from starting in between
        let finalized = self.slot.with_current(id, true, || {
            finalizer.finalize(&request.input, &request.model, &buffer, final_data)
        });

        match finalized {
            Some(finalized) => {
                run.advance(StreamState::Completed);
                StreamOutcome::Completed(finalized)
            }
            None => self.cancelled(handle, &mut run, buffer),
        }
    }

    /// Append each delta and re-render the whole buffer after it
    fn apply_deltas(&self, id: u64, buffer: &mut String, deltas: Vec<String>) {
        for delta in deltas {
            buffer.push_str(&delta);
            let frame = self.renderer.render(buffer);
            self.slot
                .with_current(id, true, || self.view.replace_output(&frame));
        }
    }

    fn cancelled(&self, handle: &AbortHandle, run: &mut RunState, partial: String) -> StreamOutcome {
        run.advance(StreamState::Cancelled);
        if self.slot.is_current(handle.id()) {
            debug!("Request {}: stopped by the user", handle.id());
        } else {
            debug!("Request {}: superseded by a newer request", handle.id());
        }
        // A superseded run no longer owns the slot and leaves the view alone
        self.slot
            .with_current(handle.id(), false, || self.view.set_status(&Status::Stopped));
        StreamOutcome::Cancelled { partial }
    }

    fn failed(
        &self,
        handle: &AbortHandle,
        run: &mut RunState,
        detail: String,
        partial: String,
    ) -> StreamOutcome {
        if handle.is_aborted() {
            return self.cancelled(handle, run, partial);
        }
        run.advance(StreamState::Failed);
        self.slot.with_current(handle.id(), true, || {
            self.view.set_status(&Status::Failed(detail.clone()))
        });
        StreamOutcome::Failed { detail, partial }
    }
}

fn describe(error: &ApiError) -> String {
    match error {
        ApiError::Status { status, body } if body.trim().is_empty() => {
            format!("HTTP {status}")
        }
        ApiError::Status { status, body } => format!("HTTP {status}: {}", body.trim()),
        other => other.to_string(),
    }
}
