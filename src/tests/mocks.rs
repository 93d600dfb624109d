use crate::render::RenderedFrame;
use crate::ui::{OutputView, Status};
use anyhow::Result;
use async_trait::async_trait;
use llm::{ApiError, ChunkStream, GenerateProvider, GenerateRequest, PlaybackChunkStream};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Everything a view was asked to show, in order
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Begin { input: String, model: String },
    Output { text: String, markup: String },
    Status(Status),
    Notice(String),
}

#[derive(Default, Clone)]
pub struct RecordingView {
    events: Arc<Mutex<Vec<ViewEvent>>>,
}

impl RecordingView {
    pub fn events(&self) -> Vec<ViewEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Response texts of every output frame
    pub fn texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ViewEvent::Output { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn last_markup(&self) -> Option<String> {
        self.events().into_iter().rev().find_map(|event| match event {
            ViewEvent::Output { markup, .. } => Some(markup),
            _ => None,
        })
    }

    pub fn statuses(&self) -> Vec<Status> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ViewEvent::Status(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self) -> Option<Status> {
        self.statuses().pop()
    }

    pub fn notices(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ViewEvent::Notice(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ViewEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl OutputView for RecordingView {
    fn begin(&self, input: &str, model: &str) {
        self.push(ViewEvent::Begin {
            input: input.to_string(),
            model: model.to_string(),
        });
    }

    fn replace_output(&self, frame: &RenderedFrame) {
        self.push(ViewEvent::Output {
            text: frame.text.clone(),
            markup: frame.markup.clone(),
        });
    }

    fn set_status(&self, status: &Status) {
        self.push(ViewEvent::Status(status.clone()));
    }

    fn show_notice(&self, notice: &str) {
        self.push(ViewEvent::Notice(notice.to_string()));
    }
}

/// How the mock server answers one generate request
pub enum MockResponse {
    /// A 2xx body delivered in the given chunks, each after `delay`
    Stream { chunks: Vec<Vec<u8>>, delay: Duration },
    /// The body breaks off with a transport error after the given chunks
    BrokenStream(Vec<Vec<u8>>),
    /// A non-2xx status
    Status(u16, String),
    /// The response headers never arrive
    Hang,
}

impl MockResponse {
    pub fn body(chunks: &[&str]) -> Self {
        MockResponse::Stream {
            chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
            delay: Duration::ZERO,
        }
    }

    pub fn slow_body(chunks: &[&str], delay: Duration) -> Self {
        MockResponse::Stream {
            chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
            delay,
        }
    }
}

struct BrokenChunkStream {
    chunks: VecDeque<Vec<u8>>,
}

#[async_trait]
impl ChunkStream for BrokenChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.chunks.pop_front() {
            Some(chunk) => Ok(Some(chunk)),
            None => Err(anyhow::anyhow!("HTTP chunk error: connection reset")),
        }
    }
}

/// Answers generate requests from a script, one response per request
#[derive(Default, Clone)]
pub struct MockProvider {
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
}

impl MockProvider {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(responses.into())),
        }
    }

    pub fn get_requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerateProvider for MockProvider {
    async fn open_generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<Box<dyn ChunkStream>, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        let response = self.responses.lock().unwrap().pop_front();

        match response {
            Some(MockResponse::Stream { chunks, delay }) => {
                Ok(Box::new(PlaybackChunkStream::with_delay(chunks, delay)))
            }
            Some(MockResponse::BrokenStream(chunks)) => Ok(Box::new(BrokenChunkStream {
                chunks: chunks.into(),
            })),
            Some(MockResponse::Status(status, body)) => Err(ApiError::Status { status, body }),
            Some(MockResponse::Hang) => {
                futures::future::pending::<Result<Box<dyn ChunkStream>, ApiError>>().await
            }
            None => Err(ApiError::Unknown("No more mock responses".to_string())),
        }
    }
}
