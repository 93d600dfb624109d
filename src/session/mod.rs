//! Lifecycle of streaming requests: issue, cancellation, finalization

mod abort;
mod controller;
mod finalizer;
mod state;

pub use controller::{StreamController, StreamOutcome, TranslateRequest};

#[cfg(test)]
pub use finalizer::EMPTY_RESPONSE_NOTICE;
#[cfg(test)]
pub use state::StreamState;
