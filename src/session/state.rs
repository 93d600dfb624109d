use std::fmt;

/// Lifecycle of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl StreamState {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Cancelled | StreamState::Failed
        )
    }

    pub fn can_transition_to(self, next: StreamState) -> bool {
        use StreamState::*;
        matches!(
            (self, next),
            (Idle, Requesting)
                | (Requesting, Streaming)
                | (Requesting, Cancelled)
                | (Requesting, Failed)
                | (Streaming, Completed)
                | (Streaming, Cancelled)
                | (Streaming, Failed)
        )
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamState::Idle => "idle",
            StreamState::Requesting => "requesting",
            StreamState::Streaming => "streaming",
            StreamState::Completed => "completed",
            StreamState::Cancelled => "cancelled",
            StreamState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::StreamState::*;
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        assert!(Idle.can_transition_to(Requesting));
        assert!(Requesting.can_transition_to(Streaming));
        assert!(Requesting.can_transition_to(Cancelled));
        assert!(Requesting.can_transition_to(Failed));
        assert!(Streaming.can_transition_to(Completed));
        assert!(Streaming.can_transition_to(Cancelled));
        assert!(Streaming.can_transition_to(Failed));
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!Idle.can_transition_to(Streaming));
        assert!(!Requesting.can_transition_to(Completed));
        for finished in [Completed, Cancelled, Failed] {
            assert!(finished.is_finished());
            for next in [Idle, Requesting, Streaming, Completed, Cancelled, Failed] {
                assert!(!finished.can_transition_to(next));
            }
        }
    }
}
