use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancellation capability of one in-flight request
#[derive(Debug, Clone)]
pub struct AbortHandle {
    id: u64,
    token: CancellationToken,
}

impl AbortHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// The single "current request" slot
///
/// At most one handle is current. Replacing it cancels the previous one, and
/// every check-then-act on the slot happens under its lock, so a run that
/// lost the slot can never touch shared output afterwards.
#[derive(Debug, Default)]
pub struct AbortSlot {
    current: Mutex<Option<AbortHandle>>,
    next_id: AtomicU64,
}

impl AbortSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cancel the current handle, if any, and install a fresh one
    pub fn replace(&self) -> AbortHandle {
        let handle = AbortHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            token: CancellationToken::new(),
        };

        let mut current = self.lock();
        if let Some(previous) = current.take() {
            debug!("Request {} superseded by {}", previous.id, handle.id);
            previous.abort();
        }
        *current = Some(handle.clone());
        handle
    }

    /// User stop: cancel the current handle but leave it in place, so the
    /// stopped run can still annotate its own output. Returns whether
    /// anything was running.
    pub fn abort_current(&self) -> bool {
        match self.lock().as_ref() {
            Some(handle) if !handle.is_aborted() => {
                debug!("Stopping request {}", handle.id);
                handle.abort();
                true
            }
            _ => false,
        }
    }

    /// Clear the slot if `id` still owns it
    pub fn release(&self, id: u64) {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|handle| handle.id == id) {
            *current = None;
        }
    }

    pub fn is_current(&self, id: u64) -> bool {
        self.lock().as_ref().is_some_and(|handle| handle.id == id)
    }

    #[cfg(test)]
    pub fn current_id(&self) -> Option<u64> {
        self.lock().as_ref().map(AbortHandle::id)
    }

    /// Run `action` only while `id` owns the slot. With `require_live` the
    /// handle must also not be aborted. The slot stays locked while `action`
    /// runs.
    pub fn with_current<R>(
        &self,
        id: u64,
        require_live: bool,
        action: impl FnOnce() -> R,
    ) -> Option<R> {
        let current = self.lock();
        match current.as_ref() {
            Some(handle) if handle.id == id && !(require_live && handle.is_aborted()) => {
                Some(action())
            }
            _ => None,
        }
    }
}
