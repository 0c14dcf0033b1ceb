use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Single-resolution token for an in-flight `SetAVTransportURI`.
///
/// Resolved `true` when the renderer reports the requested URI, `false` when a
/// newer request supersedes it or the session goes away. Only the first
/// resolution counts.
#[derive(Debug, Clone, Default)]
pub struct UriConfirmation {
    inner: Arc<(Mutex<Option<bool>>, Condvar)>,
}

impl UriConfirmation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the token was already resolved.
    pub fn resolve(&self, confirmed: bool) -> bool {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if state.is_some() {
            return false;
        }
        *state = Some(confirmed);
        cvar.notify_all();
        true
    }

    /// Blocks until resolution or `timeout`; `None` means timed out.
    pub fn wait(&self, timeout: Duration) -> Option<bool> {
        let deadline = Instant::now() + timeout;
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while state.is_none() {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            state = cvar
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *state
    }
}
