//! Cooperative cancellation for scans.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ambit_util::errors::AmbitError;

/// A cancellation token threaded through the walker, the dispatcher, and
/// every plugin call.
///
/// Cloning is cheap; all clones observe the same flag. The walker polls the
/// token between inode visits and once per extractor invocation; plugins
/// that block for long stretches are expected to poll it themselves.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` if cancellation was requested, `Ok(())` otherwise.
    pub fn check(&self) -> Result<(), AmbitError> {
        if self.is_cancelled() {
            Err(AmbitError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(token.check().is_err());
    }
}
