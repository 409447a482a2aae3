use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::StudioError;

/// Shared flag a caller flips to abandon an in-flight turn.
///
/// Checked before every gateway call and before every memory commit. A
/// blocking call already on the wire runs to its timeout; its result is then
/// discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), StudioError> {
        if self.is_cancelled() {
            return Err(StudioError::Cancelled);
        }
        Ok(())
    }
}
