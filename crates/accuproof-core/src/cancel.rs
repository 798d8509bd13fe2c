use crate::error::AccProofError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Caller-supplied cancellation context (spec.md §5). Cheap to clone —
/// all clones observe the same underlying flag.
#[derive(Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Check the flag, returning `Err(AccProofError::Cancelled)` if set.
    /// Call before each RPC and at each outer loop boundary, per spec.md §5.
    pub fn check(&self) -> Result<(), AccProofError> {
        if self.is_cancelled() {
            Err(AccProofError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        let c = Cancellation::new();
        assert!(c.check().is_ok());
    }

    #[test]
    fn cancel_propagates_to_clones() {
        let c = Cancellation::new();
        let clone = c.clone();
        c.cancel();
        assert!(clone.check().is_err());
    }
}
