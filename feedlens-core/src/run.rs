//! Run generations
//!
//! A reset does not cancel in-flight calls. Instead every run holds a [`RunToken`]
//! issued by a [`RunController`]; once the controller moves on, results arriving for an
//! older token are dropped instead of merged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RunToken {
    generation: Arc<AtomicU64>,
    issued: u64,
}

impl RunToken {
    /// Token that is never superseded, for one-off runs outside a controller.
    pub fn detached() -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            issued: 0,
        }
    }

    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::Acquire) == self.issued
    }

    pub fn generation(&self) -> u64 {
        self.issued
    }
}

#[derive(Debug, Default, Clone)]
pub struct RunController {
    generation: Arc<AtomicU64>,
}

impl RunController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run, superseding any earlier one.
    pub fn begin(&self) -> RunToken {
        let issued = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        RunToken {
            generation: Arc::clone(&self.generation),
            issued,
        }
    }

    /// Abandon the current run without starting another.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_supersedes_previous() {
        let controller = RunController::new();
        let first = controller.begin();
        assert!(first.is_current());

        let second = controller.begin();
        assert!(!first.is_current());
        assert!(second.is_current());
        assert_eq!(second.generation(), 2);
    }

    #[test]
    fn test_reset_invalidates() {
        let controller = RunController::new();
        let token = controller.begin();
        controller.reset();
        assert!(!token.is_current());
        assert!(RunToken::detached().is_current());
    }
}
