//! # Cancellation
//!
//! `CancelToken` is the cooperative stop signal shared by traversal and
//! inference. A token is cancelled when:
//! - its own flag is set,
//! - its deadline has passed, or
//! - any token it was derived from is cancelled.
//!
//! The engine owns a root token; `Engine::shutdown` cancels it and every
//! child derived from it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::types::GraphError;

/// Cooperative cancellation handle. Cheap to clone; clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
    /// Flags of every ancestor, root first.
    ancestors: Vec<Arc<AtomicBool>>,
}

impl CancelToken {
    /// A fresh, uncancelled token with no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token nobody else holds. Useful where a caller has nothing to cancel.
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    /// A fresh token that expires at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::default()
        }
    }

    /// A fresh token that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A new token that is also cancelled when `self` or any of its
    /// ancestors is cancelled.
    ///
    /// The child gets its own flag and inherits the parent's deadline,
    /// tightened by `timeout` when given.
    #[must_use]
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let own = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.deadline, own) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let mut ancestors = self.ancestors.clone();
        ancestors.push(Arc::clone(&self.flag));
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline,
            ancestors,
        }
    }

    /// Set the flag. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Acquire) {
            return true;
        }
        if self.ancestors.iter().any(|a| a.load(Ordering::Acquire)) {
            return true;
        }
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// `Err(GraphError::Cancelled)` once the token is cancelled.
    pub fn check(&self) -> Result<(), GraphError> {
        if self.is_cancelled() {
            Err(GraphError::Cancelled)
        } else {
            Ok(())
        }
    }
}
