//! Per-evaluation liveness and position information.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::Error;

#[derive(Debug, Default)]
struct CancelNode {
    cancelled: AtomicBool,
    parent: Option<Arc<CancelNode>>,
}

/// Shared cancellation flag.
///
/// Clones observe the same flag. A [`child`](CancellationToken::child) token
/// is cancelled when either it or any ancestor is cancelled, while cancelling
/// the child leaves the parent running; concurrent argument evaluation uses
/// this to stop siblings without touching the caller.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    node: Arc<CancelNode>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.node.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        let mut node = Some(&self.node);
        while let Some(current) = node {
            if current.cancelled.load(Ordering::Acquire) {
                return true;
            }
            node = current.parent.as_ref();
        }
        false
    }

    pub fn child(&self) -> CancellationToken {
        CancellationToken {
            node: Arc::new(CancelNode {
                cancelled: AtomicBool::new(false),
                parent: Some(self.node.clone()),
            }),
        }
    }
}

/// Whether the expression being evaluated is the last thing its enclosing
/// closure body does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Position {
    Tail,
    #[default]
    NonTail,
}

/// Evaluation context handed to every step: cancellation, deadline and the
/// tail-position mode of the current expression.
#[derive(Clone, Debug, Default)]
pub struct Context {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
    position: Position,
}

impl Context {
    /// Top-level context: no deadline, not cancelled, non-tail.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_tail(&self) -> bool {
        self.position == Position::Tail
    }

    /// Same context, evaluating in tail position
    #[must_use]
    pub fn tail(&self) -> Context {
        self.at(Position::Tail)
    }

    /// Same context, evaluating in non-tail position
    #[must_use]
    pub fn non_tail(&self) -> Context {
        self.at(Position::NonTail)
    }

    fn at(&self, position: Position) -> Context {
        Context {
            cancellation: self.cancellation.clone(),
            deadline: self.deadline,
            position,
        }
    }

    /// Same deadline and position with a child cancellation token.
    #[must_use]
    pub fn child(&self) -> Context {
        Context {
            cancellation: self.cancellation.child(),
            deadline: self.deadline,
            position: self.position,
        }
    }

    /// Fail with `Interrupted` once cancelled, or `Timeout` once the deadline passed.
    pub fn check(&self) -> Result<(), Error> {
        if self.cancellation.is_cancelled() {
            debug!("evaluation interrupted");
            return Err(Error::Interrupted);
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            debug!("evaluation deadline exceeded");
            return Err(Error::Timeout);
        }
        Ok(())
    }
}
