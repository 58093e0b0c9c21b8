//! Cooperative cancellation for suspending operations.
//!
//! Every call that can suspend (permit acquisition, page I/O, fan-out
//! fetches) takes a [`CancelToken`]. Cancellation cascades from a token to
//! the children created through [`CancelToken::child`], never upward, so a
//! query-local timeout can abort its own fetches without touching the
//! caller's token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Node {
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<Node>>>,
}

impl Node {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();
        let children = {
            let mut guard = self.children.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for child in children {
            if let Some(child) = child.upgrade() {
                child.cancel();
            }
        }
    }
}

/// A cloneable cancellation handle.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    node: Arc<Node>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// A child token: cancelled when either it or this token is cancelled.
    /// Cancelling the child leaves this token untouched.
    pub fn child(&self) -> Self {
        let child = Self::new();
        {
            let mut guard = self
                .node
                .children
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            guard.push(Arc::downgrade(&child.node));
        }
        // The parent may have been cancelled concurrently with registration.
        if self.is_cancelled() {
            child.node.cancel();
        }
        child
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.node.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.node.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.node.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
