//! Router state and in-flight connection tracking for graceful drain.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{sync::Notify, time::Instant};
use tracing::{info, warn};

/// Router lifecycle: `Listening` → `Draining` → `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RouterState {
    Listening = 0,
    Draining = 1,
    Stopped = 2,
}

impl RouterState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RouterState::Listening,
            1 => RouterState::Draining,
            _ => RouterState::Stopped,
        }
    }
}

/// Result of draining in-flight connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainResult {
    /// Every connection finished before the deadline
    Complete,
    /// The deadline passed with connections still open
    Timeout { remaining: usize },
}

#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
    active: AtomicUsize,
    idle: Notify,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(RouterState::Listening as u8),
            active: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }
}

impl Lifecycle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> RouterState {
        RouterState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Count a new connection. Returns `None` once draining has begun.
    pub fn track_connection(self: &Arc<Self>) -> Option<ConnectionGuard> {
        if self.state() != RouterState::Listening {
            return None;
        }
        self.active.fetch_add(1, Ordering::SeqCst);
        Some(ConnectionGuard {
            lifecycle: Arc::clone(self),
        })
    }

    pub fn begin_drain(&self) {
        let _ = self.state.compare_exchange(
            RouterState::Listening as u8,
            RouterState::Draining as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn mark_stopped(&self) {
        self.state.store(RouterState::Stopped as u8, Ordering::SeqCst);
    }

    /// Wait for every tracked connection to finish, bounded by `timeout`.
    pub async fn drain(&self, timeout: Duration) -> DrainResult {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before reading the counter so a release in between is not missed.
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let active = self.active_connections();
            if active == 0 {
                info!("all connections drained");
                return DrainResult::Complete;
            }
            info!(active_connections = active, "draining connections");

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let remaining = self.active_connections();
                if remaining == 0 {
                    return DrainResult::Complete;
                }
                warn!(active_connections = remaining, "drain timeout exceeded");
                return DrainResult::Timeout { remaining };
            }
        }
    }
}

/// Keeps a connection counted until dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    lifecycle: Arc<Lifecycle>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.lifecycle.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.lifecycle.idle.notify_waiters();
        }
    }
}
