use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

/// Process-wide shutdown phase. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownState {
    Running,
    Draining,
    Terminating,
}

impl fmt::Display for ShutdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownState::Running => write!(f, "running"),
            ShutdownState::Draining => write!(f, "draining"),
            ShutdownState::Terminating => write!(f, "terminating"),
        }
    }
}

#[derive(Debug)]
struct GateState {
    phase: ShutdownState,
    in_flight: usize,
}

#[derive(Debug)]
struct GateInner {
    state: Mutex<GateState>,
    drained: Notify,
}

/// Admission gate shared by the request pipeline and the shutdown supervisor.
///
/// The shutdown phase and the in-flight counter live under one lock, so a
/// request is either admitted before draining starts (and counted) or
/// refused; the supervisor never observes a count that misses an admitted
/// request.
#[derive(Debug, Clone)]
pub struct ShutdownGate {
    inner: Arc<GateInner>,
}

impl ShutdownGate {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                state: Mutex::new(GateState {
                    phase: ShutdownState::Running,
                    in_flight: 0,
                }),
                drained: Notify::new(),
            }),
        }
    }

    /// Admit a new request. Refused with the current phase once draining began.
    pub fn try_enter(&self) -> std::result::Result<InFlightGuard, ShutdownState> {
        let mut state = self.inner.state.lock();
        if state.phase != ShutdownState::Running {
            return Err(state.phase);
        }
        state.in_flight += 1;
        Ok(InFlightGuard {
            inner: Arc::clone(&self.inner),
        })
    }

    pub fn state(&self) -> ShutdownState {
        self.inner.state.lock().phase
    }

    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight
    }

    /// Snapshot of phase and counter taken under the same lock
    pub fn snapshot(&self) -> (ShutdownState, usize) {
        let state = self.inner.state.lock();
        (state.phase, state.in_flight)
    }

    /// `RUNNING -> DRAINING`. Returns false if the gate had already left `RUNNING`.
    pub(crate) fn begin_draining(&self) -> bool {
        self.advance(ShutdownState::Running, ShutdownState::Draining)
    }

    /// `DRAINING -> TERMINATING`. Returns false from any other phase.
    pub(crate) fn terminate(&self) -> bool {
        self.advance(ShutdownState::Draining, ShutdownState::Terminating)
    }

    fn advance(&self, from: ShutdownState, to: ShutdownState) -> bool {
        let mut state = self.inner.state.lock();
        if state.phase != from {
            return false;
        }
        state.phase = to;
        debug!(
            from = %from,
            to = %to,
            in_flight = state.in_flight,
            "Shutdown state changed"
        );
        true
    }

    /// Resolves once no admitted request or continuation is outstanding.
    pub async fn drained(&self) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.state.lock().in_flight == 0 {
                return;
            }

            notified.await;
        }
    }
}

impl Default for ShutdownGate {
    fn default() -> Self {
        Self::new()
    }
}

/// One slot of the in-flight counter, released on drop.
///
/// Cloning takes another slot unconditionally: clones belong to work that was
/// already admitted, such as a detached continuation of the same request.
#[derive(Debug)]
pub struct InFlightGuard {
    inner: Arc<GateInner>,
}

impl Clone for InFlightGuard {
    fn clone(&self) -> Self {
        self.inner.state.lock().in_flight += 1;
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let drained = {
            let mut state = self.inner.state.lock();
            state.in_flight -= 1;
            state.in_flight == 0
        };

        if drained {
            self.inner.drained.notify_waiters();
        }
    }
}
