use crate::cluster::DeregisterOutcome;
use crate::fault::Fault;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;

/// Why an administrative stop was requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Signal(String),
    UserRequest,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Signal(name) => write!(f, "signal {}", name),
            StopReason::UserRequest => write!(f, "user request"),
        }
    }
}

/// What started the shutdown sequence
#[derive(Debug, Clone)]
pub enum ShutdownTrigger {
    Fault(Fault),
    Stop(StopReason),
}

impl ShutdownTrigger {
    pub fn is_fault(&self) -> bool {
        matches!(self, ShutdownTrigger::Fault(_))
    }

    /// Non-zero whenever a fault started the sequence
    pub fn exit_code(&self) -> i32 {
        if self.is_fault() {
            1
        } else {
            0
        }
    }
}

/// How `DRAINING` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPath {
    /// Every in-flight request finished and the listener closed in time
    Graceful,
    /// The grace period ran out first
    Forced,
}

/// Result of a completed shutdown sequence
#[derive(Debug, Clone)]
pub struct ShutdownOutcome {
    pub trigger: ShutdownTrigger,
    pub path: ExitPath,
    pub exit_code: i32,
    pub deregistration: DeregisterOutcome,
    /// Faults and stop requests that arrived after the sequence began
    pub ignored_notifications: usize,
    pub elapsed: Duration,
}

/// Requests an administrative stop
#[derive(Debug, Clone)]
pub struct StopHandle {
    sender: mpsc::UnboundedSender<StopReason>,
}

/// Receiving side of [`StopHandle`], consumed by the supervisor
#[derive(Debug)]
pub struct StopRequests {
    receiver: mpsc::UnboundedReceiver<StopReason>,
}

impl StopHandle {
    pub fn channel() -> (StopHandle, StopRequests) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (StopHandle { sender }, StopRequests { receiver })
    }

    /// Returns false if the supervisor is no longer listening
    pub fn request_stop(&self, reason: StopReason) -> bool {
        self.sender.send(reason).is_ok()
    }
}

impl StopRequests {
    pub async fn recv(&mut self) -> Option<StopReason> {
        self.receiver.recv().await
    }
}
