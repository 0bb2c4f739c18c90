use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Where inside a request's lifetime a fault surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOrigin {
    /// The handler future panicked while being polled
    Handler,
    /// A continuation spawned through the request context panicked
    Continuation,
    /// The handler escalated explicitly through its context
    Reported,
    /// The dispatch task itself failed outside the handler
    Dispatch,
}

impl fmt::Display for FaultOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultOrigin::Handler => write!(f, "handler"),
            FaultOrigin::Continuation => write!(f, "continuation"),
            FaultOrigin::Reported => write!(f, "reported"),
            FaultOrigin::Dispatch => write!(f, "dispatch"),
        }
    }
}

/// Notification emitted once for every failure caught by a fault domain
#[derive(Debug, Clone)]
pub struct Fault {
    pub id: Uuid,
    pub domain: String,
    pub request_id: Option<Uuid>,
    /// Method and path of the originating request, when known
    pub request: Option<String>,
    pub origin: FaultOrigin,
    pub message: String,
    pub observed_at: DateTime<Utc>,
}

impl Fault {
    pub fn description(&self) -> String {
        match &self.request {
            Some(request) => format!(
                "{} fault in {} ({}): {}",
                self.origin, self.domain, request, self.message
            ),
            None => format!("{} fault in {}: {}", self.origin, self.domain, self.message),
        }
    }
}

/// Receiving end of a fault domain's notification channel
#[derive(Debug)]
pub struct FaultReceiver {
    receiver: mpsc::UnboundedReceiver<Fault>,
}

impl FaultReceiver {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<Fault>) -> Self {
        Self { receiver }
    }

    /// Wait for the next fault. `None` once every domain handle is gone.
    pub async fn recv(&mut self) -> Option<Fault> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Fault> {
        self.receiver.try_recv().ok()
    }
}
