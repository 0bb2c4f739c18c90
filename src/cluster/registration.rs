use crate::config::{ClusterConfig, ClusterMode};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Channel to the orchestrator that routes work to this process
#[async_trait]
pub trait WorkerRegistration: Send + Sync {
    fn describe(&self) -> String;

    /// Tell the orchestrator to stop sending work here
    async fn deregister(&self) -> Result<()>;
}

/// Worker running without an orchestrator
#[derive(Debug, Default)]
pub struct StandaloneWorker;

#[async_trait]
impl WorkerRegistration for StandaloneWorker {
    fn describe(&self) -> String {
        "standalone".to_string()
    }

    async fn deregister(&self) -> Result<()> {
        debug!("Standalone worker has no orchestrator to notify");
        Ok(())
    }
}

/// Worker spawned by a supervising parent process.
///
/// Deregistration sends `SIGUSR2` to the parent, which is expected to stop
/// routing connections here and spawn a replacement.
#[cfg(unix)]
#[derive(Debug)]
pub struct ParentSignalWorker {
    parent_pid: libc::pid_t,
}

#[cfg(unix)]
impl ParentSignalWorker {
    pub fn new() -> Self {
        // A pid that does not fit is treated like a lost parent
        let parent_pid = libc::pid_t::try_from(std::os::unix::process::parent_id()).unwrap_or(0);
        Self::with_parent(parent_pid)
    }

    pub fn with_parent(parent_pid: libc::pid_t) -> Self {
        Self { parent_pid }
    }

    pub fn parent_pid(&self) -> libc::pid_t {
        self.parent_pid
    }
}

#[cfg(unix)]
impl Default for ParentSignalWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
#[async_trait]
impl WorkerRegistration for ParentSignalWorker {
    fn describe(&self) -> String {
        format!("parent process {}", self.parent_pid)
    }

    async fn deregister(&self) -> Result<()> {
        // Re-parented to init: whoever spawned us is gone
        if self.parent_pid <= 1 {
            return Err(AppError::cluster(format!(
                "orchestrator unreachable (parent pid {})",
                self.parent_pid
            )));
        }

        // SAFETY: kill only reads its integer arguments
        let rc = unsafe { libc::kill(self.parent_pid, libc::SIGUSR2) };
        if rc != 0 {
            return Err(AppError::cluster(format!(
                "failed to signal parent {}: {}",
                self.parent_pid,
                std::io::Error::last_os_error()
            )));
        }

        Ok(())
    }
}

/// Membership state of this worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Connected,
    Disconnected,
}

/// What happened when deregistration was requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeregisterOutcome {
    Deregistered,
    AlreadyDisconnected,
    Failed(String),
    TimedOut,
}

/// This process's cluster membership.
///
/// `CONNECTED -> DISCONNECTED` happens once. The orchestrator is notified
/// on a best-effort basis: failures and timeouts are logged and the worker
/// counts as disconnected regardless.
pub struct WorkerHandle {
    registration: Arc<dyn WorkerRegistration>,
    connected: AtomicBool,
}

impl WorkerHandle {
    pub fn new(registration: Arc<dyn WorkerRegistration>) -> Self {
        Self {
            registration,
            connected: AtomicBool::new(true),
        }
    }

    pub fn from_config(config: &ClusterConfig) -> Result<Self> {
        let registration: Arc<dyn WorkerRegistration> = match config.mode {
            ClusterMode::Standalone => Arc::new(StandaloneWorker),
            #[cfg(unix)]
            ClusterMode::ParentSignal => Arc::new(ParentSignalWorker::new()),
            #[cfg(not(unix))]
            ClusterMode::ParentSignal => {
                return Err(AppError::cluster(
                    "parent_signal mode is only supported on unix",
                ))
            }
        };

        info!("Cluster registration: {}", registration.describe());
        Ok(Self::new(registration))
    }

    pub fn state(&self) -> WorkerState {
        if self.connected.load(Ordering::SeqCst) {
            WorkerState::Connected
        } else {
            WorkerState::Disconnected
        }
    }

    pub fn describe(&self) -> String {
        self.registration.describe()
    }

    /// Deregister from the orchestrator, waiting at most `timeout`
    pub async fn deregister(&self, timeout: Duration) -> DeregisterOutcome {
        if !self.connected.swap(false, Ordering::SeqCst) {
            debug!("Worker already deregistered");
            return DeregisterOutcome::AlreadyDisconnected;
        }

        info!("Deregistering worker from {}", self.registration.describe());

        match tokio::time::timeout(timeout, self.registration.deregister()).await {
            Ok(Ok(())) => {
                info!("Worker deregistered");
                DeregisterOutcome::Deregistered
            }
            Ok(Err(e)) => {
                warn!("Worker deregistration failed, continuing shutdown: {}", e);
                DeregisterOutcome::Failed(e.to_string())
            }
            Err(_) => {
                warn!(
                    "Worker deregistration timed out after {:?}, continuing shutdown",
                    timeout
                );
                DeregisterOutcome::TimedOut
            }
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("registration", &self.registration.describe())
            .field("state", &self.state())
            .finish()
    }
}
