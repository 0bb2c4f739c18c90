use super::timer::ForcedExitTimer;
use super::types::{ExitPath, ShutdownOutcome, ShutdownTrigger, StopReason, StopRequests};
use crate::cluster::WorkerHandle;
use crate::core::ShutdownGate;
use crate::error::{AppError, Result};
use crate::fault::FaultReceiver;
use crate::server::ListenerHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Upper bound on how long the orchestrator gets to acknowledge deregistration
const DEREGISTER_TIMEOUT: Duration = Duration::from_secs(1);

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(5000);

/// Drives the process through `RUNNING -> DRAINING -> TERMINATING`.
///
/// The first fault notification or stop request starts the sequence:
/// the gate closes to new requests, the forced-exit timer is armed, the
/// worker deregisters and the listener closes. The sequence ends when the
/// last in-flight request completes and the listener has shut down, or when
/// the timer fires, whichever comes first. Later notifications are counted
/// and otherwise ignored.
pub struct ShutdownSupervisor {
    gate: ShutdownGate,
    faults: FaultReceiver,
    stop_requests: StopRequests,
    worker: Arc<WorkerHandle>,
    listener: ListenerHandle,
    grace_period: Duration,
}

impl ShutdownSupervisor {
    pub fn builder() -> ShutdownSupervisorBuilder {
        ShutdownSupervisorBuilder::new()
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Wait for a trigger and run the shutdown sequence to completion
    pub async fn run(mut self) -> ShutdownOutcome {
        let trigger = self.wait_for_trigger().await;
        self.shut_down(trigger).await
    }

    async fn wait_for_trigger(&mut self) -> ShutdownTrigger {
        tokio::select! {
            Some(fault) = self.faults.recv() => ShutdownTrigger::Fault(fault),
            Some(reason) = self.stop_requests.recv() => ShutdownTrigger::Stop(reason),
            else => {
                warn!("All shutdown triggers are gone, stopping");
                ShutdownTrigger::Stop(StopReason::UserRequest)
            }
        }
    }

    async fn shut_down(mut self, trigger: ShutdownTrigger) -> ShutdownOutcome {
        match &trigger {
            ShutdownTrigger::Fault(fault) => {
                error!("Server shutting down after API domain error: {}", fault.description())
            }
            ShutdownTrigger::Stop(reason) => info!("Shutdown requested: {}", reason),
        }

        let started = Instant::now();
        if !self.gate.begin_draining() {
            warn!("Gate had already left running state");
        }

        let mut timer = ForcedExitTimer::arm(self.grace_period);
        info!(
            grace_period_ms = self.grace_period.as_millis() as u64,
            in_flight = self.gate.in_flight(),
            "Draining: refusing new API requests"
        );

        let deregistration = self
            .worker
            .deregister(DEREGISTER_TIMEOUT.min(timer.remaining()))
            .await;

        self.listener.close();

        let mut ignored_notifications = 0;
        let path = loop {
            tokio::select! {
                biased;

                _ = drain_and_close(&self.gate, &mut self.listener) => {
                    timer.cancel();
                    break ExitPath::Graceful;
                }
                _ = timer.expired() => break ExitPath::Forced,
                Some(fault) = self.faults.recv() => {
                    ignored_notifications += 1;
                    warn!("Fault during shutdown, already terminating: {}", fault.description());
                }
                Some(reason) = self.stop_requests.recv() => {
                    ignored_notifications += 1;
                    debug!("Stop request ({}) ignored, shutdown already in progress", reason);
                }
            }
        };

        self.gate.terminate();
        self.listener.close();

        match path {
            ExitPath::Graceful => info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "All in-flight requests completed"
            ),
            ExitPath::Forced => error!(
                in_flight = self.gate.in_flight(),
                "Grace period of {:?} elapsed, forcing exit", self.grace_period
            ),
        }

        ShutdownOutcome {
            exit_code: trigger.exit_code(),
            trigger,
            path,
            deregistration,
            ignored_notifications,
            elapsed: started.elapsed(),
        }
    }
}

async fn drain_and_close(gate: &ShutdownGate, listener: &mut ListenerHandle) {
    gate.drained().await;
    listener.wait_closed().await;
}

/// Builder for [`ShutdownSupervisor`]
pub struct ShutdownSupervisorBuilder {
    gate: Option<ShutdownGate>,
    faults: Option<FaultReceiver>,
    stop_requests: Option<StopRequests>,
    worker: Option<Arc<WorkerHandle>>,
    listener: Option<ListenerHandle>,
    grace_period: Duration,
}

impl ShutdownSupervisorBuilder {
    pub fn new() -> Self {
        Self {
            gate: None,
            faults: None,
            stop_requests: None,
            worker: None,
            listener: None,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn gate(mut self, gate: ShutdownGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn faults(mut self, faults: FaultReceiver) -> Self {
        self.faults = Some(faults);
        self
    }

    pub fn stop_requests(mut self, stop_requests: StopRequests) -> Self {
        self.stop_requests = Some(stop_requests);
        self
    }

    pub fn worker(mut self, worker: Arc<WorkerHandle>) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn listener(mut self, listener: ListenerHandle) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn build(self) -> Result<ShutdownSupervisor> {
        let gate = self
            .gate
            .ok_or_else(|| AppError::component("supervisor", "Shutdown gate is required"))?;

        let faults = self
            .faults
            .ok_or_else(|| AppError::component("supervisor", "Fault receiver is required"))?;

        let stop_requests = self
            .stop_requests
            .ok_or_else(|| AppError::component("supervisor", "Stop requests are required"))?;

        let worker = self
            .worker
            .ok_or_else(|| AppError::component("supervisor", "Worker handle is required"))?;

        if self.grace_period.is_zero() {
            return Err(AppError::component(
                "supervisor",
                "Grace period must be greater than 0",
            ));
        }

        Ok(ShutdownSupervisor {
            gate,
            faults,
            stop_requests,
            worker,
            listener: self.listener.unwrap_or_else(ListenerHandle::detached),
            grace_period: self.grace_period,
        })
    }
}

impl Default for ShutdownSupervisorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
