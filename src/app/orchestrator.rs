use super::signals::install_signal_handlers;
use super::supervisor::ShutdownSupervisor;
use super::types::{ShutdownOutcome, StopHandle, StopRequests};
use crate::api::ApiRoutes;
use crate::cluster::WorkerHandle;
use crate::config::AppConfig;
use crate::core::ShutdownGate;
use crate::error::Result;
use crate::fault::{FaultDomain, FaultReceiver};
use crate::pipeline::RequestPipeline;
use crate::server::ApiServer;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const API_DOMAIN: &str = "api";

/// Wires the gate, fault domain, pipeline, server and supervisor together
pub struct Application {
    config: AppConfig,
    gate: ShutdownGate,
    pipeline: Arc<RequestPipeline>,
    worker: Arc<WorkerHandle>,
    faults: FaultReceiver,
    stop_handle: StopHandle,
    stop_requests: StopRequests,
}

impl Application {
    /// Create an application serving `routes`, registered with the
    /// orchestrator selected by the cluster configuration
    pub fn new(config: AppConfig, routes: ApiRoutes) -> Result<Self> {
        let worker = Arc::new(WorkerHandle::from_config(&config.cluster)?);
        Self::with_worker(config, routes, worker)
    }

    pub fn with_worker(
        config: AppConfig,
        routes: ApiRoutes,
        worker: Arc<WorkerHandle>,
    ) -> Result<Self> {
        routes.check()?;

        let gate = ShutdownGate::new();
        let (domain, faults) = FaultDomain::new(API_DOMAIN);
        let pipeline = Arc::new(RequestPipeline::new(routes, domain, gate.clone()));
        let (stop_handle, stop_requests) = StopHandle::channel();

        Ok(Self {
            config,
            gate,
            pipeline,
            worker,
            faults,
            stop_handle,
            stop_requests,
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    pub fn gate(&self) -> &ShutdownGate {
        &self.gate
    }

    /// Bind the listener and start serving. Shutdown is not driven until
    /// [`RunningApplication::wait`] is awaited.
    pub async fn start(self) -> Result<RunningApplication> {
        let server = ApiServer::new(
            self.config.server.clone(),
            Arc::clone(&self.pipeline),
            Arc::clone(&self.worker),
        );
        let bound = server.bind().await?;
        let local_addr = bound.local_addr();
        let listener = bound.spawn();

        let supervisor = ShutdownSupervisor::builder()
            .gate(self.gate)
            .faults(self.faults)
            .stop_requests(self.stop_requests)
            .worker(Arc::clone(&self.worker))
            .listener(listener)
            .grace_period(self.config.shutdown.grace_period())
            .build()?;

        info!(
            worker = %self.worker.describe(),
            grace_period_ms = self.config.shutdown.grace_period_ms,
            "Meadowlark worker started on {}",
            local_addr
        );

        Ok(RunningApplication {
            local_addr,
            stop_handle: self.stop_handle,
            supervisor,
        })
    }

    /// Serve until a fault or stop signal ends the process lifecycle
    pub async fn run(self) -> Result<ShutdownOutcome> {
        let running = self.start().await?;
        install_signal_handlers(running.stop_handle());
        Ok(running.wait().await)
    }
}

/// A started application whose shutdown has not yet completed
pub struct RunningApplication {
    local_addr: SocketAddr,
    stop_handle: StopHandle,
    supervisor: ShutdownSupervisor,
}

impl RunningApplication {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    /// Drive the shutdown sequence to its end
    pub async fn wait(self) -> ShutdownOutcome {
        let outcome = self.supervisor.run().await;
        info!(
            exit_code = outcome.exit_code,
            path = ?outcome.path,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Shutdown complete"
        );
        outcome
    }
}
