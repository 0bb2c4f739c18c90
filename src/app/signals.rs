use super::{StopHandle, StopReason};
use tokio::signal;
use tracing::{error, info};

/// Turn SIGTERM and SIGINT into administrative stop requests
pub fn install_signal_handlers(stop: StopHandle) {
    // Handle SIGTERM (orchestrator stop) - Unix only
    #[cfg(unix)]
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    if sigterm.recv().await.is_some() {
                        info!("Received SIGTERM signal");
                        stop.request_stop(StopReason::Signal("SIGTERM".to_string()));
                    }
                }
                Err(e) => error!("Failed to register SIGTERM handler: {}", e),
            }
        });
    }

    // Handle SIGINT (Ctrl+C) - Cross-platform
    tokio::spawn(async move {
        if let Ok(()) = signal::ctrl_c().await {
            info!("Received SIGINT signal (Ctrl+C)");
            stop.request_stop(StopReason::Signal("SIGINT".to_string()));
        }
    });
}
