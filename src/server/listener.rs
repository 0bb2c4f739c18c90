use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Control over the listening socket of a running server
#[derive(Debug)]
pub struct ListenerHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn new(token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self {
            token,
            task: Some(task),
        }
    }

    /// A handle with no server behind it
    pub fn detached() -> Self {
        Self {
            token: CancellationToken::new(),
            task: None,
        }
    }

    /// Stop accepting connections. Open connections are allowed to finish.
    pub fn close(&self) {
        if !self.token.is_cancelled() {
            info!("Closing API listener");
            self.token.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait until the server has released the socket and its last connection
    pub async fn wait_closed(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
            self.task = None;
        }
    }
}
