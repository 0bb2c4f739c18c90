use super::WorkerRegistration;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behaviour {
    Succeed,
    Fail,
    Hang,
}

/// Registration double that counts deregistration attempts
#[derive(Debug, Clone)]
pub(crate) struct RecordingRegistration {
    calls: Arc<AtomicUsize>,
    behaviour: Behaviour,
}

impl RecordingRegistration {
    pub(crate) fn new(behaviour: Behaviour) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            behaviour,
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkerRegistration for RecordingRegistration {
    fn describe(&self) -> String {
        format!("recording ({:?})", self.behaviour)
    }

    async fn deregister(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Succeed => Ok(()),
            Behaviour::Fail => Err(AppError::cluster("orchestrator unreachable")),
            Behaviour::Hang => std::future::pending().await,
        }
    }
}
