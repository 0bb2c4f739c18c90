use super::domain::{panic_message, FaultDomain};
use super::notice::FaultOrigin;
use crate::core::InFlightGuard;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug)]
pub(crate) struct RequestScope {
    pub(crate) request_id: Uuid,
    pub(crate) label: String,
    faulted: AtomicBool,
}

impl RequestScope {
    pub(crate) fn new(request_id: Uuid, label: String) -> Self {
        Self {
            request_id,
            label,
            faulted: AtomicBool::new(false),
        }
    }

    pub(crate) fn mark_faulted(&self) {
        self.faulted.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::SeqCst)
    }
}

/// Handle given to every API handler, tying later work to its request.
///
/// Each clone holds an in-flight slot, so draining waits for it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    domain: FaultDomain,
    scope: Arc<RequestScope>,
    guard: InFlightGuard,
}

impl RequestContext {
    pub(crate) fn new(domain: FaultDomain, scope: Arc<RequestScope>, guard: InFlightGuard) -> Self {
        Self {
            domain,
            scope,
            guard,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.scope.request_id
    }

    pub fn domain(&self) -> &FaultDomain {
        &self.domain
    }

    /// Run a continuation of this request on its own task.
    ///
    /// A panic inside `future` is caught and reported as a fault of this
    /// request, whether or not the request has already been answered.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let domain = self.domain.clone();
        let scope = Arc::clone(&self.scope);
        let guard = self.guard.clone();

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(future).catch_unwind().await;
            if let Err(panic) = outcome {
                scope.mark_faulted();
                domain.record(
                    FaultOrigin::Continuation,
                    Some(&scope),
                    panic_message(panic.as_ref()),
                );
            }
            drop(guard);
        })
    }

    /// Escalate a failure the handler cannot recover from
    pub fn report_fault<S: Into<String>>(&self, message: S) {
        self.scope.mark_faulted();
        self.domain
            .record(FaultOrigin::Reported, Some(&self.scope), message.into());
    }
}
