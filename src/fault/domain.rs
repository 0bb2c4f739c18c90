use super::context::{RequestContext, RequestScope};
use super::notice::{Fault, FaultOrigin, FaultReceiver};
use crate::api::{ApiHandler, ApiRequest, ApiResponse};
use crate::core::InFlightGuard;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

#[derive(Debug)]
struct DomainInner {
    id: Uuid,
    name: String,
    notifier: mpsc::UnboundedSender<Fault>,
    faults: AtomicU64,
}

/// Isolation boundary around API handler execution
#[derive(Debug, Clone)]
pub struct FaultDomain {
    inner: Arc<DomainInner>,
}

impl FaultDomain {
    /// Create a domain together with the receiver for its fault notifications
    pub fn new<S: Into<String>>(name: S) -> (Self, FaultReceiver) {
        let (notifier, receiver) = mpsc::unbounded_channel();
        let domain = Self {
            inner: Arc::new(DomainInner {
                id: Uuid::new_v4(),
                name: name.into(),
                notifier,
                faults: AtomicU64::new(0),
            }),
        };

        (domain, FaultReceiver::new(receiver))
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of faults caught since the domain was created
    pub fn fault_count(&self) -> u64 {
        self.inner.faults.load(Ordering::SeqCst)
    }

    /// Run `handler` for `request` inside the domain.
    ///
    /// The in-flight slot is held until the handler future completes or
    /// faults. A request whose handler panicked, or whose context reported a
    /// fault before the handler returned, gets the generic internal-error
    /// response instead of whatever the handler produced.
    pub async fn run(
        &self,
        handler: Arc<dyn ApiHandler>,
        request: ApiRequest,
        guard: InFlightGuard,
    ) -> ApiResponse {
        let scope = Arc::new(RequestScope::new(request.id, request.describe()));
        let ctx = RequestContext::new(self.clone(), Arc::clone(&scope), guard.clone());

        let outcome = AssertUnwindSafe(handler.call(request, ctx))
            .catch_unwind()
            .await;
        drop(guard);

        match outcome {
            Err(panic) => {
                scope.mark_faulted();
                self.record(FaultOrigin::Handler, Some(&scope), panic_message(panic.as_ref()));
                ApiResponse::internal_error()
            }
            Ok(_) if scope.is_faulted() => ApiResponse::internal_error(),
            Ok(Ok(body)) => ApiResponse::ok(body),
            Ok(Err(error)) => {
                debug!(
                    request_id = %scope.request_id,
                    status = %error.status,
                    "Handler declared an error for {}",
                    scope.label
                );
                ApiResponse::from(error)
            }
        }
    }

    /// Count a fault and publish it to the supervisor
    pub(crate) fn record(
        &self,
        origin: FaultOrigin,
        scope: Option<&RequestScope>,
        message: String,
    ) -> Fault {
        let total = self.inner.faults.fetch_add(1, Ordering::SeqCst) + 1;

        let fault = Fault {
            id: Uuid::new_v4(),
            domain: self.inner.name.clone(),
            request_id: scope.map(|scope| scope.request_id),
            request: scope.map(|scope| scope.label.clone()),
            origin,
            message,
            observed_at: Utc::now(),
        };

        error!(
            domain = %self.inner.name,
            fault_id = %fault.id,
            faults_observed = total,
            "API domain error: {}",
            fault.description()
        );

        if self.inner.notifier.send(fault.clone()).is_err() {
            warn!("Fault notification dropped: no supervisor is listening");
        }

        fault
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
