use crate::api::{ApiRequest, ApiResponse, ApiRoutes, RouteMatch};
use crate::core::{ShutdownGate, ShutdownState};
use crate::fault::{FaultDomain, FaultOrigin};
use tracing::{debug, error, warn};

/// Dispatches API requests to their handlers inside the fault domain
pub struct RequestPipeline {
    routes: ApiRoutes,
    domain: FaultDomain,
    gate: ShutdownGate,
}

impl RequestPipeline {
    pub fn new(routes: ApiRoutes, domain: FaultDomain, gate: ShutdownGate) -> Self {
        Self {
            routes,
            domain,
            gate,
        }
    }

    pub fn gate(&self) -> &ShutdownGate {
        &self.gate
    }

    pub fn domain(&self) -> &FaultDomain {
        &self.domain
    }

    /// Handle one request, producing exactly one response.
    ///
    /// Once the gate has left `RUNNING` every new request is refused with
    /// service-unavailable and no handler runs. Admitted requests run on
    /// their own task so that a caller going away does not cancel them.
    pub async fn handle(&self, mut request: ApiRequest) -> ApiResponse {
        let guard = match self.gate.try_enter() {
            Ok(guard) => guard,
            Err(state) => {
                warn!(
                    request_id = %request.id,
                    state = %state,
                    "Refusing {} while shutting down",
                    request.describe()
                );
                return ApiResponse::unavailable();
            }
        };

        let (handler, route) = match self.routes.resolve(&request.method, &request.path) {
            RouteMatch::Found {
                handler,
                params,
                route,
            } => {
                request.params = params;
                (handler, route.to_string())
            }
            RouteMatch::MethodNotAllowed => return ApiResponse::method_not_allowed(),
            RouteMatch::NotFound => return ApiResponse::not_found(),
        };

        debug!(
            request_id = %request.id,
            route = %route,
            in_flight = self.gate.in_flight(),
            "Dispatching {}",
            request.describe()
        );

        let domain = self.domain.clone();
        let dispatch =
            tokio::spawn(async move { domain.run(handler, request, guard).await });

        match dispatch.await {
            Ok(response) => response,
            Err(e) => {
                error!("Dispatch task for {} failed: {}", route, e);
                if e.is_panic() {
                    self.domain
                        .record(FaultOrigin::Dispatch, None, format!("{}: {}", route, e));
                }
                ApiResponse::internal_error()
            }
        }
    }

    /// Current phase as seen by the pipeline
    pub fn state(&self) -> ShutdownState {
        self.gate.state()
    }
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("routes", &self.routes)
            .field("domain", &self.domain.name())
            .field("state", &self.gate.state())
            .finish()
    }
}
