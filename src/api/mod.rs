mod handler;
mod request;
mod response;
mod routes;

pub use handler::{handler_fn, ApiHandler, FnHandler, HandlerResult};
pub use request::ApiRequest;
pub use response::{ApiError, ApiResponse};
pub use routes::{ApiRoutes, RouteMatch};

/// Path prefix reserved for the fault-isolated API surface
pub const API_PREFIX: &str = "/api";
