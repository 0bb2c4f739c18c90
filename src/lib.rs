pub mod api;
pub mod app;
pub mod attractions;
pub mod cluster;
pub mod config;
pub mod core;
pub mod error;
pub mod fault;
pub mod pipeline;
pub mod server;

pub use api::{handler_fn, ApiError, ApiHandler, ApiRequest, ApiResponse, ApiRoutes};
pub use app::{Application, ExitPath, ShutdownOutcome, ShutdownTrigger, StopHandle, StopReason};
pub use attractions::AttractionStore;
pub use config::AppConfig;
pub use self::core::{ShutdownGate, ShutdownState};
pub use error::{AppError, Result};
pub use fault::{Fault, FaultDomain, RequestContext};
