//! Per-request fault isolation for the API surface.
//!
//! Every API request runs inside a [`FaultDomain`]. A panic raised while the
//! handler's future is polled, at its first poll or after any later
//! suspension point, is caught at the domain boundary and turned into a
//! generic internal-error response for that request alone. Each caught
//! failure is also published once on the domain's notification channel,
//! where the shutdown supervisor treats it as fatal for the whole process.

mod context;
mod domain;
mod notice;


pub use context::RequestContext;
pub use domain::FaultDomain;
pub use notice::{Fault, FaultOrigin, FaultReceiver};
