mod handlers;
mod http;
mod listener;

#[cfg(test)]
mod tests;

pub use http::{ApiServer, BoundServer, ServerState};
pub use listener::ListenerHandle;
