use super::{ApiError, ApiRequest};
use crate::fault::RequestContext;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;

pub type HandlerResult = std::result::Result<Value, ApiError>;

/// An API endpoint. Implementations are external collaborators of the
/// pipeline: they receive a request and either produce a payload or declare
/// an error. Anything else (a panic while being polled) is a fault.
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    async fn call(&self, request: ApiRequest, ctx: RequestContext) -> HandlerResult;
}

/// Adapter that turns an async closure into an [`ApiHandler`]
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a handler
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(ApiRequest, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> ApiHandler for FnHandler<F>
where
    F: Fn(ApiRequest, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, request: ApiRequest, ctx: RequestContext) -> HandlerResult {
        (self.f)(request, ctx).await
    }
}
