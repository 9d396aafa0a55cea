//! Route middleware: any async `(Request, Next) -> Response` step that can run ahead of a
//! controller in an assembled chain.

use async_trait::async_trait;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::sync::Arc;

#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Either answers the request itself (aborting the chain) or calls `next.run(req)`.
    async fn handle(&self, req: Request, next: Next) -> Response;
}

pub type SharedMiddleware = Arc<dyn Middleware>;

struct FnMiddleware<F>(F);

#[async_trait]
impl<F, Fut, R> Middleware for FnMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    async fn handle(&self, req: Request, next: Next) -> Response {
        (self.0)(req, next).await.into_response()
    }
}

/// Wraps an async closure as a [`SharedMiddleware`].
///
/// ```ignore
/// let auth = middleware_fn(|req: Request, next: Next| async move {
///     if req.headers().contains_key("authorization") {
///         next.run(req).await
///     } else {
///         TrencherError::login().into_response()
///     }
/// });
/// ```
pub fn middleware_fn<F, Fut, R>(f: F) -> SharedMiddleware
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    Arc::new(FnMiddleware(f))
}
