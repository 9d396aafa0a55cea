//! One-off endpoints outside the CRUD set, registered through the same chain builder.

use super::chain::MiddlewareChain;
use super::descriptor::Endpoint;
use super::dispatcher::Dispatcher;
use super::plan::{plan_custom, Verb};
use crate::error::TrencherError;
use crate::middleware::SharedMiddleware;
use crate::service::upload::UploadConfig;
use crate::service::validation::SharedValidator;
use axum::handler::Handler;
use std::fmt;

pub struct CustomRoute<S> {
    pub verb: Verb,
    pub path: String,
    pub handler: Endpoint<S>,
    pub middlewares: Vec<SharedMiddleware>,
    pub validator: Option<SharedValidator>,
    pub upload: Option<UploadConfig>,
}

impl<S> fmt::Debug for CustomRoute<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRoute")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("middlewares", &self.middlewares.len())
            .field("validator", &self.validator.is_some())
            .field("upload", &self.upload)
            .finish()
    }
}

impl<S> CustomRoute<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new<H, T>(verb: Verb, path: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        CustomRoute {
            verb,
            path: path.into(),
            handler: Endpoint::new(handler),
            middlewares: Vec::new(),
            validator: None,
            upload: None,
        }
    }

    pub fn get<H: Handler<T, S>, T: 'static>(path: impl Into<String>, handler: H) -> Self {
        Self::new(Verb::Get, path, handler)
    }

    pub fn post<H: Handler<T, S>, T: 'static>(path: impl Into<String>, handler: H) -> Self {
        Self::new(Verb::Post, path, handler)
    }

    pub fn put<H: Handler<T, S>, T: 'static>(path: impl Into<String>, handler: H) -> Self {
        Self::new(Verb::Put, path, handler)
    }

    pub fn patch<H: Handler<T, S>, T: 'static>(path: impl Into<String>, handler: H) -> Self {
        Self::new(Verb::Patch, path, handler)
    }

    pub fn delete<H: Handler<T, S>, T: 'static>(path: impl Into<String>, handler: H) -> Self {
        Self::new(Verb::Delete, path, handler)
    }

    pub fn middleware(mut self, middleware: SharedMiddleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Ignored for GET and DELETE routes.
    pub fn validation(mut self, validator: SharedValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Ignored for GET and DELETE routes.
    pub fn upload(mut self, config: UploadConfig) -> Self {
        self.upload = Some(config);
        self
    }
}

pub fn register_custom_route<S, D>(dispatcher: &mut D, route: CustomRoute<S>) -> Result<(), TrencherError>
where
    S: Clone + Send + Sync + 'static,
    D: Dispatcher<S> + ?Sized,
{
    let plan = plan_custom(&route);
    let chain = MiddlewareChain::assemble(
        &plan,
        &[],
        &route.middlewares,
        route.upload.as_ref(),
        route.validator.as_ref(),
        route.handler,
    )?;
    dispatcher.register(plan.verb, &plan.path, chain)
}
