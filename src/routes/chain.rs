//! Materializes a [`RoutePlan`] into concrete stages and, finally, into an axum
//! `MethodRouter` whose layers run in plan order.

use super::descriptor::Endpoint;
use super::plan::{RoutePlan, StageKind, Verb};
use crate::error::TrencherError;
use crate::middleware::SharedMiddleware;
use crate::service::upload::{UploadConfig, UploadMiddleware};
use crate::service::validation::{SharedValidator, ValidationGate};
use axum::{
    extract::Request,
    middleware::{from_fn, Next},
    routing::MethodRouter,
};
use std::fmt;

#[derive(Clone)]
pub enum Stage {
    Middleware(SharedMiddleware),
    Upload(UploadMiddleware),
    Validate(ValidationGate),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Middleware(_) => "middleware",
            Stage::Upload(_) => "upload",
            Stage::Validate(_) => "validate",
        }
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Upload(upload) => f.debug_tuple("Upload").field(upload.config()).finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// Ordered stages terminating in exactly one controller endpoint.
#[derive(Debug)]
pub struct MiddlewareChain<S> {
    stages: Vec<Stage>,
    handler: Endpoint<S>,
}

fn missing(stage: &str, plan: &RoutePlan) -> TrencherError {
    TrencherError::internal_library()
        .with_message(format!("Route plan for {} {} references a missing {}", plan.verb, plan.path, stage))
}

impl<S> MiddlewareChain<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Resolves every stage the plan names against the supplied parts.
    pub fn assemble(
        plan: &RoutePlan,
        global: &[SharedMiddleware],
        route: &[SharedMiddleware],
        upload: Option<&UploadConfig>,
        validator: Option<&SharedValidator>,
        handler: Endpoint<S>,
    ) -> Result<Self, TrencherError> {
        let mut stages = Vec::with_capacity(plan.stages.len());
        for kind in &plan.stages {
            let stage = match *kind {
                StageKind::Global(i) => Stage::Middleware(global.get(i).cloned().ok_or_else(|| missing("global middleware", plan))?),
                StageKind::Route(i) => Stage::Middleware(route.get(i).cloned().ok_or_else(|| missing("route middleware", plan))?),
                StageKind::Upload => {
                    let config = upload.ok_or_else(|| missing("upload config", plan))?;
                    Stage::Upload(UploadMiddleware::configure(config.clone()))
                }
                StageKind::Validate => {
                    let validator = validator.ok_or_else(|| missing("validator", plan))?;
                    Stage::Validate(ValidationGate::new(validator.clone()))
                }
                StageKind::Handle => continue,
            };
            stages.push(stage);
        }
        Ok(MiddlewareChain { stages, handler })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Stage names in execution order, ending with `handler`.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).chain(std::iter::once("handler")).collect()
    }

    /// The first stage becomes the outermost layer. Layers only wrap the matched route, so a
    /// request with another verb still gets a plain 405.
    pub fn into_method_router(self, verb: Verb) -> MethodRouter<S> {
        let mut router: MethodRouter<S> = self.handler.into_method_router(verb.method_filter());
        for stage in self.stages.into_iter().rev() {
            router = match stage {
                Stage::Middleware(middleware) => router.route_layer(from_fn(move |req: Request, next: Next| {
                    let middleware = middleware.clone();
                    async move { middleware.handle(req, next).await }
                })),
                Stage::Upload(upload) => router.route_layer(from_fn(move |req: Request, next: Next| {
                    let upload = upload.clone();
                    async move { upload.run(req, next).await }
                })),
                Stage::Validate(gate) => router.route_layer(from_fn(move |req: Request, next: Next| {
                    let gate = gate.clone();
                    async move { gate.run(req, next).await }
                })),
            };
        }
        router
    }
}
