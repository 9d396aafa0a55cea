//! Dispatcher adapter: the single seam between assembled chains and the HTTP router.

use super::chain::MiddlewareChain;
use super::plan::Verb;
use crate::error::TrencherError;
use axum::{routing::MethodRouter, Router};

pub trait Dispatcher<S> {
    /// Registers `chain` for `verb` + `path`. Re-registering a pair replaces the earlier chain;
    /// a path the router could never hold alongside the registered ones is an error.
    fn register(&mut self, verb: Verb, path: &str, chain: MiddlewareChain<S>) -> Result<(), TrencherError>;
}

fn is_dynamic(segment: &str) -> bool {
    segment.starts_with(':') || segment.starts_with('*')
}

/// First registered path that captures the same position under a different name,
/// e.g. `/users/:id` and `/users/:userId`.
fn conflicting_path<'a>(path: &str, registered: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    registered.filter(|other| *other != path).find(|other| {
        path.split('/')
            .zip(other.split('/'))
            .find(|(a, b)| a != b)
            .is_some_and(|(a, b)| is_dynamic(a) && is_dynamic(b))
    })
}

#[derive(Debug)]
struct RegisteredRoute<S> {
    verb: Verb,
    path: String,
    chain: MiddlewareChain<S>,
}

/// Collects chains and turns them into an axum [`Router`].
#[derive(Debug)]
pub struct AxumDispatcher<S> {
    routes: Vec<RegisteredRoute<S>>,
}

impl<S> Default for AxumDispatcher<S> {
    fn default() -> Self {
        AxumDispatcher { routes: Vec::new() }
    }
}

impl<S> AxumDispatcher<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered (verb, path) pairs in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (Verb, &str)> {
        self.routes.iter().map(|r| (r.verb, r.path.as_str()))
    }

    pub fn chain(&self, verb: Verb, path: &str) -> Option<&MiddlewareChain<S>> {
        self.routes
            .iter()
            .find(|r| r.verb == verb && r.path == path)
            .map(|r| &r.chain)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// One axum route per path, with every verb registered on it merged together.
    /// Parameter name clashes were already refused by [`Dispatcher::register`].
    pub fn into_router(self) -> Router<S> {
        let mut by_path: Vec<(String, MethodRouter<S>)> = Vec::new();
        for RegisteredRoute { verb, path, chain } in self.routes {
            let method_router = chain.into_method_router(verb);
            match by_path.iter().position(|(p, _)| *p == path) {
                Some(i) => {
                    let (p, existing) = by_path.remove(i);
                    by_path.insert(i, (p, existing.merge(method_router)));
                }
                None => by_path.push((path, method_router)),
            }
        }
        by_path
            .into_iter()
            .fold(Router::new(), |router, (path, method_router)| router.route(&path, method_router))
    }
}

impl<S> Dispatcher<S> for AxumDispatcher<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn register(&mut self, verb: Verb, path: &str, chain: MiddlewareChain<S>) -> Result<(), TrencherError> {
        tracing::debug!(%verb, path, stages = ?chain.stage_names(), "registering route");
        if let Some(existing) = conflicting_path(path, self.routes.iter().map(|r| r.path.as_str())) {
            tracing::error!(%verb, path, existing, "conflicting route parameters");
            return Err(TrencherError::internal_library()
                .with_message(format!("Route {} conflicts with {}", path, existing)));
        }
        if let Some(existing) = self.routes.iter_mut().find(|r| r.verb == verb && r.path == path) {
            tracing::warn!(%verb, path, "route registered twice; keeping the last chain");
            existing.chain = chain;
            return Ok(());
        }
        self.routes.push(RegisteredRoute {
            verb,
            path: path.to_string(),
            chain,
        });
        Ok(())
    }
}
