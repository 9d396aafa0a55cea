//! CRUD registration: plans the resource, assembles a chain per route and hands each to
//! the dispatcher.

use super::chain::MiddlewareChain;
use super::descriptor::ResourceDescriptor;
use super::dispatcher::Dispatcher;
use super::plan::plan_crud;
use crate::error::TrencherError;

pub fn register_crud<S, D>(dispatcher: &mut D, descriptor: ResourceDescriptor<S>) -> Result<(), TrencherError>
where
    S: Clone + Send + Sync + 'static,
    D: Dispatcher<S> + ?Sized,
{
    let plans = plan_crud(&descriptor);
    let ResourceDescriptor {
        base_path,
        controller,
        validation,
        upload,
        middlewares,
        route_middlewares,
        ..
    } = descriptor;
    let mut endpoints = controller.into_endpoints();

    for plan in plans {
        let Some(op) = plan.operation else { continue };
        let handler = endpoints.remove(&op).ok_or_else(|| {
            TrencherError::internal_library().with_message(format!("No {} handler for {}", op, base_path))
        })?;
        let route = route_middlewares.get(&op).map(Vec::as_slice).unwrap_or(&[]);
        let chain = MiddlewareChain::assemble(
            &plan,
            &middlewares,
            route,
            upload.as_ref(),
            validation.for_operation(op),
            handler,
        )?;
        dispatcher.register(plan.verb, &plan.path, chain)?;
    }
    Ok(())
}
