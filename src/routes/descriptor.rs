//! Declarative description of a CRUD resource: base path, controller handlers, validators,
//! upload settings and the middlewares each route runs.

use crate::error::TrencherError;
use crate::middleware::SharedMiddleware;
use crate::service::upload::UploadConfig;
use crate::service::validation::SharedValidator;
use axum::handler::Handler;
use axum::routing::{MethodFilter, MethodRouter};
use std::collections::HashMap;
use std::fmt;

pub const DEFAULT_ID_PROPERTY: &str = "id";

/// The six canonical operations of a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CrudOperation {
    List,
    Get,
    Create,
    Update,
    Patch,
    Delete,
}

impl CrudOperation {
    /// Registration order.
    pub const ALL: [CrudOperation; 6] = [
        CrudOperation::List,
        CrudOperation::Get,
        CrudOperation::Create,
        CrudOperation::Update,
        CrudOperation::Patch,
        CrudOperation::Delete,
    ];

    /// Operations mounted at `base/:id` rather than `base`.
    pub fn targets_item(self) -> bool {
        !matches!(self, CrudOperation::List | CrudOperation::Create)
    }

    /// Operations that carry a body and therefore get upload and validation stages.
    pub fn accepts_body(self) -> bool {
        matches!(self, CrudOperation::Create | CrudOperation::Update | CrudOperation::Patch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CrudOperation::List => "list",
            CrudOperation::Get => "get",
            CrudOperation::Create => "create",
            CrudOperation::Update => "update",
            CrudOperation::Patch => "patch",
            CrudOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for CrudOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-erased controller handler. Becomes a `MethodRouter` once the verb is known.
pub struct Endpoint<S> {
    build: Box<dyn FnOnce(MethodFilter) -> MethodRouter<S> + Send>,
}

impl<S> Endpoint<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new<H, T>(handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        Endpoint {
            build: Box::new(move |filter| axum::routing::on(filter, handler)),
        }
    }

    pub(crate) fn into_method_router(self, filter: MethodFilter) -> MethodRouter<S> {
        (self.build)(filter)
    }
}

impl<S> fmt::Debug for Endpoint<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Endpoint")
    }
}

/// Controller handlers. `patch` is the only optional one.
#[derive(Debug)]
pub struct Controller<S> {
    pub list: Endpoint<S>,
    pub get: Endpoint<S>,
    pub create: Endpoint<S>,
    pub update: Endpoint<S>,
    pub patch: Option<Endpoint<S>>,
    pub delete: Endpoint<S>,
}

impl<S> Controller<S> {
    pub fn has(&self, op: CrudOperation) -> bool {
        op != CrudOperation::Patch || self.patch.is_some()
    }

    pub(crate) fn into_endpoints(self) -> HashMap<CrudOperation, Endpoint<S>> {
        let mut endpoints = HashMap::from([
            (CrudOperation::List, self.list),
            (CrudOperation::Get, self.get),
            (CrudOperation::Create, self.create),
            (CrudOperation::Update, self.update),
            (CrudOperation::Delete, self.delete),
        ]);
        if let Some(patch) = self.patch {
            endpoints.insert(CrudOperation::Patch, patch);
        }
        endpoints
    }
}

/// Optional validators for the body-carrying operations.
#[derive(Clone, Default)]
pub struct ValidationSet {
    pub create: Option<SharedValidator>,
    pub update: Option<SharedValidator>,
    pub patch: Option<SharedValidator>,
}

impl ValidationSet {
    pub fn for_operation(&self, op: CrudOperation) -> Option<&SharedValidator> {
        match op {
            CrudOperation::Create => self.create.as_ref(),
            CrudOperation::Update => self.update.as_ref(),
            CrudOperation::Patch => self.patch.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for ValidationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationSet")
            .field("create", &self.create.is_some())
            .field("update", &self.update.is_some())
            .field("patch", &self.patch.is_some())
            .finish()
    }
}

pub struct ResourceDescriptor<S> {
    pub base_path: String,
    pub id_property_name: String,
    pub controller: Controller<S>,
    pub validation: ValidationSet,
    pub upload: Option<UploadConfig>,
    /// Run on every route of the resource, before route-specific ones.
    pub middlewares: Vec<SharedMiddleware>,
    pub route_middlewares: HashMap<CrudOperation, Vec<SharedMiddleware>>,
}

impl<S> fmt::Debug for ResourceDescriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("base_path", &self.base_path)
            .field("id_property_name", &self.id_property_name)
            .field("patch", &self.controller.patch.is_some())
            .field("validation", &self.validation)
            .field("upload", &self.upload)
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

impl<S> ResourceDescriptor<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn builder(base_path: impl Into<String>) -> ResourceDescriptorBuilder<S> {
        ResourceDescriptorBuilder::new(base_path)
    }
}

impl<S> ResourceDescriptor<S> {
    pub fn middlewares_for(&self, op: CrudOperation) -> &[SharedMiddleware] {
        self.route_middlewares.get(&op).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub struct ResourceDescriptorBuilder<S> {
    base_path: String,
    id_property_name: String,
    handlers: HashMap<CrudOperation, Endpoint<S>>,
    validation: ValidationSet,
    upload: Option<UploadConfig>,
    middlewares: Vec<SharedMiddleware>,
    route_middlewares: HashMap<CrudOperation, Vec<SharedMiddleware>>,
}

impl<S> ResourceDescriptorBuilder<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(base_path: impl Into<String>) -> Self {
        ResourceDescriptorBuilder {
            base_path: base_path.into(),
            id_property_name: DEFAULT_ID_PROPERTY.to_string(),
            handlers: HashMap::new(),
            validation: ValidationSet::default(),
            upload: None,
            middlewares: Vec::new(),
            route_middlewares: HashMap::new(),
        }
    }

    pub fn handler<H, T>(mut self, op: CrudOperation, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        self.handlers.insert(op, Endpoint::new(handler));
        self
    }

    pub fn list<H: Handler<T, S>, T: 'static>(self, handler: H) -> Self {
        self.handler(CrudOperation::List, handler)
    }

    pub fn get<H: Handler<T, S>, T: 'static>(self, handler: H) -> Self {
        self.handler(CrudOperation::Get, handler)
    }

    pub fn create<H: Handler<T, S>, T: 'static>(self, handler: H) -> Self {
        self.handler(CrudOperation::Create, handler)
    }

    pub fn update<H: Handler<T, S>, T: 'static>(self, handler: H) -> Self {
        self.handler(CrudOperation::Update, handler)
    }

    pub fn patch<H: Handler<T, S>, T: 'static>(self, handler: H) -> Self {
        self.handler(CrudOperation::Patch, handler)
    }

    pub fn delete<H: Handler<T, S>, T: 'static>(self, handler: H) -> Self {
        self.handler(CrudOperation::Delete, handler)
    }

    /// Path parameter name for item routes. Defaults to `id`.
    pub fn id_property(mut self, name: impl Into<String>) -> Self {
        self.id_property_name = name.into();
        self
    }

    pub fn middleware(mut self, middleware: SharedMiddleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn route_middleware(mut self, op: CrudOperation, middleware: SharedMiddleware) -> Self {
        self.route_middlewares.entry(op).or_default().push(middleware);
        self
    }

    pub fn create_validation(mut self, validator: SharedValidator) -> Self {
        self.validation.create = Some(validator);
        self
    }

    pub fn update_validation(mut self, validator: SharedValidator) -> Self {
        self.validation.update = Some(validator);
        self
    }

    pub fn patch_validation(mut self, validator: SharedValidator) -> Self {
        self.validation.patch = Some(validator);
        self
    }

    pub fn upload(mut self, config: UploadConfig) -> Self {
        self.upload = Some(config);
        self
    }

    /// Fails when any handler other than `patch` is missing.
    pub fn build(mut self) -> Result<ResourceDescriptor<S>, TrencherError> {
        let mut take = |op: CrudOperation| {
            self.handlers.remove(&op).ok_or_else(|| {
                TrencherError::internal_library()
                    .with_message(format!("Controller for {} is missing a {} handler", self.base_path, op))
                    .with_property("operation", op.as_str())
            })
        };
        let controller = Controller {
            list: take(CrudOperation::List)?,
            get: take(CrudOperation::Get)?,
            create: take(CrudOperation::Create)?,
            update: take(CrudOperation::Update)?,
            delete: take(CrudOperation::Delete)?,
            patch: self.handlers.remove(&CrudOperation::Patch),
        };
        Ok(ResourceDescriptor {
            base_path: self.base_path,
            id_property_name: self.id_property_name,
            controller,
            validation: self.validation,
            upload: self.upload,
            middlewares: self.middlewares,
            route_middlewares: self.route_middlewares,
        })
    }
}
