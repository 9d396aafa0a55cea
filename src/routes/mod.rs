//! Route assembly: resource descriptors and custom routes in, ordered middleware chains
//! registered on an axum router out.

pub mod chain;
pub mod crud;
pub mod custom;
pub mod descriptor;
pub mod dispatcher;
pub mod plan;

pub use chain::{MiddlewareChain, Stage};
pub use crud::register_crud;
pub use custom::{register_custom_route, CustomRoute};
pub use descriptor::{
    Controller, CrudOperation, Endpoint, ResourceDescriptor, ResourceDescriptorBuilder, ValidationSet,
    DEFAULT_ID_PROPERTY,
};
pub use dispatcher::{AxumDispatcher, Dispatcher};
pub use plan::{item_path, normalize_base_path, plan_crud, plan_custom, RoutePlan, StageKind, Verb};
