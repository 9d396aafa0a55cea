//! Route planning: which routes a resource produces and which stages each one runs, in
//! order. Plans are plain data; nothing here touches axum's router.

use super::custom::CustomRoute;
use super::descriptor::{CrudOperation, ResourceDescriptor};
use axum::routing::MethodFilter;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub fn method_filter(self) -> MethodFilter {
        match self {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
            Verb::Put => MethodFilter::PUT,
            Verb::Patch => MethodFilter::PATCH,
            Verb::Delete => MethodFilter::DELETE,
        }
    }

    pub fn accepts_body(self) -> bool {
        matches!(self, Verb::Post | Verb::Put | Verb::Patch)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CrudOperation> for Verb {
    fn from(op: CrudOperation) -> Self {
        match op {
            CrudOperation::List | CrudOperation::Get => Verb::Get,
            CrudOperation::Create => Verb::Post,
            CrudOperation::Update => Verb::Put,
            CrudOperation::Patch => Verb::Patch,
            CrudOperation::Delete => Verb::Delete,
        }
    }
}

/// One step of a chain. Indices point into the global and route middleware lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    Global(usize),
    Route(usize),
    Upload,
    Validate,
    Handle,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePlan {
    /// `None` for custom routes.
    pub operation: Option<CrudOperation>,
    pub verb: Verb,
    pub path: String,
    /// Always ends with [`StageKind::Handle`].
    pub stages: Vec<StageKind>,
}

/// Leading `/`, no trailing `/`. An empty path becomes `/`.
pub fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    format!("/{trimmed}")
}

pub fn item_path(base_path: &str, id_property_name: &str) -> String {
    let base = normalize_base_path(base_path);
    if base == "/" {
        format!("/:{id_property_name}")
    } else {
        format!("{base}/:{id_property_name}")
    }
}

fn stages(global: usize, route: usize, upload: bool, validate: bool) -> Vec<StageKind> {
    let mut stages: Vec<StageKind> = (0..global).map(StageKind::Global).collect();
    stages.extend((0..route).map(StageKind::Route));
    if upload {
        stages.push(StageKind::Upload);
    }
    if validate {
        stages.push(StageKind::Validate);
    }
    stages.push(StageKind::Handle);
    stages
}

/// Five routes, or six when the controller has a patch handler, in registration order.
pub fn plan_crud<S>(descriptor: &ResourceDescriptor<S>) -> Vec<RoutePlan> {
    let base = normalize_base_path(&descriptor.base_path);
    let item = item_path(&descriptor.base_path, &descriptor.id_property_name);
    let uploads = descriptor.upload.as_ref().is_some_and(|u| u.is_active());

    CrudOperation::ALL
        .into_iter()
        .filter(|op| descriptor.controller.has(*op))
        .map(|op| {
            let body = op.accepts_body();
            RoutePlan {
                operation: Some(op),
                verb: op.into(),
                path: if op.targets_item() { item.clone() } else { base.clone() },
                stages: stages(
                    descriptor.middlewares.len(),
                    descriptor.middlewares_for(op).len(),
                    body && uploads,
                    body && descriptor.validation.for_operation(op).is_some(),
                ),
            }
        })
        .collect()
}

/// GET and DELETE routes never get upload or validation stages.
pub fn plan_custom<S>(route: &CustomRoute<S>) -> RoutePlan {
    let body = route.verb.accepts_body();
    RoutePlan {
        operation: None,
        verb: route.verb,
        path: normalize_base_path(&route.path),
        stages: stages(
            0,
            route.middlewares.len(),
            body && route.upload.as_ref().is_some_and(|u| u.is_active()),
            body && route.validator.is_some(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::middleware_fn;
    use crate::service::upload::UploadConfig;
    use crate::service::validation::validator_fn;
    use axum::{extract::Request, middleware::Next};

    async fn ok() -> &'static str {
        "ok"
    }

    fn users() -> crate::routes::ResourceDescriptorBuilder<()> {
        ResourceDescriptor::builder("api/v4/users/")
            .list(ok)
            .get(ok)
            .create(ok)
            .update(ok)
            .delete(ok)
    }

    fn summary(plans: &[RoutePlan]) -> Vec<(Verb, &str)> {
        plans.iter().map(|p| (p.verb, p.path.as_str())).collect()
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_base_path("api/v4/users/"), "/api/v4/users");
        assert_eq!(normalize_base_path("/users"), "/users");
        assert_eq!(normalize_base_path(""), "/");
        assert_eq!(item_path("/users", "userId"), "/users/:userId");
        assert_eq!(item_path("/", "id"), "/:id");
    }

    #[test]
    fn five_routes_without_patch() {
        let plans = plan_crud(&users().build().unwrap());
        assert_eq!(
            summary(&plans),
            vec![
                (Verb::Get, "/api/v4/users"),
                (Verb::Get, "/api/v4/users/:id"),
                (Verb::Post, "/api/v4/users"),
                (Verb::Put, "/api/v4/users/:id"),
                (Verb::Delete, "/api/v4/users/:id"),
            ]
        );
        assert!(plans.iter().all(|p| p.stages == vec![StageKind::Handle]));
    }

    #[test]
    fn six_routes_with_patch_and_custom_id() {
        let plans = plan_crud(&users().patch(ok).id_property("userId").build().unwrap());
        assert_eq!(plans.len(), 6);
        assert_eq!(plans[4].verb, Verb::Patch);
        assert_eq!(plans[4].path, "/api/v4/users/:userId");
        assert_eq!(plans[4].operation, Some(CrudOperation::Patch));
    }

    #[test]
    fn stage_order_is_global_route_upload_validate_handle() {
        let pass = || middleware_fn(|req: Request, next: Next| async move { next.run(req).await });
        let descriptor = users()
            .patch(ok)
            .middleware(pass())
            .middleware(pass())
            .route_middleware(CrudOperation::Create, pass())
            .create_validation(validator_fn(|_, _| {}))
            .upload(UploadConfig::new("uploads").field("avatar"))
            .build()
            .unwrap();
        let plans = plan_crud(&descriptor);

        let create = &plans[2];
        assert_eq!(
            create.stages,
            vec![
                StageKind::Global(0),
                StageKind::Global(1),
                StageKind::Route(0),
                StageKind::Upload,
                StageKind::Validate,
                StageKind::Handle,
            ]
        );
        // update has uploads but no validator; list gets neither
        assert_eq!(
            plans[3].stages,
            vec![StageKind::Global(0), StageKind::Global(1), StageKind::Upload, StageKind::Handle]
        );
        assert_eq!(plans[0].stages, vec![StageKind::Global(0), StageKind::Global(1), StageKind::Handle]);
    }

    #[test]
    fn upload_without_fields_adds_no_stage() {
        let plans = plan_crud(&users().upload(UploadConfig::new("uploads")).build().unwrap());
        assert!(plans.iter().all(|p| !p.stages.contains(&StageKind::Upload)));
    }

    #[test]
    fn custom_get_never_validates_or_uploads() {
        let route = CustomRoute::<()>::get("reports/daily", ok)
            .validation(validator_fn(|_, _| {}))
            .upload(UploadConfig::new("uploads").field("file"));
        let plan = plan_custom(&route);
        assert_eq!(plan.path, "/reports/daily");
        assert_eq!(plan.stages, vec![StageKind::Handle]);

        let route = CustomRoute::<()>::post("reports", ok).validation(validator_fn(|_, _| {}));
        assert_eq!(plan_custom(&route).stages, vec![StageKind::Validate, StageKind::Handle]);
    }
}
