//! URL joining for client routes.

/// Joins `base` and `route` with exactly one `/`. Without a base (or with an empty one) the
/// result is root-relative.
pub fn build_full_url(base: Option<&str>, route: &str) -> String {
    let route = route.trim_start_matches('/');
    match base.filter(|b| !b.is_empty()) {
        Some(base) => format!("{}/{}", base.trim_end_matches('/'), route),
        None => format!("/{route}"),
    }
}
