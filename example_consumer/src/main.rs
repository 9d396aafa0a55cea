//! Example consumer: a small in-memory users API built with Trencher.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Settings come from the environment or `.env` (`LOG_LEVEL`, `TRENCHER_UPLOAD_FOLDER`).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use trencher::{
    logging, register_crud, register_custom_route, validator_fn, AxumDispatcher, CustomRoute, RequestPayload,
    ResourceDescriptor, TrencherConfig, TrencherError,
};

type Users = Arc<Mutex<Vec<Value>>>;

fn lock(users: &Users) -> Result<MutexGuard<'_, Vec<Value>>, TrencherError> {
    users
        .lock()
        .map_err(|_| TrencherError::internal_server().with_property("reason", "user store poisoned"))
}

fn user_from(id: u64, payload: &RequestPayload) -> Value {
    let mut user = payload.fields.clone();
    user.insert("id".into(), json!(id));
    if let Some(avatar) = payload.file("avatar") {
        user.insert("avatar".into(), json!(avatar.path()));
    }
    Value::Object(user)
}

async fn list(State(users): State<Users>) -> Result<Json<Value>, TrencherError> {
    let users = lock(&users)?;
    Ok(Json(Value::Array(users.clone())))
}

async fn read(State(users): State<Users>, Path(id): Path<u64>) -> Result<Json<Value>, TrencherError> {
    let users = lock(&users)?;
    let found = users.iter().find(|u| u["id"] == id).cloned();
    found
        .map(Json)
        .ok_or_else(|| TrencherError::not_found().with_property("id", id))
}

async fn create(State(users): State<Users>, payload: RequestPayload) -> Result<(StatusCode, Json<Value>), TrencherError> {
    let mut users = lock(&users)?;
    let user = user_from(users.len() as u64 + 1, &payload);
    users.push(user.clone());
    tracing::info!(id = users.len(), "created user");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update(
    State(users): State<Users>,
    Path(id): Path<u64>,
    payload: RequestPayload,
) -> Result<Json<Value>, TrencherError> {
    let mut users = lock(&users)?;
    let Some(slot) = users.iter_mut().find(|u| u["id"] == id) else {
        return Err(TrencherError::not_found().with_property("id", id));
    };
    *slot = user_from(id, &payload);
    Ok(Json(slot.clone()))
}

async fn remove(State(users): State<Users>, Path(id): Path<u64>) -> Result<StatusCode, TrencherError> {
    lock(&users)?.retain(|u| u["id"] != id);
    Ok(StatusCode::NO_CONTENT)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = TrencherConfig::from_env();
    let _log = logging::init(&config.log_level)?;

    let descriptor = ResourceDescriptor::<Users>::builder("api/v1/users")
        .list(list)
        .get(read)
        .create(create)
        .update(update)
        .delete(remove)
        .upload(config.upload().field("avatar").max_file_size(5 * 1024 * 1024))
        .create_validation(validator_fn(|payload, errors| {
            if payload.field("name").and_then(Value::as_str).map_or(true, str::is_empty) {
                errors.add("name", "name is required");
            }
        }))
        .build()?;

    let mut dispatcher = AxumDispatcher::new();
    register_crud(&mut dispatcher, descriptor)?;
    register_custom_route(&mut dispatcher, CustomRoute::get("health", health))?;
    let app = dispatcher.into_router().with_state(Users::default());

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    let port = listener.local_addr()?.port();
    tracing::info!("Example consumer listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
