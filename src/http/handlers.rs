//! Request handlers. Each one decodes the body, runs one workflow and maps
//! the outcome to a status code.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::registry::{AssignmentRequest, NewChild, Registry, RegistryError, UpdateMode, UpdateRequest};
use crate::store::DocumentStore;

type Shared<S> = State<Arc<Registry<S>>>;

/// A body that failed to decode is an input error like any other.
fn decoded<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, RegistryError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| RegistryError::InvalidInput(rejection.body_text()))
}

/// `GET /health`
pub(super) async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// `GET /children`
pub(super) async fn list<S: DocumentStore + 'static>(
    State(registry): Shared<S>,
) -> Result<Response, RegistryError> {
    let children = registry.list().await?;
    Ok(Json(children).into_response())
}

/// `POST /children`
pub(super) async fn register<S: DocumentStore + 'static>(
    State(registry): Shared<S>,
    body: Result<Json<NewChild>, JsonRejection>,
) -> Result<Response, RegistryError> {
    let receipt = registry.register(decoded(body)?).await?;
    let body = json!({
        "message": "child registered",
        "id": receipt.id,
        "version": receipt.version,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

/// `PUT /children`
pub(super) async fn replace<S: DocumentStore + 'static>(
    State(registry): Shared<S>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Response, RegistryError> {
    let receipt = registry.update(UpdateMode::Replace, decoded(body)?).await?;
    Ok(Json(receipt).into_response())
}

/// `PATCH /children`
pub(super) async fn mark_paid<S: DocumentStore + 'static>(
    State(registry): Shared<S>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Response, RegistryError> {
    let receipt = registry.update(UpdateMode::MarkPaid, decoded(body)?).await?;
    Ok(Json(receipt).into_response())
}

/// `POST /assignments`
pub(super) async fn assign<S: DocumentStore + 'static>(
    State(registry): Shared<S>,
    body: Result<Json<AssignmentRequest>, JsonRejection>,
) -> Result<Response, RegistryError> {
    let receipt = registry.assign(decoded(body)?).await?;
    Ok((StatusCode::CREATED, Json(receipt)).into_response())
}

/// `PUT /assignments`
pub(super) async fn reposition<S: DocumentStore + 'static>(
    State(registry): Shared<S>,
    body: Result<Json<AssignmentRequest>, JsonRejection>,
) -> Result<Response, RegistryError> {
    let receipt = registry.reposition(decoded(body)?).await?;
    Ok(Json(receipt).into_response())
}

/// `DELETE /assignments`
pub(super) async fn unassign<S: DocumentStore + 'static>(
    State(registry): Shared<S>,
    body: Result<Json<AssignmentRequest>, JsonRejection>,
) -> Result<Response, RegistryError> {
    registry.unassign(decoded(body)?).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
