//! Person CRUD handlers

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use persons_common::Person;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::error;

use super::request::{parse_id, CreatePersonRequest, ListPersonsQuery, UpdatePersonRequest};
use crate::error::{PersonError, PersonResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct PersonResponse {
    pub person: Person,
}

#[derive(Debug, Serialize)]
pub struct PersonsResponse {
    pub persons: Vec<Person>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /api/v1/persons
///
/// Enriches the submitted names and stores the result.
///
/// Creation runs on its own task. If the client goes away or the request
/// deadline fires, this handler is dropped and its drop guard cancels the
/// task's token, so the classifier calls still in flight stop and nothing
/// is stored.
pub async fn create_person(
    State(state): State<AppState>,
    payload: Result<Json<CreatePersonRequest>, JsonRejection>,
) -> PersonResult<(StatusCode, Json<CreatedResponse>)> {
    let Json(request) = payload.map_err(|e| PersonError::InvalidInput(e.body_text()))?;

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let service = state.service.clone();
    let person = request.into_new_person();
    let creation = tokio::spawn(async move { service.create(person, &cancel).await });

    let id = creation.await.map_err(|e| {
        error!(error = %e, "Person creation task failed");
        PersonError::InternalService
    })??;

    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// GET /api/v1/persons/:id
pub async fn get_person(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> PersonResult<Json<PersonResponse>> {
    let id = parse_id(&raw_id)?;
    let person = state.service.get(id).await?;
    Ok(Json(PersonResponse { person }))
}

/// GET /api/v1/persons
pub async fn list_persons(
    State(state): State<AppState>,
    query: Result<Query<ListPersonsQuery>, QueryRejection>,
) -> PersonResult<Json<PersonsResponse>> {
    let Query(query) = query.map_err(|e| PersonError::InvalidInput(e.body_text()))?;
    let persons = state.service.list(query.into_filters()?).await?;
    Ok(Json(PersonsResponse { persons }))
}

/// PATCH /api/v1/persons/:id
pub async fn update_person(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdatePersonRequest>, JsonRejection>,
) -> PersonResult<(StatusCode, Json<MessageResponse>)> {
    let id = parse_id(&raw_id)?;
    let Json(request) = payload.map_err(|e| PersonError::InvalidInput(e.body_text()))?;

    state.service.update(id, request.into_params()).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "person updated successfully".to_string(),
        }),
    ))
}

/// DELETE /api/v1/persons/:id
pub async fn delete_person(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> PersonResult<Json<MessageResponse>> {
    let id = parse_id(&raw_id)?;
    state.service.delete(id).await?;

    Ok(Json(MessageResponse {
        message: "person deleted successfully".to_string(),
    }))
}

/// Build person routes
pub fn person_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/persons", get(list_persons).post(create_person))
        .route(
            "/api/v1/persons/:id",
            get(get_person).patch(update_person).delete(delete_person),
        )
}
