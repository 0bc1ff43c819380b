use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::api::form_with_errors;
use crate::api::forms::Submission;
use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::NewGroup;

pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Response> {
    let mut input = Submission::from_body(body);
    let username = input.text("username").unwrap_or_default();
    if !input.is_valid() {
        return Ok(form_with_errors(input.echo(), input.errors().clone()));
    }

    match state.admin.create_user(&username).await {
        Ok(user) => Ok((StatusCode::CREATED, Json(user)).into_response()),
        Err(AppError::Validation(errors)) => Ok(form_with_errors(input.echo(), errors)),
        Err(err) => Err(err),
    }
}

pub async fn create_group(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Response> {
    let mut input = Submission::from_body(body);
    let group = NewGroup {
        title: input.text("title").unwrap_or_default(),
        slug: input.text("slug").unwrap_or_default(),
        description: input.text("description").unwrap_or_default(),
    };
    if !input.is_valid() {
        return Ok(form_with_errors(input.echo(), input.errors().clone()));
    }

    match state.admin.create_group(group).await {
        Ok(group) => Ok((StatusCode::CREATED, Json(group)).into_response()),
        Err(AppError::Validation(errors)) => Ok(form_with_errors(input.echo(), errors)),
        Err(err) => Err(err),
    }
}

pub async fn delete_group(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    state.admin.delete_group(&slug).await?;
    Ok(StatusCode::NO_CONTENT)
}
