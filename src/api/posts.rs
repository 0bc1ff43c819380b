use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::Value;

use crate::api::forms::Submission;
use crate::api::{form_with_errors, parse_post_id, post_path};
use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::infrastructure::Vc;
use crate::services::{CommentForm, PostDetail, PostEditForm, PostForm};

pub async fn new_post(
    State(state): State<AppState>,
    vc: Vc,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Response> {
    vc.require_user()?;
    let mut input = Submission::from_body(body);
    let form = PostForm {
        text: input.text("text").unwrap_or_default(),
        group: input.group_choice("group").flatten(),
        image: input.text("image"),
    };
    if !input.is_valid() {
        return Ok(form_with_errors(input.echo(), input.errors().clone()));
    }

    match state.posts.create_post(&vc, form).await {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(AppError::Validation(errors)) => Ok(form_with_errors(input.echo(), errors)),
        Err(err) => Err(err),
    }
}

pub async fn post_view(
    State(state): State<AppState>,
    vc: Vc,
    Path((username, post_id)): Path<(String, String)>,
) -> AppResult<Json<PostDetail>> {
    let post_id = parse_post_id(&post_id)?;
    let detail = state.posts.post_detail(&vc, &username, post_id).await?;
    Ok(Json(detail))
}

/// Non-authors are sent back to the post untouched.
pub async fn post_edit(
    State(state): State<AppState>,
    vc: Vc,
    Path((username, post_id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Response> {
    let me = vc.require_user()?.id;
    let post_id = parse_post_id(&post_id)?;
    let (_, post) = state.posts.locate(&username, post_id).await?;
    let back = post_path(&username, post_id);
    if post.author_id != me {
        return Ok(Redirect::to(&back).into_response());
    }

    let mut input = Submission::from_body(body);
    let form = PostEditForm {
        text: input.text("text"),
        group: input.group_choice("group"),
        image: input.text("image"),
    };
    if !input.is_valid() {
        return Ok(form_with_errors(input.echo(), input.errors().clone()));
    }

    match state.posts.edit_post(&vc, post_id, form).await {
        Ok(_) | Err(AppError::Forbidden(_)) => Ok(Redirect::to(&back).into_response()),
        Err(AppError::Validation(errors)) => Ok(form_with_errors(input.echo(), errors)),
        Err(err) => Err(err),
    }
}

/// Invalid comments are dropped silently.
pub async fn add_comment(
    State(state): State<AppState>,
    vc: Vc,
    Path((username, post_id)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Redirect> {
    vc.require_user()?;
    let post_id = parse_post_id(&post_id)?;
    state.posts.locate(&username, post_id).await?;
    let back = Redirect::to(&post_path(&username, post_id));

    let mut input = Submission::from_body(body);
    let form = CommentForm {
        text: input.text("text").unwrap_or_default(),
    };
    if !input.is_valid() {
        return Ok(back);
    }

    match state.posts.add_comment(&vc, post_id, form).await {
        Ok(_) | Err(AppError::Validation(_)) => Ok(back),
        Err(err) => Err(err),
    }
}

pub async fn post_image(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let post_id = parse_post_id(&post_id)?;
    let image = state.posts.post_image(post_id).await?;
    Ok(([(header::CONTENT_TYPE, image.content_type)], image.bytes).into_response())
}
