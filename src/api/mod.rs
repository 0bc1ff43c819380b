// HTTP interface - the logical endpoints the presentation layer consumes
//
// Reads answer with JSON. Writes answer the way the pages did: a redirect on
// success, or the submitted form echoed back with field errors.

pub mod admin;
pub mod feeds;
pub mod forms;
pub mod posts;
pub mod social;

use axum::{
    http::{StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::core::{PageRequest, PostId};
use crate::error::{AppError, AppResult, FieldErrors};
use crate::infrastructure::viewer_context_middleware;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(feeds::index))
        .route("/follow", get(feeds::follow_index))
        .route("/group/{slug}", get(feeds::group_posts))
        .route("/new", post(posts::new_post))
        .route("/media/posts/{post_id}", get(posts::post_image))
        .route("/admin/users", post(admin::create_user))
        .route("/admin/groups", post(admin::create_group))
        .route("/admin/groups/{slug}", delete(admin::delete_group))
        .route("/{username}", get(feeds::profile))
        .route("/{username}/follow", post(social::profile_follow))
        .route("/{username}/unfollow", post(social::profile_unfollow))
        .route("/{username}/{post_id}", get(posts::post_view))
        .route("/{username}/{post_id}/edit", post(posts::post_edit))
        .route("/{username}/{post_id}/comment", post(posts::add_comment))
        .route("/{username}/{post_id}/like", post(social::like))
        .route("/{username}/{post_id}/unlike", post(social::unlike))
        .fallback(page_not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            viewer_context_middleware::<AppState>,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn request(&self) -> PageRequest {
        PageRequest::parse(self.page.as_deref())
    }
}

/// A submitted form returned for correction.
#[derive(Debug, Serialize)]
pub struct FormPage<F> {
    pub form: F,
    pub errors: FieldErrors,
}

pub fn form_with_errors<F: Serialize>(form: F, errors: FieldErrors) -> Response {
    (StatusCode::OK, Json(FormPage { form, errors })).into_response()
}

/// Non-numeric post ids never match a route in the first place.
pub fn parse_post_id(raw: &str) -> AppResult<PostId> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("Post '{}' not found", raw)))
}

pub fn profile_path(username: &str) -> String {
    format!("/{}", encode_segment(username))
}

pub fn post_path(username: &str, post_id: PostId) -> String {
    format!("/{}/{}", encode_segment(username), post_id)
}

/// Percent-encodes everything outside the characters usernames commonly use,
/// so redirect targets are always valid header values.
fn encode_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~@+".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

async fn page_not_found(uri: Uri) -> Response {
    let status = StatusCode::NOT_FOUND;
    (
        status,
        Json(json!({
            "error": "Page not found",
            "status": status.as_u16(),
            "path": uri.path(),
        })),
    )
        .into_response()
}
