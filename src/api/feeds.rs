use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::api::PageQuery;
use crate::app_state::AppState;
use crate::error::AppResult;
use crate::infrastructure::Vc;
use crate::services::{FeedContext, FeedPage, Profile};

pub async fn index(
    State(state): State<AppState>,
    vc: Vc,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<FeedPage>> {
    compose(&state, &vc, FeedContext::Global, &query).await
}

pub async fn group_posts(
    State(state): State<AppState>,
    vc: Vc,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<FeedPage>> {
    compose(&state, &vc, FeedContext::Group(slug), &query).await
}

pub async fn follow_index(
    State(state): State<AppState>,
    vc: Vc,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<FeedPage>> {
    let me = vc.require_user()?.id;
    compose(&state, &vc, FeedContext::Following(me), &query).await
}

pub async fn profile(
    State(state): State<AppState>,
    vc: Vc,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Profile>> {
    let profile = state
        .profiles
        .profile(&vc, &username, query.request())
        .await?;
    Ok(Json(profile))
}

// Like annotations go on the response copy, never into the cached page.
async fn compose(
    state: &AppState,
    vc: &Vc,
    context: FeedContext,
    query: &PageQuery,
) -> AppResult<Json<FeedPage>> {
    let mut feed = state.feed.compose(&context, query.request()).await?;
    state
        .relationships
        .annotate_likes(vc, &mut feed.page.items)
        .await?;
    Ok(Json(feed))
}
