use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::Redirect,
};

use crate::api::{parse_post_id, post_path, profile_path};
use crate::app_state::AppState;
use crate::error::AppResult;
use crate::infrastructure::Vc;

pub async fn profile_follow(
    State(state): State<AppState>,
    vc: Vc,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    state.social.follow(&vc, &username).await?;
    Ok(Redirect::to(&profile_path(&username)))
}

pub async fn profile_unfollow(
    State(state): State<AppState>,
    vc: Vc,
    Path(username): Path<String>,
) -> AppResult<Redirect> {
    state.social.unfollow(&vc, &username).await?;
    Ok(Redirect::to(&profile_path(&username)))
}

pub async fn like(
    State(state): State<AppState>,
    vc: Vc,
    headers: HeaderMap,
    Path((username, post_id)): Path<(String, String)>,
) -> AppResult<Redirect> {
    let post_id = parse_post_id(&post_id)?;
    state.social.like(&vc, &username, post_id).await?;
    Ok(back_to_referrer(&headers, post_path(&username, post_id)))
}

pub async fn unlike(
    State(state): State<AppState>,
    vc: Vc,
    headers: HeaderMap,
    Path((username, post_id)): Path<(String, String)>,
) -> AppResult<Redirect> {
    let post_id = parse_post_id(&post_id)?;
    state.social.unlike(&vc, &username, post_id).await?;
    Ok(back_to_referrer(&headers, post_path(&username, post_id)))
}

fn back_to_referrer(headers: &HeaderMap, fallback: String) -> Redirect {
    match headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .filter(|referer| !referer.is_empty())
    {
        Some(referer) => Redirect::to(referer),
        None => Redirect::to(&fallback),
    }
}
