// Follow and like mutations
// Every handler is idempotent: duplicates and self-edges are silent no-ops,
// enforced by the store's insert-or-ignore rather than a read-then-write.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::core::PostId;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{EntityStore, ViewerContext};
use crate::models::User;
use crate::services::posts::PostService;

/// What a relationship mutation did to the edge set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeChange {
    Created,
    Removed,
    Unchanged,
}

impl EdgeChange {
    fn created(written: bool) -> Self {
        if written {
            EdgeChange::Created
        } else {
            EdgeChange::Unchanged
        }
    }

    fn removed(deleted: bool) -> Self {
        if deleted {
            EdgeChange::Removed
        } else {
            EdgeChange::Unchanged
        }
    }
}

#[derive(Clone)]
pub struct SocialService {
    store: Arc<dyn EntityStore>,
    posts: PostService,
}

impl SocialService {
    pub fn new(store: Arc<dyn EntityStore>, posts: PostService) -> Self {
        Self { store, posts }
    }

    #[instrument(skip(self, viewer), fields(request_id = %viewer.request_id))]
    pub async fn follow(&self, viewer: &ViewerContext, username: &str) -> AppResult<EdgeChange> {
        let user = viewer.require_user()?;
        let author = self.find_author(username).await?;

        if user.id == author.id {
            debug!(user = %user.username, "self-follow ignored");
            return Ok(EdgeChange::Unchanged);
        }

        let change = EdgeChange::created(self.store.insert_follow(user.id, author.id).await?);
        info!(user = %user.username, author = %author.username, ?change, "follow");
        Ok(change)
    }

    #[instrument(skip(self, viewer), fields(request_id = %viewer.request_id))]
    pub async fn unfollow(&self, viewer: &ViewerContext, username: &str) -> AppResult<EdgeChange> {
        let user = viewer.require_user()?;
        let author = self.find_author(username).await?;

        let change = EdgeChange::removed(self.store.delete_follow(user.id, author.id).await?);
        info!(user = %user.username, author = %author.username, ?change, "unfollow");
        Ok(change)
    }

    #[instrument(skip(self, viewer), fields(request_id = %viewer.request_id))]
    pub async fn like(
        &self,
        viewer: &ViewerContext,
        username: &str,
        post_id: PostId,
    ) -> AppResult<EdgeChange> {
        let user = viewer.require_user()?;
        let (_, post) = self.posts.locate(username, post_id).await?;

        if post.author_id == user.id {
            debug!(user = %user.username, post_id = %post_id, "self-like ignored");
            return Ok(EdgeChange::Unchanged);
        }

        let change = EdgeChange::created(self.store.insert_like(user.id, post.id).await?);
        info!(user = %user.username, post_id = %post_id, ?change, "like");
        Ok(change)
    }

    #[instrument(skip(self, viewer), fields(request_id = %viewer.request_id))]
    pub async fn unlike(
        &self,
        viewer: &ViewerContext,
        username: &str,
        post_id: PostId,
    ) -> AppResult<EdgeChange> {
        let user = viewer.require_user()?;
        let (_, post) = self.posts.locate(username, post_id).await?;

        let change = EdgeChange::removed(self.store.delete_like(user.id, post.id).await?);
        info!(user = %user.username, post_id = %post_id, ?change, "unlike");
        Ok(change)
    }

    async fn find_author(&self, username: &str) -> AppResult<User> {
        self.store
            .find_user(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))
    }
}
