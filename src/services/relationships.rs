// Relationship index - read-only projections over the follow and like edge sets

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::core::{PostId, UserId};
use crate::error::AppResult;
use crate::infrastructure::{EntityStore, ViewerContext};
use crate::models::PostView;

#[derive(Clone)]
pub struct RelationshipIndex {
    store: Arc<dyn EntityStore>,
}

impl RelationshipIndex {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn is_following(&self, user: UserId, author: UserId) -> AppResult<bool> {
        self.store.follow_exists(user, author).await
    }

    pub async fn is_liking(&self, user: UserId, post: PostId) -> AppResult<bool> {
        self.store.like_exists(user, post).await
    }

    pub async fn followed_authors(&self, user: UserId) -> AppResult<BTreeSet<UserId>> {
        Ok(self
            .store
            .followed_author_ids(user)
            .await?
            .into_iter()
            .collect())
    }

    /// The subset of `posts` that `user` likes.
    pub async fn liked_among(&self, user: UserId, posts: &[PostId]) -> AppResult<HashSet<PostId>> {
        if posts.is_empty() {
            return Ok(HashSet::new());
        }
        Ok(self
            .store
            .liked_post_ids(user, posts)
            .await?
            .into_iter()
            .collect())
    }

    pub async fn follower_count(&self, author: UserId) -> AppResult<u64> {
        self.store.count_followers(author).await
    }

    pub async fn following_count(&self, user: UserId) -> AppResult<u64> {
        self.store.count_following(user).await
    }

    /// Marks each item with whether the viewer likes it. Anonymous viewers
    /// leave the items untouched.
    pub async fn annotate_likes(
        &self,
        viewer: &ViewerContext,
        items: &mut [PostView],
    ) -> AppResult<()> {
        let Some(user) = viewer.user_id() else {
            return Ok(());
        };
        let ids: Vec<PostId> = items.iter().map(|item| item.id).collect();
        let liked = self.liked_among(user, &ids).await?;
        for item in items.iter_mut() {
            item.liked = Some(liked.contains(&item.id));
        }
        Ok(())
    }
}
