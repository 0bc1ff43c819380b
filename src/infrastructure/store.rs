// Entity store interface - the persistence collaborator the services run against

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::core::{GroupId, Page, PageRequest, PostId, UserId};
use crate::error::AppResult;
use crate::models::{
    Comment, CommentView, Group, Image, NewGroup, NewPost, Post, PostChanges, PostView, User,
};

/// Which posts a feed page is drawn from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(GroupId),
    Author(UserId),
    Authors(Vec<UserId>),
}

/// Result of an author-guarded post update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostUpdate {
    Updated(Post),
    NotFound,
    NotAuthor,
}

/// Relational store for users, groups, posts, comments and the follow/like
/// edge sets.
///
/// Edge inserts are insert-or-ignore against a uniqueness constraint and
/// report whether a row was actually written; concurrent duplicates collapse
/// into a single edge.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn create_user(&self, username: &str) -> AppResult<Option<User>>;
    async fn find_user(&self, username: &str) -> AppResult<Option<User>>;

    /// `None` when the slug is already taken.
    async fn create_group(&self, group: NewGroup) -> AppResult<Option<Group>>;
    async fn get_group(&self, id: GroupId) -> AppResult<Option<Group>>;
    async fn find_group(&self, slug: &str) -> AppResult<Option<Group>>;
    async fn delete_group(&self, id: GroupId) -> AppResult<bool>;

    async fn insert_post(&self, post: NewPost, created_at: DateTime<Utc>) -> AppResult<Post>;
    async fn get_post(&self, id: PostId) -> AppResult<Option<Post>>;
    async fn get_post_view(&self, id: PostId) -> AppResult<Option<PostView>>;
    async fn post_image(&self, id: PostId) -> AppResult<Option<Image>>;

    /// Applies `changes` only when `editor` is the post's author.
    async fn update_post(
        &self,
        id: PostId,
        editor: UserId,
        changes: PostChanges,
    ) -> AppResult<PostUpdate>;

    /// One page of posts ordered by `created_at DESC, id DESC`. The total and
    /// the page are read in the same transaction.
    async fn post_page(&self, filter: &PostFilter, request: PageRequest)
        -> AppResult<Page<PostView>>;

    /// `None` when the post does not exist.
    async fn insert_comment(
        &self,
        post_id: PostId,
        author_id: UserId,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> AppResult<Option<Comment>>;
    async fn list_comments(&self, post_id: PostId) -> AppResult<Vec<CommentView>>;

    async fn insert_follow(&self, user: UserId, author: UserId) -> AppResult<bool>;
    async fn delete_follow(&self, user: UserId, author: UserId) -> AppResult<bool>;
    async fn follow_exists(&self, user: UserId, author: UserId) -> AppResult<bool>;
    async fn followed_author_ids(&self, user: UserId) -> AppResult<Vec<UserId>>;
    async fn count_followers(&self, author: UserId) -> AppResult<u64>;
    async fn count_following(&self, user: UserId) -> AppResult<u64>;

    /// Never writes a like from the post's own author.
    async fn insert_like(&self, user: UserId, post: PostId) -> AppResult<bool>;
    async fn delete_like(&self, user: UserId, post: PostId) -> AppResult<bool>;
    async fn like_exists(&self, user: UserId, post: PostId) -> AppResult<bool>;
    async fn liked_post_ids(&self, user: UserId, posts: &[PostId]) -> AppResult<Vec<PostId>>;
    async fn count_likes(&self, post: PostId) -> AppResult<u64>;
}
