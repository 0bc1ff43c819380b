// Post mutations (create, edit, comment) and the single-post read view

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::core::{now_millis, GroupId, PostId};
use crate::error::{AppError, AppResult, FieldErrors};
use crate::infrastructure::{EntityStore, PostUpdate, ViewerContext};
use crate::models::{Comment, CommentView, Image, NewPost, Post, PostChanges, PostView, User};
use crate::services::relationships::RelationshipIndex;
use crate::services::validation;

/// New post input. `image` is a base64 upload.
#[derive(Debug, Clone, Default)]
pub struct PostForm {
    pub text: String,
    pub group: Option<GroupId>,
    pub image: Option<String>,
}

/// Partial edit. `group: Some(None)` detaches the post from its group;
/// `None` fields are left as they are.
#[derive(Debug, Clone, Default)]
pub struct PostEditForm {
    pub text: Option<String>,
    pub group: Option<Option<GroupId>>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CommentForm {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub author: User,
    pub post: PostView,
    pub comments: Vec<CommentView>,
}

#[derive(Clone)]
pub struct PostService {
    store: Arc<dyn EntityStore>,
    relationships: RelationshipIndex,
}

impl PostService {
    pub fn new(store: Arc<dyn EntityStore>, relationships: RelationshipIndex) -> Self {
        Self {
            store,
            relationships,
        }
    }

    #[instrument(skip(self, viewer, form), fields(request_id = %viewer.request_id))]
    pub async fn create_post(&self, viewer: &ViewerContext, form: PostForm) -> AppResult<Post> {
        let author = viewer.require_user()?;

        let mut errors = FieldErrors::new();
        let text = validation::required_text(&form.text, "text", &mut errors);
        let image = validation::decode_image(form.image.as_deref(), "image", &mut errors);
        self.check_group(form.group, &mut errors).await?;
        errors.into_result()?;

        let post = self
            .store
            .insert_post(
                NewPost {
                    author_id: author.id,
                    text,
                    group_id: form.group,
                    image,
                },
                now_millis(),
            )
            .await?;

        info!(post_id = %post.id, author = %author.username, "post created");
        Ok(post)
    }

    /// Only the author may edit; `created_at` is never touched.
    #[instrument(skip(self, viewer, form), fields(request_id = %viewer.request_id))]
    pub async fn edit_post(
        &self,
        viewer: &ViewerContext,
        post_id: PostId,
        form: PostEditForm,
    ) -> AppResult<Post> {
        let editor = viewer.require_user()?;

        let existing = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| post_not_found(post_id))?;
        if existing.author_id != editor.id {
            warn!(post_id = %post_id, editor = %editor.username, "edit by non-author rejected");
            return Err(not_author());
        }

        let mut errors = FieldErrors::new();
        let text = form
            .text
            .as_deref()
            .map(|text| validation::required_text(text, "text", &mut errors));
        let image: Option<Image> =
            validation::decode_image(form.image.as_deref(), "image", &mut errors);
        if let Some(group) = form.group {
            self.check_group(group, &mut errors).await?;
        }
        errors.into_result()?;

        let changes = PostChanges {
            text,
            group: form.group,
            image,
        };
        match self.store.update_post(post_id, editor.id, changes).await? {
            PostUpdate::Updated(post) => {
                info!(post_id = %post.id, "post edited");
                Ok(post)
            }
            PostUpdate::NotFound => Err(post_not_found(post_id)),
            PostUpdate::NotAuthor => Err(not_author()),
        }
    }

    #[instrument(skip(self, viewer, form), fields(request_id = %viewer.request_id))]
    pub async fn add_comment(
        &self,
        viewer: &ViewerContext,
        post_id: PostId,
        form: CommentForm,
    ) -> AppResult<Comment> {
        let author = viewer.require_user()?;

        let mut errors = FieldErrors::new();
        let text = validation::required_text(&form.text, "text", &mut errors);
        errors.into_result()?;

        let comment = self
            .store
            .insert_comment(post_id, author.id, &text, now_millis())
            .await?
            .ok_or_else(|| post_not_found(post_id))?;

        info!(
            comment_id = %comment.id,
            post_id = %post_id,
            author = %author.username,
            "comment added"
        );
        Ok(comment)
    }

    /// The post `post_id` as published by `username`; anything else is
    /// `NotFound`.
    pub async fn locate(&self, username: &str, post_id: PostId) -> AppResult<(User, Post)> {
        let author = self
            .store
            .find_user(username)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))?;
        let post = self
            .store
            .get_post(post_id)
            .await?
            .filter(|post| post.author_id == author.id)
            .ok_or_else(|| post_not_found(post_id))?;
        Ok((author, post))
    }

    pub async fn post_detail(
        &self,
        viewer: &ViewerContext,
        username: &str,
        post_id: PostId,
    ) -> AppResult<PostDetail> {
        let (author, _) = self.locate(username, post_id).await?;
        let mut view = self
            .store
            .get_post_view(post_id)
            .await?
            .ok_or_else(|| post_not_found(post_id))?;
        self.relationships
            .annotate_likes(viewer, std::slice::from_mut(&mut view))
            .await?;
        let comments = self.store.list_comments(post_id).await?;

        Ok(PostDetail {
            author,
            post: view,
            comments,
        })
    }

    pub async fn post_image(&self, post_id: PostId) -> AppResult<Image> {
        self.store
            .post_image(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} has no image", post_id)))
    }

    async fn check_group(&self, group: Option<GroupId>, errors: &mut FieldErrors) -> AppResult<()> {
        if let Some(group_id) = group {
            if self.store.get_group(group_id).await?.is_none() {
                errors.add("group", validation::INVALID_CHOICE);
            }
        }
        Ok(())
    }
}

fn post_not_found(post_id: PostId) -> AppError {
    AppError::NotFound(format!("Post {} not found", post_id))
}

fn not_author() -> AppError {
    AppError::Forbidden("Only the author can edit this post".to_string())
}
