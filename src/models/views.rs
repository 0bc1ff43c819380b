use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{CommentId, GroupId, PostId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: GroupId,
    pub slug: String,
    pub title: String,
}

/// A post joined with everything a feed entry displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostView {
    pub id: PostId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author_id: UserId,
    pub author: String,
    pub group: Option<GroupRef>,
    pub image_url: Option<String>,
    pub comment_count: u64,
    pub like_count: u64,
    /// Set per request for authenticated viewers; never cached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
}

impl PostView {
    pub fn image_path(id: PostId) -> String {
        format!("/media/posts/{}", id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: CommentId,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
