// Author profile view: the author feed plus follow state and counters

use serde::Serialize;
use tracing::instrument;

use crate::core::{Page, PageRequest};
use crate::error::{AppError, AppResult};
use crate::infrastructure::ViewerContext;
use crate::models::{PostView, User};
use crate::services::feed::{FeedComposer, FeedContext, FeedPage, FeedSubject};
use crate::services::relationships::RelationshipIndex;

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub author: User,
    /// Whether the viewer follows this author; always false for anonymous
    /// viewers and on one's own profile.
    pub following: bool,
    pub follower_count: u64,
    pub following_count: u64,
    pub post_count: u64,
    pub page: Page<PostView>,
}

#[derive(Clone)]
pub struct ProfileService {
    feed: FeedComposer,
    relationships: RelationshipIndex,
}

impl ProfileService {
    pub fn new(feed: FeedComposer, relationships: RelationshipIndex) -> Self {
        Self {
            feed,
            relationships,
        }
    }

    #[instrument(skip(self, viewer), fields(request_id = %viewer.request_id))]
    pub async fn profile(
        &self,
        viewer: &ViewerContext,
        username: &str,
        request: PageRequest,
    ) -> AppResult<Profile> {
        let FeedPage { subject, mut page } = self
            .feed
            .compose(&FeedContext::Author(username.to_string()), request)
            .await?;
        let FeedSubject::Author { author } = subject else {
            return Err(AppError::Internal(format!(
                "author feed for '{}' resolved to another subject",
                username
            )));
        };

        let following = match viewer.user_id() {
            Some(me) if me != author.id => self.relationships.is_following(me, author.id).await?,
            _ => false,
        };
        self.relationships
            .annotate_likes(viewer, &mut page.items)
            .await?;

        Ok(Profile {
            following,
            follower_count: self.relationships.follower_count(author.id).await?,
            following_count: self.relationships.following_count(author.id).await?,
            post_count: page.total_count,
            author,
            page,
        })
    }
}
