// Feed composer - one ordered, paginated query path for every selection context
//
// Global: every post. Group: posts of one group. Author: posts of one user.
// Following: posts by the authors a viewer follows. All of them order by
// (created_at DESC, id DESC) and page ten at a time. Only the global feed is
// cached, in a single slot that ignores page number and viewer.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::{Page, PageRequest, PageWindow, UserId};
use crate::error::{AppError, AppResult};
use crate::infrastructure::{EntityStore, PostFilter, TimedSlot};
use crate::models::{Group, PostView, User};
use crate::services::relationships::RelationshipIndex;

/// Which posts a feed is drawn from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedContext {
    Global,
    Group(String),
    Author(String),
    Following(UserId),
}

/// The resolved subject a feed page is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedSubject {
    Global,
    Group { group: Group },
    Author { author: User },
    Following,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPage {
    pub subject: FeedSubject,
    pub page: Page<PostView>,
}

#[derive(Clone)]
pub struct FeedComposer {
    store: Arc<dyn EntityStore>,
    relationships: RelationshipIndex,
    global_cache: Arc<TimedSlot<FeedPage>>,
}

impl FeedComposer {
    pub fn new(
        store: Arc<dyn EntityStore>,
        relationships: RelationshipIndex,
        global_ttl: Duration,
    ) -> Self {
        Self {
            store,
            relationships,
            global_cache: Arc::new(TimedSlot::new(global_ttl)),
        }
    }

    pub fn global_cache(&self) -> &TimedSlot<FeedPage> {
        &self.global_cache
    }

    #[instrument(skip(self))]
    pub async fn compose(
        &self,
        context: &FeedContext,
        request: PageRequest,
    ) -> AppResult<FeedPage> {
        let is_global = matches!(context, FeedContext::Global);

        if is_global {
            if let Some(cached) = self.global_cache.get().await {
                debug!("global feed served from cache");
                return Ok(cached);
            }
        }

        let (subject, filter) = self.resolve(context).await?;
        let page = match filter {
            Some(filter) => self.store.post_page(&filter, request).await?,
            None => PageWindow::resolve(request, 0).into_page(Vec::new()),
        };
        debug!(
            total = page.total_count,
            number = page.number,
            items = page.items.len(),
            "feed page composed"
        );

        let feed = FeedPage { subject, page };
        if is_global {
            self.global_cache.put(feed.clone()).await;
        }
        Ok(feed)
    }

    /// Maps a context to its subject and post filter. `None` means the
    /// selection is known to be empty.
    async fn resolve(&self, context: &FeedContext) -> AppResult<(FeedSubject, Option<PostFilter>)> {
        match context {
            FeedContext::Global => Ok((FeedSubject::Global, Some(PostFilter::All))),
            FeedContext::Group(slug) => {
                let group = self
                    .store
                    .find_group(slug)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Group '{}' not found", slug)))?;
                let filter = PostFilter::Group(group.id);
                Ok((FeedSubject::Group { group }, Some(filter)))
            }
            FeedContext::Author(username) => {
                let author = self
                    .store
                    .find_user(username)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", username)))?;
                let filter = PostFilter::Author(author.id);
                Ok((FeedSubject::Author { author }, Some(filter)))
            }
            FeedContext::Following(viewer) => {
                let authors = self.relationships.followed_authors(*viewer).await?;
                if authors.is_empty() {
                    return Ok((FeedSubject::Following, None));
                }
                Ok((
                    FeedSubject::Following,
                    Some(PostFilter::Authors(authors.into_iter().collect())),
                ))
            }
        }
    }
}
