use std::sync::Arc;

use crate::{
    config::Config,
    error::AppResult,
    infrastructure::{EntityStore, HasIdentity, SqliteStore},
    services::{
        AdminService, FeedComposer, PostService, ProfileService, RelationshipIndex, SocialService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn EntityStore>,
    pub relationships: RelationshipIndex,
    pub feed: FeedComposer,
    pub posts: PostService,
    pub social: SocialService,
    pub profiles: ProfileService,
    pub admin: AdminService,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let store = SqliteStore::connect(&config.database.url, config.database.max_connections)
            .await?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Wires every service around an already opened store.
    pub fn with_store(config: Config, store: Arc<dyn EntityStore>) -> Self {
        let relationships = RelationshipIndex::new(store.clone());
        let feed = FeedComposer::new(
            store.clone(),
            relationships.clone(),
            config.cache.global_feed_ttl(),
        );
        let posts = PostService::new(store.clone(), relationships.clone());
        let social = SocialService::new(store.clone(), posts.clone());
        let profiles = ProfileService::new(feed.clone(), relationships.clone());
        let admin = AdminService::new(store.clone());

        Self {
            config,
            store,
            relationships,
            feed,
            posts,
            social,
            profiles,
            admin,
        }
    }
}

impl HasIdentity for AppState {
    fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    fn identity_header(&self) -> &str {
        &self.config.identity.header
    }
}
