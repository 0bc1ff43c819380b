#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use postboard::{
    app_state::AppState,
    config::Config,
    infrastructure::{EntityStore, SqliteStore, ViewerContext},
    models::{Group, NewGroup, NewPost, Post, User},
};

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<dyn EntityStore>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_ttl(Duration::from_secs(20)).await
    }

    pub async fn with_ttl(ttl: Duration) -> Self {
        let mut config = Config::default();
        config.database.url = "sqlite::memory:".to_string();
        config.cache.global_feed_ttl_secs = ttl.as_secs();

        let store: Arc<dyn EntityStore> = Arc::new(
            SqliteStore::new_in_memory()
                .await
                .expect("in-memory store"),
        );
        let state = AppState::with_store(config, store.clone());
        Self { state, store }
    }

    pub async fn user(&self, username: &str) -> User {
        self.state
            .admin
            .create_user(username)
            .await
            .expect("create user")
    }

    pub async fn group(&self, slug: &str) -> Group {
        self.state
            .admin
            .create_group(NewGroup {
                title: format!("Group {}", slug),
                slug: slug.to_string(),
                description: String::new(),
            })
            .await
            .expect("create group")
    }

    /// Inserts a post straight into the store with a fixed timestamp.
    pub async fn post_at(
        &self,
        author: &User,
        text: &str,
        group: Option<&Group>,
        at: DateTime<Utc>,
    ) -> Post {
        self.store
            .insert_post(
                NewPost {
                    author_id: author.id,
                    text: text.to_string(),
                    group_id: group.map(|g| g.id),
                    image: None,
                },
                at,
            )
            .await
            .expect("insert post")
    }

    /// Inserts `count` posts one second apart, oldest first.
    pub async fn posts(&self, author: &User, count: i64) -> Vec<Post> {
        let mut posts = Vec::new();
        for i in 0..count {
            posts.push(
                self.post_at(author, &format!("post {}", i), None, at_second(i))
                    .await,
            );
        }
        posts
    }
}

pub fn at_second(second: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + second, 0).unwrap()
}

pub fn viewer(user: &User) -> ViewerContext {
    ViewerContext::for_user(user)
}

pub fn anonymous() -> ViewerContext {
    ViewerContext::anonymous("req-test".to_string())
}
