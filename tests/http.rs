mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{at_second, TestApp};
use postboard::{
    api::create_router, app_state::AppState, config::Config, infrastructure::SqliteStore,
};

const IDENTITY: &str = "x-remote-user";

struct Call {
    method: Method,
    uri: String,
    user: Option<String>,
    referer: Option<String>,
    body: Option<String>,
}

impl Call {
    fn get(uri: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            uri: uri.into(),
            user: None,
            referer: None,
            body: None,
        }
    }

    fn post(uri: impl Into<String>, body: Value) -> Self {
        Self::post_raw(uri, &body.to_string())
    }

    fn post_raw(uri: impl Into<String>, body: &str) -> Self {
        Self {
            method: Method::POST,
            body: Some(body.to_string()),
            ..Self::get(uri)
        }
    }

    fn delete(uri: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            ..Self::get(uri)
        }
    }

    fn as_user(mut self, username: &str) -> Self {
        self.user = Some(username.to_string());
        self
    }

    fn referer(mut self, referer: &str) -> Self {
        self.referer = Some(referer.to_string());
        self
    }

    async fn send(self, router: &Router) -> (StatusCode, axum::http::HeaderMap, Value) {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        if let Some(user) = self.user {
            builder = builder.header(IDENTITY, user);
        }
        if let Some(referer) = self.referer {
            builder = builder.header(header::REFERER, referer);
        }
        let request = match self.body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, headers, body)
    }
}

fn location(headers: &axum::http::HeaderMap) -> &str {
    headers
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

async fn router(ttl: Duration) -> (TestApp, Router) {
    let app = TestApp::with_ttl(ttl).await;
    let router = create_router(app.state.clone());
    (app, router)
}

#[tokio::test]
async fn index_serves_first_page_and_likes_only_for_viewers() {
    let (app, router) = router(Duration::ZERO).await;
    let alice = app.user("alice").await;
    app.user("bob").await;
    app.posts(&alice, 12).await;

    let (status, _, body) = Call::get("/?page=2").send(&router).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject"]["kind"], "global");
    assert_eq!(body["page"]["number"], 2);
    assert_eq!(body["page"]["items"].as_array().unwrap().len(), 2);
    assert!(body["page"]["items"][0].get("liked").is_none());

    let (_, _, body) = Call::get("/?page=nonsense").as_user("bob").send(&router).await;
    assert_eq!(body["page"]["number"], 1);
    assert_eq!(body["page"]["items"][0]["liked"], false);
}

#[tokio::test]
async fn cached_global_feed_is_annotated_per_viewer() {
    let (app, router) = router(Duration::from_secs(20)).await;
    let alice = app.user("alice").await;
    app.user("bob").await;
    let post = app.post_at(&alice, "popular", None, at_second(1)).await;

    let (_, _, anonymous) = Call::get("/").send(&router).await;
    assert!(anonymous["page"]["items"][0].get("liked").is_none());

    let like = format!("/alice/{}/like", post.id);
    let (status, _, _) = Call::post(like, json!({})).as_user("bob").send(&router).await;
    assert_eq!(status, StatusCode::SEE_OTHER);

    let (_, _, bob_view) = Call::get("/").as_user("bob").send(&router).await;
    assert_eq!(bob_view["page"]["items"][0]["liked"], true);
    // Counts come from the cached page.
    assert_eq!(bob_view["page"]["items"][0]["like_count"], 0);

    let (_, _, again) = Call::get("/").send(&router).await;
    assert!(again["page"]["items"][0].get("liked").is_none());
}

#[tokio::test]
async fn follow_feed_requires_identity() {
    let (app, router) = router(Duration::ZERO).await;
    app.user("alice").await;

    let (status, _, body) = Call::get("/follow").send(&router).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);

    // Unknown identities are anonymous.
    let (status, _, _) = Call::get("/follow").as_user("mallory").send(&router).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = Call::get("/follow").as_user("alice").send(&router).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject"]["kind"], "following");
    assert_eq!(body["page"]["total_pages"], 1);
}

#[tokio::test]
async fn new_post_redirects_or_echoes_errors() {
    let (app, router) = router(Duration::ZERO).await;
    app.user("alice").await;

    let (status, headers, _) = Call::post("/new", json!({"text": "hello"}))
        .as_user("alice")
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/");

    let (status, _, body) = Call::post("/new", json!({"text": "", "group": 99}))
        .as_user("alice")
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["form"]["group"], 99);
    assert!(body["errors"]["text"].is_array());
    assert!(body["errors"]["group"].is_array());

    let (status, _, _) = Call::post("/new", json!({"text": "hi"})).send(&router).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn non_author_edit_redirects_to_the_post() {
    let (app, router) = router(Duration::ZERO).await;
    let alice = app.user("alice").await;
    app.user("bob").await;
    let post = app.post_at(&alice, "original", None, at_second(1)).await;
    let edit = format!("/alice/{}/edit", post.id);

    let (status, headers, _) = Call::post(edit.clone(), json!({"text": "defaced"}))
        .as_user("bob")
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), format!("/alice/{}", post.id));

    let (_, _, detail) = Call::get(format!("/alice/{}", post.id)).send(&router).await;
    assert_eq!(detail["post"]["text"], "original");

    let (status, _, _) = Call::post(edit, json!({"text": "revised"}))
        .as_user("alice")
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let (_, _, detail) = Call::get(format!("/alice/{}", post.id)).send(&router).await;
    assert_eq!(detail["post"]["text"], "revised");
}

#[tokio::test]
async fn comments_redirect_even_when_invalid() {
    let (app, router) = router(Duration::ZERO).await;
    let alice = app.user("alice").await;
    app.user("bob").await;
    let post = app.post_at(&alice, "discuss", None, at_second(1)).await;
    let comment = format!("/alice/{}/comment", post.id);

    for text in ["nice", ""] {
        let (status, headers, _) = Call::post(comment.clone(), json!({"text": text}))
            .as_user("bob")
            .send(&router)
            .await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location(&headers), format!("/alice/{}", post.id));
    }

    let (_, _, detail) = Call::get(format!("/alice/{}", post.id)).send(&router).await;
    assert_eq!(detail["comments"].as_array().unwrap().len(), 1);

    let (status, _, _) = Call::post("/bob/1/comment", json!({"text": "x"}))
        .as_user("bob")
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn follow_and_like_redirects() {
    let (app, router) = router(Duration::ZERO).await;
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let post = app.post_at(&alice, "hi", None, at_second(1)).await;

    let (status, headers, _) = Call::post("/alice/follow", json!({}))
        .as_user("bob")
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/alice");
    assert!(app.state.relationships.is_following(bob.id, alice.id).await.unwrap());

    let (_, _, profile) = Call::get("/alice").as_user("bob").send(&router).await;
    assert_eq!(profile["following"], true);
    assert_eq!(profile["follower_count"], 1);

    let (status, headers, _) = Call::post(format!("/alice/{}/like", post.id), json!({}))
        .as_user("bob")
        .referer("/group/cats?page=2")
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), "/group/cats?page=2");

    let (_, headers, _) = Call::post(format!("/alice/{}/unlike", post.id), json!({}))
        .as_user("bob")
        .send(&router)
        .await;
    assert_eq!(location(&headers), format!("/alice/{}", post.id));
    assert!(!app.state.relationships.is_liking(bob.id, post.id).await.unwrap());

    let (_, headers, _) = Call::post("/alice/unfollow", json!({}))
        .as_user("bob")
        .send(&router)
        .await;
    assert_eq!(location(&headers), "/alice");

    let (status, _, _) = Call::post("/nobody/follow", json!({}))
        .as_user("bob")
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_paths_and_entities_are_not_found() {
    let (app, router) = router(Duration::ZERO).await;
    app.user("alice").await;

    let (status, _, body) = Call::get("/a/b/c/d").send(&router).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["path"], "/a/b/c/d");

    for uri in ["/ghost", "/group/nope", "/alice/123", "/alice/abc", "/media/posts/1"] {
        let (status, _, _) = Call::get(uri).send(&router).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn admin_endpoints_manage_users_and_groups() {
    let (app, router) = router(Duration::ZERO).await;
    let alice = app.user("alice").await;

    let (status, _, body) = Call::post("/admin/users", json!({"username": "bob"}))
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "bob");

    let (status, _, body) = Call::post("/admin/users", json!({"username": "bob"}))
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["errors"]["username"].is_array());

    let (status, _, body) = Call::post(
        "/admin/groups",
        json!({"title": "Cats", "slug": "cats", "description": "meow"}),
    )
    .send(&router)
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["slug"], "cats");
    let cats = app.store.find_group("cats").await.unwrap().unwrap();
    let post = app.post_at(&alice, "cat", Some(&cats), at_second(1)).await;

    let (status, _, body) = Call::get("/group/cats").send(&router).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject"]["group"]["slug"], "cats");
    assert_eq!(body["page"]["items"][0]["id"], post.id.value());

    let (status, _, _) = Call::delete("/admin/groups/cats").send(&router).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _, _) = Call::get("/group/cats").send(&router).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn images_are_served_with_their_content_type() {
    let (app, router) = router(Duration::ZERO).await;
    app.user("alice").await;
    let gif = "R0lGODlhAQABAAAAACw=";

    let (status, _, _) = Call::post("/new", json!({"text": "pic", "image": gif}))
        .as_user("alice")
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);

    let (_, _, feed) = Call::get("/").send(&router).await;
    let url = feed["page"]["items"][0]["image_url"].as_str().unwrap().to_string();

    let response = router
        .clone()
        .oneshot(Request::builder().uri(url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/gif");
}

#[tokio::test]
async fn file_backed_store_persists_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("nested/postboard.db").display());

    let store = SqliteStore::connect(&url, 4).await.unwrap();
    let state = AppState::with_store(Config::default(), Arc::new(store));
    state.admin.create_user("alice").await.unwrap();
    drop(state);

    let reopened = SqliteStore::connect(&url, 4).await.unwrap();
    let router = create_router(AppState::with_store(Config::default(), Arc::new(reopened)));
    let (status, _, body) = Call::get("/alice").send(&router).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["author"]["username"], "alice");
}

#[tokio::test]
async fn malformed_comment_bodies_still_redirect() {
    let (app, router) = router(Duration::ZERO).await;
    let alice = app.user("alice").await;
    app.user("bob").await;
    let post = app.post_at(&alice, "discuss", None, at_second(1)).await;
    let comment = format!("/alice/{}/comment", post.id);
    let back = format!("/alice/{}", post.id);

    let (status, headers, _) = Call::post(comment.clone(), json!({"text": 5}))
        .as_user("bob")
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), back);

    for call in [
        Call::post(comment.clone(), json!({"text": ["x"]})),
        Call::post(comment.clone(), json!("just a string")),
        Call::post_raw(comment.clone(), "{not json"),
    ] {
        let (status, headers, _) = call.as_user("bob").send(&router).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location(&headers), back);
    }

    let (_, _, detail) = Call::get(back).send(&router).await;
    let comments = detail["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["text"], "5");
}

#[tokio::test]
async fn malformed_post_forms_come_back_with_field_errors() {
    let (app, router) = router(Duration::ZERO).await;
    let alice = app.user("alice").await;
    app.user("bob").await;
    let post = app.post_at(&alice, "original", None, at_second(1)).await;

    let (status, _, body) = Call::post("/new", json!({"text": "hi", "group": "abc"}))
        .as_user("alice")
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["form"]["group"], "abc");
    assert!(body["errors"]["group"].is_array());

    let (status, _, body) = Call::post_raw("/new", "{not json")
        .as_user("alice")
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["errors"]["__all__"].is_array());

    let edit = format!("/alice/{}/edit", post.id);
    let (status, _, body) = Call::post(edit.clone(), json!({"text": ["x"]}))
        .as_user("alice")
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["errors"]["text"].is_array());

    let (status, headers, _) = Call::post(edit, json!({"text": ["x"]}))
        .as_user("bob")
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location(&headers), format!("/alice/{}", post.id));

    let (_, _, detail) = Call::get(format!("/alice/{}", post.id)).send(&router).await;
    assert_eq!(detail["post"]["text"], "original");
}

#[tokio::test]
async fn malformed_admin_forms_come_back_with_field_errors() {
    let (_app, router) = router(Duration::ZERO).await;

    let (status, _, body) = Call::post("/admin/users", json!({"username": ["bob"]}))
        .send(&router)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["errors"]["username"].is_array());

    let (status, _, body) = Call::post_raw("/admin/groups", "[]").send(&router).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["errors"]["__all__"].is_array());
}
