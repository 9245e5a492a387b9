//! Router-level tests driving the full middleware stack

use super::*;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
};
use chrono::{Duration, Utc};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::config::Config;
use crate::db::{create_test_pool, migrations};
use crate::models::{CreateCategoryInput, CreatePostInput, Post, User};
use crate::services::{LoginInput, RegisterInput};
use crate::theme::ThemeEngine;

const PASSWORD: &str = "s3cret-pass";
const BOUNDARY: &str = "blogicum-test-boundary";

struct TestApp {
    router: Router,
    state: AppState,
    _media: TempDir,
}

struct Member {
    user: User,
    cookie: String,
}

async fn setup() -> TestApp {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let media = TempDir::new().unwrap();
    let mut config = Config::default();
    config.media.path = media.path().to_path_buf();
    config.blog.posts_per_page = 2;

    let state = AppState::new(pool, config, ThemeEngine::embedded().unwrap());
    TestApp {
        router: build_router(state.clone()),
        state,
        _media: media,
    }
}

impl TestApp {
    async fn member(&self, username: &str) -> Member {
        let user = self
            .state
            .user_service
            .register(RegisterInput::new(username, "", PASSWORD))
            .await
            .unwrap();
        let (_, session) = self
            .state
            .user_service
            .login(LoginInput::new(username, PASSWORD))
            .await
            .unwrap();
        Member {
            user,
            cookie: format!("session={}", session.id),
        }
    }

    async fn post(
        &self,
        author: &Member,
        title: &str,
        build: impl FnOnce(CreatePostInput) -> CreatePostInput,
    ) -> Post {
        let pub_date = Utc::now() - Duration::hours(1);
        let input = build(CreatePostInput::new(title, "Some text", pub_date));
        self.state.post_service.create(author.user.id, input).await.unwrap()
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, member: Option<&Member>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(member) = member {
            builder = builder.header(header::COOKIE, &member.cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, member: Option<&Member>, body: &str) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(member) = member {
            builder = builder.header(header::COOKIE, &member.cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn post_multipart(
        &self,
        uri: &str,
        member: &Member,
        fields: &[(&str, &str)],
    ) -> Response {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            ));
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));

        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .header(header::COOKIE, &member.cookie)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn api(
        &self,
        method: &str,
        uri: &str,
        member: Option<&Member>,
        json: Option<serde_json::Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(member) = member {
            builder = builder.header(header::COOKIE, &member.cookie);
        }
        let body = match json {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

// ============================================================================
// Listings
// ============================================================================

#[tokio::test]
async fn test_index_lists_only_visible_posts() {
    let app = setup().await;
    let anna = app.member("anna").await;
    app.post(&anna, "Visible post", |i| i).await;
    app.post(&anna, "Draft post", |i| i.with_published(false)).await;
    app.post(&anna, "Scheduled post", |mut i| {
        i.pub_date = Utc::now() + Duration::days(1);
        i
    })
    .await;

    let response = app.get("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Visible post"));
    assert!(!html.contains("Draft post"));
    assert!(!html.contains("Scheduled post"));
}

#[tokio::test]
async fn test_category_page_shows_only_published_past_posts() {
    let app = setup().await;
    let anna = app.member("anna").await;
    let news = app
        .state
        .category_service
        .create(CreateCategoryInput::new("News", "news"))
        .await
        .unwrap();
    app.post(&anna, "Post A", |i| i.with_category(news.id)).await;
    app.post(&anna, "Post B", |mut i| {
        i.pub_date = Utc::now() + Duration::days(2);
        i.with_category(news.id)
    })
    .await;

    let response = app.get("/category/news/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Post A"));
    assert!(!html.contains("Post B"));

    assert_eq!(
        app.get("/category/missing/", None).await.status(),
        StatusCode::NOT_FOUND
    );

    app.state
        .category_service
        .create(CreateCategoryInput::new("Hidden", "hidden").with_published(false))
        .await
        .unwrap();
    assert_eq!(
        app.get("/category/hidden/", None).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_public_listings_hide_authors_own_drafts() {
    let app = setup().await;
    let anna = app.member("anna").await;
    let news = app
        .state
        .category_service
        .create(CreateCategoryInput::new("News", "news"))
        .await
        .unwrap();
    app.post(&anna, "Post A", |i| i.with_category(news.id)).await;
    app.post(&anna, "Draft post", |i| i.with_published(false)).await;
    app.post(&anna, "Post B", |mut i| {
        i.pub_date = Utc::now() + Duration::days(2);
        i.with_category(news.id)
    })
    .await;

    let html = body_text(app.get("/", Some(&anna)).await).await;
    assert!(html.contains("Post A"));
    assert!(!html.contains("Draft post"));
    assert!(!html.contains("Post B"));

    let html = body_text(app.get("/category/news/", Some(&anna)).await).await;
    assert!(html.contains("Post A"));
    assert!(!html.contains("Post B"));

    // the profile still shows them to their author
    let html = body_text(app.get("/profile/anna/", Some(&anna)).await).await;
    assert!(html.contains("Draft post"));
    assert!(html.contains("Post B"));
}

#[tokio::test]
async fn test_pages_past_the_end_are_not_found() {
    let app = setup().await;
    let anna = app.member("anna").await;
    for n in 0..3 {
        app.post(&anna, &format!("Post {}", n), |i| i).await;
    }

    assert_eq!(app.get("/?page=2", None).await.status(), StatusCode::OK);
    assert_eq!(app.get("/?page=3", None).await.status(), StatusCode::NOT_FOUND);
    // garbage is the first page
    assert_eq!(app.get("/?page=abc", None).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_not_found_uses_error_template() {
    let app = setup().await;
    let response = app.get("/no/such/page/", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let html = body_text(response).await;
    assert!(html.contains("Page not found"));
    assert!(html.contains("/auth/login/"));
}

// ============================================================================
// Post detail and mutations
// ============================================================================

#[tokio::test]
async fn test_detail_of_draft_visible_to_author_only() {
    let app = setup().await;
    let anna = app.member("anna").await;
    let boris = app.member("boris").await;
    let draft = app.post(&anna, "Secret draft", |i| i.with_published(false)).await;
    let uri = format!("/posts/{}/", draft.id);

    let response = app.get(&uri, Some(&anna)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Secret draft"));

    assert_eq!(app.get(&uri, Some(&boris)).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get(&uri, None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/posts/999/", None).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/posts/abc/", None).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_post_requires_login() {
    let app = setup().await;
    let response = app.get("/posts/create/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login/?next=%2Fposts%2Fcreate%2F");
}

#[tokio::test]
async fn test_create_post_redirects_to_profile() {
    let app = setup().await;
    let anna = app.member("anna").await;

    let response = app.get("/posts/create/", Some(&anna)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .post_multipart(
            "/posts/create/",
            &anna,
            &[
                ("title", "Fresh post"),
                ("text", "Hello there"),
                ("pub_date", "2024-01-01T10:00"),
                ("category", ""),
                ("location", ""),
                ("is_published", "on"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/anna/");

    let posts = app.state.post_service.list_published(1).await.unwrap();
    assert_eq!(posts.items.len(), 1);
    assert_eq!(posts.items[0].post.title, "Fresh post");
    assert_eq!(posts.items[0].post.author_id, anna.user.id);
}

#[tokio::test]
async fn test_invalid_post_form_is_rerendered() {
    let app = setup().await;
    let anna = app.member("anna").await;

    let response = app
        .post_multipart(
            "/posts/create/",
            &anna,
            &[("title", "No date"), ("text", "Body"), ("pub_date", "")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_text(response).await;
    assert!(html.contains("Enter a valid publication date and time"));
    assert!(html.contains("No date"));
}

#[tokio::test]
async fn test_non_author_cannot_edit_or_delete_post() {
    let app = setup().await;
    let anna = app.member("anna").await;
    let boris = app.member("boris").await;
    let post = app.post(&anna, "Anna's post", |i| i).await;
    let detail = format!("/posts/{}/", post.id);

    let response = app.get(&format!("/posts/{}/edit/", post.id), Some(&boris)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), detail);

    let response = app
        .post_multipart(
            &format!("/posts/{}/edit/", post.id),
            &boris,
            &[("title", "Hijacked"), ("text", "x"), ("pub_date", "2024-01-01T10:00")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), detail);

    let response = app
        .post_form(&format!("/posts/{}/delete/", post.id), Some(&boris), "")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), detail);

    let unchanged = app.state.post_service.get_by_id(post.id).await.unwrap().unwrap();
    assert_eq!(unchanged.title, post.title);
    assert_eq!(unchanged.text, post.text);
}

#[tokio::test]
async fn test_author_edits_and_deletes_post() {
    let app = setup().await;
    let anna = app.member("anna").await;
    let post = app.post(&anna, "Before", |i| i).await;

    let response = app
        .post_multipart(
            &format!("/posts/{}/edit/", post.id),
            &anna,
            &[
                ("title", "After"),
                ("text", "New text"),
                ("pub_date", "2024-01-01T10:00"),
                ("is_published", "on"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));
    let edited = app.state.post_service.get_by_id(post.id).await.unwrap().unwrap();
    assert_eq!(edited.title, "After");

    let response = app.get(&format!("/posts/{}/delete/", post.id), Some(&anna)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("After"));

    let response = app
        .post_form(&format!("/posts/{}/delete/", post.id), Some(&anna), "")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    assert!(app.state.post_service.get_by_id(post.id).await.unwrap().is_none());
}

// ============================================================================
// Comments
// ============================================================================

#[tokio::test]
async fn test_comment_flow() {
    let app = setup().await;
    let anna = app.member("anna").await;
    let boris = app.member("boris").await;
    let post = app.post(&anna, "Discuss", |i| i).await;
    let comment_uri = format!("/posts/{}/comment/", post.id);

    let response = app.post_form(&comment_uri, None, "text=hi").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/auth/login/?next="));

    let response = app.post_form(&comment_uri, Some(&boris), "text=First+comment").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));

    let comments = app.state.comment_service.list_for_post(post.id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].comment.author_id, boris.user.id);
    let comment_id = comments[0].comment.id;

    let html = body_text(app.get(&format!("/posts/{}/", post.id), None).await).await;
    assert!(html.contains("First comment"));

    // only boris may touch his comment
    let response = app
        .post_form(&format!("/comments/{}/edit/", comment_id), Some(&anna), "text=changed")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));
    let stored = app.state.comment_service.get_by_id(comment_id).await.unwrap().unwrap();
    assert_eq!(stored.text, "First comment");

    let response = app
        .post_form(&format!("/comments/{}/edit/", comment_id), Some(&boris), "text=")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_form(&format!("/comments/{}/edit/", comment_id), Some(&boris), "text=Edited")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app
        .post_form(&format!("/comments/{}/delete/", comment_id), Some(&boris), "")
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(app.state.comment_service.get_by_id(comment_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_empty_comment_rerenders_detail_with_error() {
    let app = setup().await;
    let anna = app.member("anna").await;
    let boris = app.member("boris").await;
    let post = app.post(&anna, "Discuss", |i| i).await;

    let response = app
        .post_form(&format!("/posts/{}/comment/", post.id), Some(&boris), "text=")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_text(response).await;
    assert!(html.contains("Discuss"));
    assert!(html.contains("Comment cannot be empty"));
    assert!(app.state.comment_service.list_for_post(post.id).await.unwrap().is_empty());

    let response = app.post_form("/posts/999/comment/", Some(&boris), "text=").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comment_on_missing_post_is_not_found() {
    let app = setup().await;
    let anna = app.member("anna").await;
    let response = app.post_form("/posts/999/comment/", Some(&anna), "text=hi").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Profiles
// ============================================================================

#[tokio::test]
async fn test_profile_shows_drafts_to_owner_only() {
    let app = setup().await;
    let anna = app.member("anna").await;
    let boris = app.member("boris").await;
    app.post(&anna, "Public one", |i| i).await;
    app.post(&anna, "Private one", |i| i.with_published(false)).await;

    let html = body_text(app.get("/profile/anna/", Some(&anna)).await).await;
    assert!(html.contains("Public one"));
    assert!(html.contains("Private one"));
    assert!(html.contains("Edit profile"));

    let html = body_text(app.get("/profile/anna/", Some(&boris)).await).await;
    assert!(html.contains("Public one"));
    assert!(!html.contains("Private one"));

    assert_eq!(app.get("/profile/nobody/", None).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_edit() {
    let app = setup().await;
    let anna = app.member("anna").await;
    let boris = app.member("boris").await;

    assert_eq!(
        app.get("/profile/anna/edit/", Some(&boris)).await.status(),
        StatusCode::FORBIDDEN
    );

    let response = app
        .post_form(
            "/profile/anna/edit/",
            Some(&anna),
            "username=anna_k&first_name=Anna&last_name=K&email=anna%40example.com",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/anna_k/");

    let user = app.state.user_service.get_by_username("anna_k").await.unwrap();
    assert_eq!(user.first_name, "Anna");

    let response = app
        .post_form("/profile/anna_k/edit/", Some(&anna), "username=boris")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_registration_login_logout() {
    let app = setup().await;

    let response = app
        .post_form(
            "/auth/registration/",
            None,
            "username=carol&email=&password1=s3cret-pass&password2=other-pass",
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_form(
            "/auth/registration/",
            None,
            "username=carol&email=&password1=s3cret-pass&password2=s3cret-pass",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login/");

    let response = app
        .post_form("/auth/login/", None, "username=carol&password=wrong-pass&next=%2F")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_form(
            "/auth/login/",
            None,
            "username=carol&password=s3cret-pass&next=%2Fposts%2Fcreate%2F",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/posts/create/");
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    assert!(cookie.starts_with("session="));

    let carol = Member {
        user: app.state.user_service.get_by_username("carol").await.unwrap(),
        cookie,
    };
    assert_eq!(app.get("/posts/create/", Some(&carol)).await.status(), StatusCode::OK);

    let response = app.post_form("/auth/logout/", Some(&carol), "").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));

    // the old token no longer works
    assert_eq!(
        app.get("/posts/create/", Some(&carol)).await.status(),
        StatusCode::SEE_OTHER
    );
}

#[tokio::test]
async fn test_login_ignores_offsite_next() {
    let app = setup().await;
    app.member("dave").await;
    let response = app
        .post_form(
            "/auth/login/",
            None,
            "username=dave&password=s3cret-pass&next=%2F%2Fevil.example",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

// ============================================================================
// Admin API
// ============================================================================

#[tokio::test]
async fn test_admin_api_guards() {
    let app = setup().await;
    let _admin = app.member("admin").await;
    let anna = app.member("anna").await;

    let response = app.api("GET", "/api/v1/admin/categories", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let response = app.api("GET", "/api/v1/admin/categories", Some(&anna), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_manages_categories_and_posts() {
    let app = setup().await;
    let admin = app.member("admin").await;
    let anna = app.member("anna").await;

    let response = app
        .api(
            "POST",
            "/api/v1/admin/categories",
            Some(&admin),
            Some(serde_json::json!({"title": "Travel", "slug": "travel"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let category: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    let category_id = category["id"].as_i64().unwrap();

    let response = app
        .api(
            "POST",
            "/api/v1/admin/categories",
            Some(&admin),
            Some(serde_json::json!({"title": "Again", "slug": "travel"})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let post = app.post(&anna, "Trip report", |i| i.with_category(category_id)).await;

    let response = app
        .api("GET", "/api/v1/admin/posts?search=trip", Some(&admin), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let list: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(list["total"], 1);
    assert_eq!(list["items"][0]["category"], "Travel");

    let response = app
        .api(
            "PUT",
            &format!("/api/v1/admin/posts/{}", post.id),
            Some(&admin),
            Some(serde_json::json!({"is_published": false})),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let hidden = app.state.post_service.get_by_id(post.id).await.unwrap().unwrap();
    assert!(!hidden.meta.is_published);
    assert_eq!(hidden.category_id, Some(category_id));

    let response = app
        .api(
            "DELETE",
            &format!("/api/v1/admin/categories/{}", category_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // the post survives without a category
    let orphan = app.state.post_service.get_by_id(post.id).await.unwrap().unwrap();
    assert_eq!(orphan.category_id, None);

    let response = app.api("GET", "/api/v1/admin/users", Some(&admin), None).await;
    let users: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(users["total"], 2);
    let roles: Vec<_> = users["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| (u["username"].as_str().unwrap(), u["role"].as_str().unwrap()))
        .collect();
    assert!(roles.contains(&("admin", "admin")));
    assert!(roles.contains(&("anna", "author")));
}
