use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, Response, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use commentary::application::comments::{CommentService, CommentSettings};
use commentary::infra::cache::ProcessCache;
use commentary::infra::http::{self, HttpState, USER_ID_HEADER};
use commentary::infra::memory::{MemoryCommentsRepo, MemoryImageStore};
use commentary_api_types::{
    ApiErrorBody, CommentListResponse, CommentResponse, CreateCommentResponse,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    router: Router,
    repo: MemoryCommentsRepo,
    images: MemoryImageStore,
}

fn app_with_page_size(page_size: u32) -> TestApp {
    let repo = MemoryCommentsRepo::new();
    let images = MemoryImageStore::new();
    let service = CommentService::new(
        Arc::new(repo.clone()),
        Arc::new(ProcessCache::new(
            NonZeroUsize::new(64).expect("non-zero capacity"),
        )),
        Arc::new(images.clone()),
        CommentSettings {
            page_size: NonZeroU32::new(page_size).expect("non-zero page size"),
            ..CommentSettings::default()
        },
    );

    TestApp {
        router: http::build_router(HttpState::new(Arc::new(service), None)),
        repo,
        images,
    }
}

fn app() -> TestApp {
    app_with_page_size(10)
}

impl TestApp {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<Uuid>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request should build");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }

    async fn create(&self, user: Uuid, tweet_id: Uuid, text: &str) -> Uuid {
        let response = self
            .send(
                Method::POST,
                "/api/v1/comments",
                Some(user),
                Some(json!({ "tweet_id": tweet_id, "text": text })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        read_json::<CreateCommentResponse>(response).await.comment_id
    }
}

async fn read_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should collect");
    serde_json::from_slice(&bytes).expect("body should be valid json")
}

async fn error_code(response: Response<Body>) -> String {
    read_json::<ApiErrorBody>(response).await.error.code
}

#[tokio::test]
async fn create_then_fetch_round_trips_through_the_api() {
    let app = app();
    let user = Uuid::new_v4();
    let tweet_id = Uuid::new_v4();

    let id = app.create(user, tweet_id, "hello there").await;

    let response = app
        .send(Method::GET, &format!("/api/v1/comments/{id}"), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let comment: CommentResponse = read_json(response).await;
    assert_eq!(comment.comment_id, id);
    assert_eq!(comment.tweet_id, tweet_id);
    assert_eq!(comment.user_id, user);
    assert_eq!(comment.text, "hello there");
    assert_eq!(comment.image_url, None);
}

#[tokio::test]
async fn create_with_image_returns_signed_url() {
    let app = app();
    let user = Uuid::new_v4();

    let response = app
        .send(
            Method::POST,
            "/api/v1/comments",
            Some(user),
            Some(json!({
                "tweet_id": Uuid::new_v4(),
                "text": "with a picture",
                "image": { "name": "cat.png", "data": STANDARD.encode(b"\x89PNG\r\n") },
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: CreateCommentResponse = read_json(response).await;

    let names = app.images.names().await;
    assert_eq!(names.len(), 1);
    let stored = app.images.get(&names[0]).await.expect("stored image");
    assert_eq!(stored.content_type, "image/png");
    assert_eq!(stored.data.as_ref(), b"\x89PNG\r\n");

    let response = app
        .send(
            Method::GET,
            &format!("/api/v1/comments/{}", created.comment_id),
            None,
            None,
        )
        .await;
    let comment: CommentResponse = read_json(response).await;
    let url = comment.image_url.expect("image url");
    assert!(url.contains(&names[0]));
}

#[tokio::test]
async fn missing_user_header_is_a_bad_request() {
    let app = app();
    let response = app
        .send(
            Method::POST,
            "/api/v1/comments",
            None,
            Some(json!({ "tweet_id": Uuid::new_v4(), "text": "anonymous" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "bad_request");
    assert!(app.repo.is_empty().await);
}

#[tokio::test]
async fn invalid_image_encoding_is_a_bad_request() {
    let app = app();
    let response = app
        .send(
            Method::POST,
            "/api/v1/comments",
            Some(Uuid::new_v4()),
            Some(json!({
                "tweet_id": Uuid::new_v4(),
                "text": "broken",
                "image": { "name": "cat.png", "data": "%%% not base64 %%%" },
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "bad_request");
    assert!(app.images.names().await.is_empty());
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = app();
    let response = app
        .send(
            Method::POST,
            "/api/v1/comments",
            Some(Uuid::new_v4()),
            Some(json!({ "text": "no tweet id" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "bad_request");
}

#[tokio::test]
async fn unknown_comment_is_not_found() {
    let app = app();
    let response = app
        .send(
            Method::GET,
            &format!("/api/v1/comments/{}", Uuid::new_v4()),
            None,
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(response).await, "not_found");
}

#[tokio::test]
async fn listing_pages_until_cursor_is_empty() {
    let app = app_with_page_size(2);
    let tweet_id = Uuid::new_v4();
    let user = Uuid::new_v4();

    let mut created = Vec::new();
    for n in 0..5 {
        created.push(app.create(user, tweet_id, &format!("comment {n}")).await);
    }
    app.create(user, Uuid::new_v4(), "elsewhere").await;

    let mut seen = Vec::new();
    let mut cursor = String::new();
    loop {
        let response = app
            .send(
                Method::GET,
                &format!("/api/v1/tweets/{tweet_id}/comments?cursor={cursor}"),
                None,
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let page: CommentListResponse = read_json(response).await;
        assert!(page.comments.len() <= 2);
        if page.comments.is_empty() {
            assert_eq!(page.cursor, "");
            break;
        }
        assert!(!page.cursor.is_empty());
        seen.extend(page.comments.iter().map(|comment| comment.comment_id));
        cursor = page.cursor;
    }

    let mut expected = created.clone();
    expected.sort();
    let mut sorted_seen = seen.clone();
    sorted_seen.sort();
    assert_eq!(sorted_seen, expected);
    assert_eq!(seen.len(), 5);
}

#[tokio::test]
async fn malformed_cursor_is_rejected() {
    let app = app();
    let response = app
        .send(
            Method::GET,
            &format!("/api/v1/tweets/{}/comments?cursor=not-a-cursor", Uuid::new_v4()),
            None,
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "invalid_cursor");
}

#[tokio::test]
async fn only_the_author_may_update_or_delete() {
    let app = app();
    let author = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let id = app.create(author, Uuid::new_v4(), "original").await;
    let uri = format!("/api/v1/comments/{id}");

    let response = app
        .send(
            Method::PATCH,
            &uri,
            Some(stranger),
            Some(json!({ "text": "defaced" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(response).await, "forbidden");

    let response = app.send(Method::DELETE, &uri, Some(stranger), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .send(
            Method::PATCH,
            &uri,
            Some(author),
            Some(json!({ "text": "edited" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: CommentResponse = read_json(response).await;
    assert_eq!(updated.text, "edited");

    let response = app.send(Method::GET, &uri, None, None).await;
    let fetched: CommentResponse = read_json(response).await;
    assert_eq!(fetched.text, "edited");

    let response = app.send(Method::DELETE, &uri, Some(author), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.send(Method::DELETE, &uri, Some(author), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.send(Method::GET, &uri, None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn storage_outage_maps_to_service_unavailable() {
    let app = app();
    app.repo.set_unavailable(true);

    let response = app
        .send(
            Method::POST,
            "/api/v1/comments",
            Some(Uuid::new_v4()),
            Some(json!({ "tweet_id": Uuid::new_v4(), "text": "lost" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_code(response).await, "storage_unavailable");
}

#[tokio::test]
async fn health_reports_no_content_on_memory_storage() {
    let app = app();
    let response = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
