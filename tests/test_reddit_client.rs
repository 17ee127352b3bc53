//! Reddit client against a mock HTTP server
//!
//! Covers token handling, reply posting and error classification, and the
//! polling stream's ordering and repeat filtering.

use nbviewerbot::config::RedditCredentials;
use nbviewerbot::transport::reddit::{RedditClient, RedditStream};
use nbviewerbot::transport::{ItemSource, Transport, TransportError};
use nbviewerbot::{DiscussionItem, ItemKind};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> RedditCredentials {
    RedditCredentials {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        username: "nbviewerbot".to_string(),
        password: "hunter2".to_string(),
    }
}

fn client(server: &MockServer) -> RedditClient {
    RedditClient::new(credentials(), "rust:nbviewerbot:test", Duration::from_secs(5))
        .unwrap()
        .with_base_urls(server.uri(), server.uri())
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "token_type": "bearer",
            "expires_in": 86400,
            "scope": "*"
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn comment_child(id: &str, body_html: &str) -> serde_json::Value {
    json!({"kind": "t1", "data": {
        "id": id,
        "name": format!("t1_{id}"),
        "subreddit": "testingground4bots",
        "body_html": body_html
    }})
}

fn listing(children: Vec<serde_json::Value>) -> serde_json::Value {
    json!({"kind": "Listing", "data": {"after": null, "children": children}})
}

#[tokio::test]
async fn test_authenticate_reuses_cached_token() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/me"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "nbviewerbot"})))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(client.authenticate().await.unwrap(), "nbviewerbot");
    assert_eq!(client.authenticate().await.unwrap(), "nbviewerbot");
}

#[tokio::test]
async fn test_bad_password_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;

    let result = client(&server).authenticate().await;
    assert_eq!(result, Err(TransportError::Auth("invalid_grant".to_string())));
}

#[tokio::test]
async fn test_reply_posts_to_item_fullname() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/comment"))
        .and(body_string_contains("thing_id=t3_abc123"))
        .and(body_string_contains("api_type=json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "json": {"errors": [], "data": {"things": [
                {"kind": "t1", "data": {"id": "e9xyz", "name": "t1_e9xyz"}}
            ]}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let item = DiscussionItem::submission("abc123", "", None);
    let reply = client(&server).reply(&item, "hello").await.unwrap();

    assert_eq!(reply.id, "e9xyz");
    assert_eq!(reply.fullname, "t1_e9xyz");
}

#[tokio::test]
async fn test_reply_ratelimit_error_is_transient() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/comment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "json": {"errors": [
                ["RATELIMIT", "you are doing that too much. try again in 4 minutes.", "ratelimit"]
            ]}
        })))
        .mount(&server)
        .await;

    let error = client(&server)
        .reply(&DiscussionItem::comment("abc", ""), "hello")
        .await
        .unwrap_err();

    assert!(error.is_transient());
    assert_eq!(error.retry_after(), Some(Duration::from_secs(240)));
}

#[tokio::test]
async fn test_reply_http_errors_are_classified() {
    let cases = [
        (ResponseTemplate::new(403).set_body_string("Forbidden"), "permission"),
        (ResponseTemplate::new(503).set_body_string("unavailable"), "server"),
        (
            ResponseTemplate::new(429).insert_header("Retry-After", "7"),
            "ratelimit",
        ),
    ];

    for (template, expected) in cases {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/comment"))
            .respond_with(template)
            .mount(&server)
            .await;

        let error = client(&server)
            .reply(&DiscussionItem::comment("abc", ""), "hello")
            .await
            .unwrap_err();

        match expected {
            "permission" => assert!(matches!(error, TransportError::PermissionDenied(_))),
            "server" => assert!(matches!(error, TransportError::Server { status: 503, .. })),
            _ => assert_eq!(
                error,
                TransportError::RateLimited {
                    retry_after: Some(Duration::from_secs(7))
                }
            ),
        }
    }
}

#[tokio::test]
async fn test_stream_yields_oldest_first_without_repeats() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    // First poll: newest first, as Reddit returns them
    Mock::given(method("GET"))
        .and(path("/r/bottest+testingground4bots/comments"))
        .and(query_param("raw_json", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![
            comment_child("b", "<p>second</p>"),
            comment_child("a", "<p>first</p>"),
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    // Later polls repeat the old items with one new one on top
    Mock::given(method("GET"))
        .and(path("/r/bottest+testingground4bots/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![
            comment_child("c", "<p>third</p>"),
            comment_child("b", "<p>second</p>"),
            comment_child("a", "<p>first</p>"),
        ])))
        .mount(&server)
        .await;

    let client = Arc::new(client(&server));
    let subs = vec!["bottest".to_string(), "testingground4bots".to_string()];
    let mut stream = RedditStream::comments(client, &subs)
        .with_poll_delays(Duration::from_millis(1), Duration::from_millis(4));
    assert_eq!(stream.name(), "comments");

    let mut ids = Vec::new();
    for _ in 0..3 {
        let item = tokio::time::timeout(Duration::from_secs(5), stream.next_item())
            .await
            .expect("stream should produce an item")
            .unwrap()
            .unwrap();
        assert_eq!(item.kind, ItemKind::Comment);
        assert_eq!(item.subreddit.as_deref(), Some("testingground4bots"));
        ids.push(item.id);
    }
    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_stream_gives_up_after_persistent_failures() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/r/all/new"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut stream = RedditStream::submissions(Arc::new(client(&server)), &["all".to_string()])
        .with_poll_delays(Duration::from_millis(1), Duration::from_millis(2));

    let result = tokio::time::timeout(Duration::from_secs(5), stream.next_item())
        .await
        .expect("stream should fail");
    assert!(matches!(result, Err(TransportError::Server { status: 500, .. })));
}

#[tokio::test]
async fn test_stream_recovers_from_expired_token() {
    let server = MockServer::start().await;
    // One token for the first poll, a second after the 401
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "expires_in": 86400
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/Python/comments"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/Python/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![comment_child(
            "a",
            "<p>first</p>",
        )])))
        .mount(&server)
        .await;

    let mut stream = RedditStream::comments(Arc::new(client(&server)), &["Python".to_string()])
        .with_poll_delays(Duration::from_millis(1), Duration::from_millis(2));
    assert_eq!(stream.path(), "/r/Python/comments");

    let item = tokio::time::timeout(Duration::from_secs(5), stream.next_item())
        .await
        .expect("stream should recover")
        .unwrap()
        .unwrap();
    assert_eq!(item.id, "a");
}

#[tokio::test]
async fn test_stream_fails_when_fresh_token_is_also_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "expires_in": 86400
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/Python/new"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .expect(2)
        .mount(&server)
        .await;

    let mut stream = RedditStream::submissions(Arc::new(client(&server)), &["Python".to_string()]);

    let result = tokio::time::timeout(Duration::from_secs(5), stream.next_item())
        .await
        .expect("stream should fail");
    assert!(matches!(result, Err(TransportError::Auth(_))));
}
