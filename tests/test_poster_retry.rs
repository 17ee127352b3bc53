//! Retry behavior of the reply poster, run on tokio's paused clock

use nbviewerbot::bot::{PostError, ReplyPoster, RetryPolicy};
use nbviewerbot::testing::MockTransport;
use nbviewerbot::transport::TransportError;
use nbviewerbot::DiscussionItem;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn default_poster(transport: Arc<MockTransport>) -> ReplyPoster<MockTransport> {
    ReplyPoster::new(transport, RetryPolicy::default())
}

#[tokio::test(start_paused = true)]
async fn test_always_transient_gives_up_after_five_attempts() {
    let transport = Arc::new(MockTransport::new().always_fail(TransportError::Server {
        status: 503,
        message: "Service Unavailable".into(),
    }));
    let poster = default_poster(transport.clone());

    let result = poster
        .post(&DiscussionItem::comment("abc", ""), "reply text")
        .await;

    match result {
        Err(PostError::PostFailed {
            attempts,
            last_error,
        }) => {
            assert_eq!(attempts, 5);
            assert!(last_error.is_transient());
        }
        other => panic!("expected PostFailed, got {other:?}"),
    }

    let calls = transport.calls();
    assert_eq!(calls.len(), 5);

    let gaps: Vec<Duration> = calls
        .windows(2)
        .map(|pair| pair[1].at.duration_since(pair[0].at))
        .collect();
    for pair in gaps.windows(2) {
        assert!(pair[1] > pair[0], "waits must strictly increase: {gaps:?}");
    }
    assert_eq!(gaps[0], Duration::from_secs(1));
    assert_eq!(gaps[3], Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_wait_is_honoured() {
    let transport = Arc::new(MockTransport::new());
    transport.push_result(Err(TransportError::RateLimited {
        retry_after: Some(Duration::from_secs(30)),
    }));
    let poster = default_poster(transport.clone());

    let reply = poster
        .post(&DiscussionItem::comment("abc", ""), "reply text")
        .await
        .unwrap();

    assert_eq!(reply.id, "reply2");
    let calls = transport.calls();
    assert_eq!(calls[1].at.duration_since(calls[0].at), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_is_immediate() {
    let transport = Arc::new(MockTransport::new());
    transport.push_result(Err(TransportError::PermissionDenied("banned".into())));
    let poster = default_poster(transport.clone());

    let result = poster
        .post(&DiscussionItem::comment("abc", ""), "reply text")
        .await;

    assert!(matches!(result, Err(PostError::PermissionDenied { .. })));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejection_is_not_retried() {
    let transport = Arc::new(MockTransport::new());
    transport.push_result(Err(TransportError::Rejected("DELETED_COMMENT".into())));
    let poster = default_poster(transport.clone());

    let result = poster
        .post(&DiscussionItem::comment("abc", ""), "reply text")
        .await;

    assert!(matches!(result, Err(PostError::Rejected(_))));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_backoff_gives_up_at_once() {
    let transport = Arc::new(MockTransport::new().always_fail(TransportError::RateLimited {
        retry_after: Some(Duration::from_secs(540)),
    }));
    let stop = CancellationToken::new();
    let poster = default_poster(transport.clone()).with_stop_token(stop.clone());

    let canceller = {
        let stop = stop.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            stop.cancel();
        })
    };

    let started = tokio::time::Instant::now();
    let result = poster
        .post(&DiscussionItem::comment("abc", ""), "reply text")
        .await;
    canceller.await.unwrap();

    match result {
        Err(PostError::PostFailed { attempts, .. }) => assert_eq!(attempts, 1),
        other => panic!("expected PostFailed, got {other:?}"),
    }
    assert_eq!(transport.call_count(), 1);
    assert!(started.elapsed() < Duration::from_secs(3));
}
