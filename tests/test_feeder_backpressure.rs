//! Bounded queue backpressure: feeders block on a full queue and every
//! item still reaches the dispatcher exactly once


use nbviewerbot::bot::{FeederSet, MemoryReplyStore, ReplyStore};
use nbviewerbot::testing::{notebook_comments, MockTransport, ScriptedSource};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use test_helpers::mock_dispatcher;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_full_queue_blocks_feeders_then_drains_exactly_once() {
    let (tx, mut rx) = mpsc::channel(2);
    let stop = CancellationToken::new();

    let comments = ScriptedSource::new("comments", notebook_comments("c", 3)).then_pend();
    let submissions = ScriptedSource::new("submissions", notebook_comments("s", 3)).then_pend();
    let pulled = [comments.pulled(), submissions.pulled()];

    let mut feeders = FeederSet::new();
    feeders.spawn(comments, tx.clone(), stop.clone());
    feeders.spawn(submissions, tx.clone(), stop.clone());

    tokio::time::sleep(Duration::from_millis(50)).await;

    // Two items queued, each feeder holding one more while blocked on send
    assert_eq!(tx.capacity(), 0);
    let in_flight: usize = pulled.iter().map(|p| p.load(Ordering::SeqCst)).sum();
    assert_eq!(in_flight, 4);
    assert!(feeders.check().await.is_none(), "blocked feeders are alive");
    drop(tx);

    let transport = Arc::new(MockTransport::new());
    let mut dispatcher = mock_dispatcher(transport.clone(), MemoryReplyStore::new());

    let watcher = {
        let transport = transport.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            while transport.call_count() < 6 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            stop.cancel();
        })
    };

    tokio::time::timeout(
        Duration::from_secs(5),
        dispatcher.run(&mut rx, &mut feeders, &stop),
    )
    .await
    .expect("dispatcher should stop once all items are handled")
    .unwrap();
    watcher.await.unwrap();

    let ids = transport.replied_ids();
    assert_eq!(ids.len(), 6);
    let mut distinct = ids.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct, vec!["c0", "c1", "c2", "s0", "s1", "s2"]);

    // Each feeder's items arrive in source order
    for prefix in ["c", "s"] {
        let order: Vec<&String> = ids.iter().filter(|id| id.starts_with(prefix)).collect();
        assert_eq!(
            order,
            vec![
                &format!("{prefix}0"),
                &format!("{prefix}1"),
                &format!("{prefix}2")
            ]
        );
    }

    assert_eq!(dispatcher.store().len(), 6);
    feeders.shutdown().await;
}
