mod support;

use std::collections::HashSet;
use std::sync::Arc;

use metrics_util::debugging::DebuggingRecorder;
use postrank::cache::{
    CacheConsumer, CacheRegistry, EventKind, EventQueue, MemoryStore, ResyncReason,
};

use support::{FailingStore, FakePrimaryStore, config, id, post};

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // Queue length + overflow collapse
    let queue = Arc::new(EventQueue::new_with_limit(1));
    queue.publish(EventKind::PostDeleted { post_id: id(1) });
    queue.publish(EventKind::PostDeleted { post_id: id(2) });
    let _ = queue.drain(1);

    // Consume + resync latencies
    let db = Arc::new(FakePrimaryStore::with_posts((1..=3).map(|n| post(n, n as i64))));
    let registry = Arc::new(CacheRegistry::with_default_views(
        &config(20),
        Arc::new(MemoryStore::new()),
        db.clone(),
        db.clone(),
    ));
    let consumer_queue = Arc::new(EventQueue::new_with_limit(16));
    let consumer = CacheConsumer::new(config(20), registry, consumer_queue.clone());
    consumer_queue.publish(EventKind::ResyncAll {
        reason: ResyncReason::Startup,
    });
    assert!(consumer.consume().await);

    // Resync failures
    let failing = Arc::new(FailingStore::new());
    failing.fail_writes(true);
    let failing_registry = CacheRegistry::with_default_views(&config(20), failing, db.clone(), db);
    let outcome = failing_registry.sync_from_data_storage().await;
    assert_eq!(outcome.failed.len(), 2);

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "postrank_cache_event_queue_len",
        "postrank_cache_event_collapsed_total",
        "postrank_cache_consume_ms",
        "postrank_cache_resync_ms",
        "postrank_cache_resync_failed_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
