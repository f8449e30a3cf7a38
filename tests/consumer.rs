mod support;

use std::sync::Arc;
use std::time::Duration;

use postrank::cache::{
    CacheConfig, CacheConsumer, CacheRegistry, CacheTrigger, EventQueue, MemoryStore,
    ResyncReason,
};
use postrank::domain::posts::PostUpdate;
use uuid::Uuid;

use support::{FakePrimaryStore, config, id, post};

struct Pipeline {
    db: Arc<FakePrimaryStore>,
    registry: Arc<CacheRegistry>,
    queue: Arc<EventQueue>,
    trigger: CacheTrigger,
    consumer: Arc<CacheConsumer>,
}

fn pipeline(db: FakePrimaryStore, config: CacheConfig) -> Pipeline {
    let db = Arc::new(db);
    let registry = Arc::new(CacheRegistry::with_default_views(
        &config,
        Arc::new(MemoryStore::new()),
        db.clone(),
        db.clone(),
    ));
    let queue = Arc::new(EventQueue::new_with_limit(config.queue_limit));
    let trigger = CacheTrigger::new(config.clone(), queue.clone());
    let consumer = Arc::new(CacheConsumer::new(config, registry.clone(), queue.clone()));
    Pipeline {
        db,
        registry,
        queue,
        trigger,
        consumer,
    }
}

async fn latest_ids(registry: &CacheRegistry) -> Vec<Uuid> {
    registry
        .view("latest")
        .expect("latest view")
        .entries()
        .await
        .expect("entries")
        .into_iter()
        .map(|slot| slot.entry.post_id())
        .collect()
}

#[tokio::test]
async fn startup_resync_populates_both_views() {
    let db = FakePrimaryStore::with_posts((1..=3).map(|n| post(n, n as i64)));
    let pipeline = pipeline(db, config(20));

    pipeline.trigger.resync_all(ResyncReason::Startup);
    assert!(pipeline.consumer.consume().await);

    assert_eq!(latest_ids(&pipeline.registry).await, vec![id(3), id(2), id(1)]);
    let hottest = pipeline.registry.view("hottest").expect("hottest view");
    assert_eq!(hottest.entries().await.expect("entries").len(), 3);
    assert!(pipeline.queue.is_empty());
}

#[tokio::test]
async fn created_post_lands_at_position_one() {
    let db = FakePrimaryStore::with_posts((1..=3).map(|n| post(n, n as i64)));
    let pipeline = pipeline(db, config(20));
    pipeline.trigger.resync_all(ResyncReason::Startup);
    pipeline.consumer.consume_pending().await;

    pipeline.db.upsert(post(4, 50));
    pipeline.trigger.post_created(id(4));
    let outcome = pipeline.consumer.consume_batch().await.expect("batch");

    assert!(outcome.is_success());
    assert_eq!(latest_ids(&pipeline.registry).await[0], id(4));
}

#[tokio::test]
async fn events_queued_before_a_full_resync_are_superseded() {
    let db = FakePrimaryStore::with_posts((1..=3).map(|n| post(n, n as i64)));
    let pipeline = pipeline(db, config(20));

    pipeline.trigger.post_updated(PostUpdate::cosmetic(id(1)));
    pipeline.trigger.post_deleted(id(2));
    pipeline.trigger.resync_all(ResyncReason::Manual);
    let outcome = pipeline.consumer.consume_batch().await.expect("batch");

    assert_eq!(outcome.resynced, vec!["latest", "hottest"]);
    assert!(outcome.inserted.is_empty());
}

#[tokio::test]
async fn disabled_trigger_publishes_nothing() {
    let config = CacheConfig {
        enabled: false,
        ..config(20)
    };
    let pipeline = pipeline(FakePrimaryStore::with_posts([post(1, 0)]), config);

    pipeline.trigger.post_created(id(1));
    pipeline.trigger.resync_all(ResyncReason::Manual);

    assert!(pipeline.queue.is_empty());
    assert!(!pipeline.consumer.consume().await);
    assert!(latest_ids(&pipeline.registry).await.is_empty());
}

#[tokio::test]
async fn overflow_collapses_into_full_resync() {
    let config = CacheConfig {
        queue_limit: 2,
        ..config(20)
    };
    let db = FakePrimaryStore::with_posts((1..=3).map(|n| post(n, n as i64)));
    let pipeline = pipeline(db, config);

    pipeline.trigger.post_deleted(id(7));
    pipeline.trigger.post_deleted(id(8));
    pipeline.trigger.post_deleted(id(9));
    assert_eq!(pipeline.queue.len(), 2);

    let outcome = pipeline.consumer.consume_batch().await.expect("batch");

    assert_eq!(outcome.resynced, vec!["latest", "hottest"]);
    assert_eq!(latest_ids(&pipeline.registry).await.len(), 3);
}

#[tokio::test]
async fn run_loop_wakes_on_publish() {
    let config = CacheConfig {
        poll_interval_ms: 60_000,
        ..config(20)
    };
    let db = FakePrimaryStore::with_posts((1..=2).map(|n| post(n, n as i64)));
    let pipeline = pipeline(db, config);
    let handle = tokio::spawn(pipeline.consumer.clone().run());

    pipeline.trigger.resync_all(ResyncReason::Startup);

    let populated = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if latest_ids(&pipeline.registry).await.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    handle.abort();
    assert!(populated.is_ok(), "consumer never picked up the event");
}
