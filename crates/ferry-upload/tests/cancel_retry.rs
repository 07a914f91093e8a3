//! Cancellation, retry and clearing.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mockall::mock;

use common::{GatedTransport, collect_until, files, item_name, wait_drained, wait_for_status};
use ferry_upload::{
    FileHandle, ProgressReporter, UploadError, UploadEvent, UploadId, UploadOutput,
    UploadQueueConfig, UploadQueueDeps, UploadQueuePort, UploadStatus, UploadTransport,
    build_upload_queue,
};

mock! {
    pub Transport {}

    #[async_trait]
    impl UploadTransport for Transport {
        async fn upload(
            &self,
            file: FileHandle,
            progress: ProgressReporter,
        ) -> Result<UploadOutput, UploadError>;
    }
}

fn queue_with(transport: &GatedTransport, concurrency: usize) -> ferry_upload::UploadQueue {
    build_upload_queue(
        UploadQueueDeps::new(Arc::new(transport.clone()))
            .with_config(UploadQueueConfig::default().with_concurrency(concurrency)),
    )
}

#[tokio::test]
async fn failed_item_is_retried_exactly_once_more() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut transport = MockTransport::new();
    transport.expect_upload().times(2).returning(move |_, _| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(UploadError::other("boom"))
        } else {
            Ok(serde_json::json!({ "ok": true }))
        }
    });

    let queue = build_upload_queue(UploadQueueDeps::new(Arc::new(transport)));
    let mut events = queue.subscribe();
    let ids = queue.add_files(files(&["A"]), None).await;
    let id = &ids[0];

    wait_for_status(&queue, id, UploadStatus::Error).await;
    let failed = queue.get_state().await.get(id).cloned().unwrap();
    assert_eq!(failed.error.as_deref(), Some("boom"));
    assert_eq!(failed.attempts, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let seen = collect_until(&mut events, |e| matches!(e, UploadEvent::ItemError { .. })).await;
    assert!(seen.iter().any(|e| matches!(e, UploadEvent::ItemStarted { .. })));

    assert!(queue.retry(id).await);
    let seen = collect_until(&mut events, |e| matches!(e, UploadEvent::ItemCompleted { .. })).await;

    // The retried item goes through a fresh started/completed sequence
    let sequence: Vec<_> = seen
        .iter()
        .filter(|e| e.item_id() == Some(id))
        .map(|e| (e.kind(), e.item().map_or(0, |item| item.attempts)))
        .collect();
    assert_eq!(sequence, vec![("item_started", 2), ("item_completed", 2)]);

    let state = wait_drained(&queue).await;
    assert_eq!(state.status_of(id), Some(UploadStatus::Completed));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn transport_reported_cancellation_without_request_is_an_error() {
    let mut transport = MockTransport::new();
    transport
        .expect_upload()
        .times(1)
        .returning(|_, _| Err(UploadError::Cancelled));

    let queue = build_upload_queue(UploadQueueDeps::new(Arc::new(transport)));
    let ids = queue.add_files(files(&["self-cancelled"]), None).await;

    let state = wait_drained(&queue).await;
    let item = state.get(&ids[0]).unwrap();
    assert_eq!(item.status, UploadStatus::Error);
    assert_eq!(item.error.as_deref(), Some("Upload cancelled"));
    assert_eq!(state.progress.cancelled, 0);
}

#[tokio::test]
async fn retry_outside_error_is_a_no_op() {
    let transport = GatedTransport::new();
    let queue = queue_with(&transport, 1);
    let ids = queue.add_files(files(&["up", "wait"]), None).await;

    assert!(!queue.retry(&ids[0]).await);
    assert!(!queue.retry(&ids[1]).await);
    assert!(!queue.retry(&UploadId::new("unknown")).await);

    transport.wait_open("up").await;
    transport.succeed("up");
    wait_for_status(&queue, &ids[0], UploadStatus::Completed).await;
    assert!(!queue.retry(&ids[0]).await);
}

#[tokio::test]
async fn cancel_then_retry_stays_cancelled() {
    let transport = GatedTransport::new();
    let queue = queue_with(&transport, 1);
    let ids = queue.add_files(files(&["busy", "queued"]), None).await;

    assert!(queue.cancel(&ids[1]).await);
    assert!(!queue.retry(&ids[1]).await);
    assert_eq!(
        queue.get_state().await.status_of(&ids[1]),
        Some(UploadStatus::Cancelled)
    );
    assert!(!queue.cancel(&ids[1]).await);
}

#[tokio::test]
async fn cancelling_active_upload_frees_its_slot() {
    let transport = GatedTransport::new();
    let queue = queue_with(&transport, 1);
    let mut events = queue.subscribe();
    let ids = queue.add_files(files(&["first", "second"]), None).await;

    transport.wait_open("first").await;
    transport.report("first", 30.0).unwrap();
    assert!(queue.cancel(&ids[0]).await);

    let state = queue.get_state().await;
    assert_eq!(state.status_of(&ids[0]), Some(UploadStatus::Cancelled));
    assert_eq!(state.status_of(&ids[1]), Some(UploadStatus::Uploading));
    assert!((state.get(&ids[0]).unwrap().progress - 30.0).abs() < f64::EPSILON);

    // The transport observes the cancellation through its reporter
    transport.wait_open_exactly(&["second"]).await;

    transport.succeed("second");
    let seen = collect_until(&mut events, |e| matches!(e, UploadEvent::QueueCompleted { .. })).await;
    let cancelled: Vec<_> = seen
        .iter()
        .filter(|e| matches!(e, UploadEvent::ItemCancelled { .. }))
        .filter_map(item_name)
        .collect();
    assert_eq!(cancelled, vec!["first"]);
}

#[tokio::test]
async fn late_result_after_cancel_is_discarded() {
    let transport = GatedTransport::ignoring_cancellation();
    let queue = queue_with(&transport, 2);
    let mut events = queue.subscribe();
    let ids = queue.add_files(files(&["stubborn", "other"]), None).await;

    transport.wait_open("stubborn").await;
    assert!(queue.cancel(&ids[0]).await);

    // Reports after cancellation are refused at the source
    assert_eq!(transport.report("stubborn", 90.0), Err(UploadError::Cancelled));

    transport.succeed("stubborn");
    transport.wait_open("other").await;
    transport.succeed("other");

    let seen = collect_until(&mut events, |e| matches!(e, UploadEvent::QueueCompleted { .. })).await;
    assert!(
        !seen
            .iter()
            .any(|e| matches!(e, UploadEvent::ItemCompleted { item } if item.id == ids[0]))
    );

    let state = queue.get_state().await;
    assert_eq!(state.status_of(&ids[0]), Some(UploadStatus::Cancelled));
    assert!(state.get(&ids[0]).unwrap().result.is_none());
    assert_eq!(state.progress.completed, 1);
}

#[tokio::test]
async fn cancel_unknown_item_is_a_no_op() {
    let transport = GatedTransport::new();
    let queue = queue_with(&transport, 1);
    assert!(!queue.cancel(&UploadId::new("nope")).await);
}

#[tokio::test]
async fn clear_completed_removes_completed_and_cancelled() {
    let transport = GatedTransport::new();
    let queue = queue_with(&transport, 1);
    let ids = queue.add_files(files(&["ok", "bad", "dropped"]), None).await;

    assert!(queue.cancel(&ids[2]).await);
    transport.wait_open("ok").await;
    transport.succeed("ok");
    transport.wait_open("bad").await;
    transport.fail("bad", "nope");
    wait_drained(&queue).await;

    assert_eq!(queue.clear_completed().await, 2);
    let state = queue.get_state().await;
    assert_eq!(state.len(), 1);
    assert_eq!(state.status_of(&ids[1]), Some(UploadStatus::Error));
}

#[tokio::test]
async fn clear_detaches_active_uploads() {
    let transport = GatedTransport::ignoring_cancellation();
    let queue = queue_with(&transport, 2);
    let mut events = queue.subscribe();
    queue.add_files(files(&["a", "b", "c"]), None).await;
    transport.wait_open("a").await;
    transport.wait_open("b").await;

    assert_eq!(queue.clear().await, 3);

    let seen = collect_until(&mut events, |e| {
        matches!(e, UploadEvent::QueueProgress { progress } if progress.total == 0)
    })
    .await;
    assert!(!seen.iter().any(|e| matches!(e, UploadEvent::ItemCancelled { .. })));

    // Late results from the detached uploads change nothing
    transport.succeed("a");
    transport.fail("b", "too late");
    let state = queue.get_state().await;
    assert!(state.is_empty());
    assert_eq!(transport.calls("c"), 0);

    // The queue is usable afterwards
    let ids = queue.add_files(files(&["d"]), None).await;
    transport.wait_open("d").await;
    transport.succeed("d");
    wait_for_status(&queue, &ids[0], UploadStatus::Completed).await;
}
