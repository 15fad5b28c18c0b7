use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::executor::test_helpers::{
    ALBUM_ID, ALBUM_NAME, MockRemote, MockResizer, collect_until_terminal, create_executor_with,
    create_test_executor, terminal_state, test_config,
};
use crate::types::{Event, TaskId, TaskRequest, TaskStatus};

fn download_request(id: &str) -> TaskRequest {
    TaskRequest::Download {
        task_id: TaskId::new(id),
        album_id: ALBUM_ID.into(),
        album_name: ALBUM_NAME.into(),
    }
}

// -----------------------------------------------------------------------
// Shutdown
// -----------------------------------------------------------------------

#[tokio::test]
async fn shutdown_closes_admission_and_is_idempotent() {
    let (executor, _temp) = create_test_executor(MockRemote::with_assets(&[])).await;
    let mut events = executor.subscribe();
    executor.start().await.unwrap();

    executor.shutdown().await.unwrap();
    executor.shutdown().await.unwrap();

    assert!(executor.is_shutting_down());
    assert!(!executor.enqueue(download_request("late")).await);
    assert!(matches!(
        executor.submit_download(ALBUM_ID, ALBUM_NAME).await,
        Err(Error::ShuttingDown)
    ));

    let mut shutdown_events = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, Event::Shutdown) {
            shutdown_events += 1;
        }
    }
    assert_eq!(shutdown_events, 1);
}

#[tokio::test]
async fn enqueue_blocked_on_a_full_queue_returns_false_on_shutdown() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = test_config(temp.path());
    config.download.queue_capacity = 1;
    let executor =
        create_executor_with(config, MockRemote::with_assets(&[]), Arc::new(MockResizer)).await;

    // Not started: the first request fills the queue
    assert!(executor.enqueue(download_request("first")).await);

    let blocked = {
        let executor = executor.clone();
        tokio::spawn(async move { executor.enqueue(download_request("second")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!blocked.is_finished(), "enqueue should wait for a free slot");

    executor.shutdown().await.unwrap();

    let accepted = tokio::time::timeout(Duration::from_secs(5), blocked)
        .await
        .unwrap()
        .unwrap();
    assert!(!accepted);
}

#[tokio::test]
async fn shutdown_cancels_the_running_task() {
    let remote = MockRemote::with_numbered_assets(120);
    remote.set_fetch_delay(Duration::from_millis(20));
    let (executor, _temp) = create_test_executor(Arc::clone(&remote)).await;
    let mut events = executor.subscribe();
    executor.start().await.unwrap();

    let task_id = executor.submit_download(ALBUM_ID, ALBUM_NAME).await.unwrap();
    while remote.fetches() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    executor.shutdown().await.unwrap();

    let seen = collect_until_terminal(&mut events, &task_id).await;
    assert_eq!(
        terminal_state(&seen),
        (TaskStatus::Error, Some("cancelled".to_string()))
    );
    assert_eq!(remote.fetches(), 50);

    let record = executor.db.get_task(&task_id).await.unwrap().unwrap();
    assert_eq!(record.status(), TaskStatus::Error);
    assert_eq!(record.error_message.as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn queued_requests_stay_pending_after_shutdown() {
    let remote = MockRemote::with_numbered_assets(120);
    remote.set_fetch_delay(Duration::from_millis(20));
    let (executor, _temp) = create_test_executor(Arc::clone(&remote)).await;
    executor.start().await.unwrap();

    let running = executor.submit_download(ALBUM_ID, ALBUM_NAME).await.unwrap();
    let waiting = executor.submit_download(ALBUM_ID, ALBUM_NAME).await.unwrap();
    while remote.fetches() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    executor.shutdown().await.unwrap();

    let running = executor.db.get_task(&running).await.unwrap().unwrap();
    assert_eq!(running.status(), TaskStatus::Error);
    let waiting = executor.db.get_task(&waiting).await.unwrap().unwrap();
    assert_eq!(waiting.status(), TaskStatus::Pending);
}

#[tokio::test]
async fn shutdown_timeout_aborts_the_engine_and_undoes_its_work() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = test_config(temp.path());
    config.download.shutdown_timeout = Duration::from_millis(100);
    config.download.chunk_size = 1;
    config.download.max_concurrent_fetches = 1;
    let remote = MockRemote::with_numbered_assets(100);
    remote.set_fetch_delay(Duration::from_millis(20));
    let executor =
        create_executor_with(config, Arc::clone(&remote), Arc::new(MockResizer)).await;
    let mut events = executor.subscribe();
    executor.start().await.unwrap();

    let task_id = executor.submit_download(ALBUM_ID, ALBUM_NAME).await.unwrap();
    while executor.db.count_local_assets(ALBUM_ID).await.unwrap() < 3 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    // Park the engine inside a fetch that outlives the shutdown timeout
    remote.set_fetch_delay(Duration::from_secs(30));
    let started = remote.fetches();
    while remote.fetches() == started {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    tokio::time::timeout(Duration::from_secs(5), executor.shutdown())
        .await
        .expect("shutdown is bounded by its timeout")
        .unwrap();

    let seen = collect_until_terminal(&mut events, &task_id).await;
    assert_eq!(
        terminal_state(&seen),
        (TaskStatus::Error, Some("task aborted".to_string()))
    );
    let record = executor.db.get_task(&task_id).await.unwrap().unwrap();
    assert_eq!(record.status(), TaskStatus::Error);
    assert_eq!(record.error_message.as_deref(), Some("task aborted"));
    assert!(record.completed_at.is_some());

    // Nothing of the aborted run survives, and the engine no longer runs
    let fetches = remote.fetches();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(remote.fetches(), fetches);
    assert_eq!(
        std::fs::read_dir(temp.path().join("archives")).unwrap().count(),
        0
    );
    assert_eq!(executor.db.count_local_assets(ALBUM_ID).await.unwrap(), 0);
    assert!(executor.db.find_downloaded_album(ALBUM_ID).await.unwrap().is_none());
    assert_eq!(
        executor.db.get_task(&task_id).await.unwrap().unwrap().status(),
        TaskStatus::Error
    );
}

// -----------------------------------------------------------------------
// Cancel
// -----------------------------------------------------------------------

#[tokio::test]
async fn cancel_stops_a_running_download_after_its_current_chunk() {
    let remote = MockRemote::with_numbered_assets(120);
    remote.set_fetch_delay(Duration::from_millis(20));
    let (executor, temp) = create_test_executor(Arc::clone(&remote)).await;
    let mut events = executor.subscribe();
    executor.start().await.unwrap();

    let task_id = executor.submit_download(ALBUM_ID, ALBUM_NAME).await.unwrap();
    while remote.fetches() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(executor.cancel(&task_id).await);

    let seen = collect_until_terminal(&mut events, &task_id).await;
    assert_eq!(
        terminal_state(&seen),
        (TaskStatus::Error, Some("cancelled".to_string()))
    );
    assert_eq!(remote.fetches(), 50);
    assert_eq!(
        std::fs::read_dir(temp.path().join("archives")).unwrap().count(),
        0
    );

    // No longer running
    assert!(!executor.cancel(&task_id).await);

    // The executor is still usable afterwards
    remote.set_fetch_delay(Duration::ZERO);
    let next = executor.submit_download(ALBUM_ID, ALBUM_NAME).await.unwrap();
    let seen = collect_until_terminal(&mut events, &next).await;
    assert_eq!(terminal_state(&seen).0, TaskStatus::Completed);
    assert_eq!(
        executor
            .db
            .get_task(&next)
            .await
            .unwrap()
            .unwrap()
            .processed_count,
        120
    );

    executor.shutdown().await.unwrap();
}

#[tokio::test]
async fn cancel_of_unknown_task_returns_false() {
    let (executor, _temp) = create_test_executor(MockRemote::with_assets(&[])).await;

    assert!(!executor.cancel(&TaskId::new("nope")).await);
}
