mod helpers;

use std::sync::Arc;
use std::time::Duration;

use highlight_core::RecordStatus;
use highlight_db::Fault;
use highlight_worker::{PollerConfig, QueuePoller};
use tokio::sync::mpsc;

use helpers::{received, setup_pipeline, ScriptedSource};

fn poller_config() -> PollerConfig {
    PollerConfig {
        visibility_timeout: Duration::from_secs(5),
        receive_error_backoff: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn test_poll_once_deletes_done_and_releases_retriable() {
    let pipeline = setup_pipeline();
    pipeline.seed("r1");
    pipeline.seed("r3");
    pipeline.repo.fail_next("r3", Fault::Unavailable);

    let source = Arc::new(ScriptedSource::with_batches(vec![vec![
        received("m-1", &[("videos/u1_r1_1_a.mp4", 1)], 1),
        received("m-2", &[("videos/onlyonepart", 1)], 1),
        received("m-3", &[("videos/u1_r3_1_c.mp4", 3)], 3),
    ]]));
    let poller = QueuePoller::new(source.clone(), pipeline.processor.clone(), poller_config());

    let report = poller.poll_once().await.unwrap();

    assert_eq!(report.stats.envelopes, 3);
    assert_eq!(source.acknowledged(), vec!["m-1", "m-2"]);
    assert_eq!(
        source.released(),
        vec![("m-3".to_string(), Duration::from_secs(4))]
    );
}

#[tokio::test]
async fn test_batch_deadline_starts_when_messages_arrive() {
    let pipeline = setup_pipeline();
    pipeline.seed("r1");

    let source = Arc::new(
        ScriptedSource::with_batches(vec![vec![received(
            "m-1",
            &[("videos/u1_r1_1_a.mp4", 1)],
            1,
        )]])
        .with_receive_delay(Duration::from_millis(300)),
    );
    let config = PollerConfig {
        visibility_timeout: Duration::from_millis(250),
        ..poller_config()
    };
    let poller = QueuePoller::new(source.clone(), pipeline.processor.clone(), config);

    let report = poller.poll_once().await.unwrap();

    assert_eq!(report.stats.applied, 1);
    assert_eq!(pipeline.repo.update_calls(), 1);
    assert_eq!(source.acknowledged(), vec!["m-1"]);
    assert!(source.released().is_empty());
    assert_eq!(
        pipeline.repo.snapshot("r1").unwrap().status,
        RecordStatus::Uploaded
    );
}

#[tokio::test]
async fn test_poll_once_with_empty_receive_does_nothing() {
    let pipeline = setup_pipeline();
    let source = Arc::new(ScriptedSource::default());
    let poller = QueuePoller::new(source.clone(), pipeline.processor.clone(), poller_config());

    let report = poller.poll_once().await.unwrap();

    assert!(report.outcomes.is_empty());
    assert!(source.acknowledged().is_empty());
    assert!(source.released().is_empty());
}

#[tokio::test]
async fn test_poll_once_surfaces_receive_error() {
    let pipeline = setup_pipeline();
    let source = Arc::new(ScriptedSource::default());
    source.push_error("AccessDenied");
    let poller = QueuePoller::new(source, pipeline.processor.clone(), poller_config());

    assert!(poller.poll_once().await.is_err());
}

#[tokio::test]
async fn test_run_processes_until_shutdown() {
    let pipeline = setup_pipeline();
    pipeline.seed("r1");

    let source = Arc::new(ScriptedSource::with_batches(vec![vec![received(
        "m-1",
        &[("videos/u1_r1_1_a.mp4", 1)],
        1,
    )]]));
    source.push_error("throttled");
    let poller = Arc::new(QueuePoller::new(
        source.clone(),
        pipeline.processor.clone(),
        poller_config(),
    ));

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let handle = {
        let poller = poller.clone();
        tokio::spawn(async move { poller.run(shutdown_rx).await })
    };

    tokio::time::timeout(Duration::from_secs(2), async {
        while source.acknowledged().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("message was never acknowledged");

    shutdown_tx.send(()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("poller did not stop")
        .unwrap();

    assert_eq!(
        pipeline.repo.snapshot("r1").unwrap().status,
        RecordStatus::Uploaded
    );
}
