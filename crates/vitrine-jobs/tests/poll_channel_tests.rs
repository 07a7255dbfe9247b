use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vitrine_core::{FailureReason, JobChannelConfig, JobStatus, StatusUpdate};
use vitrine_jobs::{
    ChannelError, ChannelEvent, ChannelResult, HttpStatusSource, JobChannel, PollChannel,
    PollResponse, StatusSource,
};

/// Replays queued responses, then answers `processing` forever.
#[derive(Default)]
struct ScriptedSource {
    script: Mutex<VecDeque<ChannelResult<PollResponse>>>,
    calls: AtomicU32,
}

impl ScriptedSource {
    fn with_script(script: Vec<ChannelResult<PollResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch(&self, _job_id: &str) -> ChannelResult<PollResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(status("processing")))
    }
}

fn status(status: &str) -> PollResponse {
    serde_json::from_value(serde_json::json!({ "status": status })).unwrap()
}

fn drain(rx: &mut mpsc::Receiver<ChannelEvent>) -> Vec<StatusUpdate> {
    let mut updates = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ChannelEvent::Update(update) = event {
            updates.push(update);
        }
    }
    updates
}

#[tokio::test(start_paused = true)]
async fn test_sixtieth_processing_tick_times_out_without_further_polls() {
    let source = Arc::new(ScriptedSource::default());
    let channel = PollChannel::new(source.clone(), &JobChannelConfig::default());
    let (tx, mut rx) = mpsc::channel(128);

    let started = Instant::now();
    channel
        .run("j1".to_string(), tx, CancellationToken::new())
        .await;

    assert_eq!(source.calls(), 60);
    // 60 polls, 59 sleeps between them.
    assert_eq!(started.elapsed(), Duration::from_secs(2 * 59));

    let updates = drain(&mut rx);
    assert_eq!(updates.len(), 61);
    assert!(updates[..60]
        .iter()
        .all(|u| u.status == JobStatus::Processing));
    let last = updates.last().unwrap();
    assert_eq!(last.status, JobStatus::Failed);
    assert_eq!(last.failure_reason, Some(FailureReason::Timeout));

    // Nothing else is scheduled after the timeout.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(source.calls(), 60);
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_count_against_budget() {
    let source = Arc::new(ScriptedSource::with_script(vec![
        Err(ChannelError::Transport("connection reset".to_string())),
        Err(ChannelError::Http { status: 502 }),
        Err(ChannelError::Transport("connection reset".to_string())),
    ]));
    let channel = PollChannel::with_budget(source.clone(), Duration::from_secs(2), 3);
    let (tx, mut rx) = mpsc::channel(16);

    channel
        .run("j1".to_string(), tx, CancellationToken::new())
        .await;

    assert_eq!(source.calls(), 3);
    let updates = drain(&mut rx);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].failure_reason, Some(FailureReason::Timeout));
}

#[tokio::test(start_paused = true)]
async fn test_error_does_not_abort_loop() {
    let completed: PollResponse = serde_json::from_value(serde_json::json!({
        "status": "completed",
        "images": [{"id": "i1", "url": "https://cdn.example/generated/1.png"}]
    }))
    .unwrap();
    let source = Arc::new(ScriptedSource::with_script(vec![
        Ok(status("queued")),
        Err(ChannelError::Decode("truncated body".to_string())),
        Ok(completed),
    ]));
    let channel = PollChannel::with_budget(source.clone(), Duration::from_secs(2), 60);
    let (tx, mut rx) = mpsc::channel(16);

    channel
        .run("j1".to_string(), tx, CancellationToken::new())
        .await;

    assert_eq!(source.calls(), 3);
    let updates = drain(&mut rx);
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].status, JobStatus::Pending);
    assert_eq!(updates[1].status, JobStatus::Completed);
    assert_eq!(updates[1].assets[0].id, "i1");
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_polling() {
    let source = Arc::new(ScriptedSource::default());
    let channel = Arc::new(PollChannel::with_budget(
        source.clone(),
        Duration::from_secs(2),
        60,
    ));
    let (tx, _rx) = mpsc::channel(128);
    let cancel = CancellationToken::new();

    let handle = {
        let channel = channel.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { channel.run("j1".to_string(), tx, cancel).await })
    };

    tokio::time::sleep(Duration::from_secs(5)).await;
    cancel.cancel();
    handle.await.unwrap();

    let polled = source.calls();
    assert_eq!(polled, 3);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(source.calls(), polled);
}

#[tokio::test]
async fn test_http_source_reads_status_endpoint() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/generate-status/job%201")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"processing","progress":30}"#)
        .create_async()
        .await;

    let source = HttpStatusSource::new(reqwest::Client::new(), server.url());
    let response = source.fetch("job 1").await.unwrap();

    assert_eq!(response.status, "processing");
    assert_eq!(response.progress, Some(30.0));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_http_source_maps_error_status() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/generate-status/j1")
        .with_status(503)
        .expect(2)
        .create_async()
        .await;

    let channel = PollChannel::with_budget(
        HttpStatusSource::new(reqwest::Client::new(), server.url()),
        Duration::from_millis(5),
        2,
    );
    let (tx, mut rx) = mpsc::channel(8);
    channel
        .run("j1".to_string(), tx, CancellationToken::new())
        .await;

    let updates = drain(&mut rx);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].failure_reason, Some(FailureReason::Timeout));
    mock.assert_async().await;

    let err = HttpStatusSource::new(reqwest::Client::new(), server.url())
        .fetch("j1")
        .await;
    assert!(matches!(err, Err(ChannelError::Http { status: 503 })));
}
