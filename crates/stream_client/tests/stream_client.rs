use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stream_client::*;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing_test::traced_test;

enum Step {
    Accept(mpsc::UnboundedReceiver<Incoming>),
    Fail,
}

#[derive(Clone, Default)]
struct MockTransport {
    script: Arc<Mutex<VecDeque<Step>>>,
    attempts: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into())),
            ..Default::default()
        }
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

struct MockConnection {
    incoming: mpsc::UnboundedReceiver<Incoming>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl Transport for MockTransport {
    type Conn = MockConnection;

    async fn connect(&self, url: &str) -> Result<MockConnection, StreamError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Accept(incoming)) => Ok(MockConnection {
                incoming,
                sent: self.sent.clone(),
            }),
            Some(Step::Fail) | None => Err(StreamError::ConnectTimeout {
                url: url.to_string(),
            }),
        }
    }
}

impl Connection for MockConnection {
    async fn send_text(&mut self, text: String) -> Result<(), StreamError> {
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Incoming, StreamError> {
        match self.incoming.recv().await {
            Some(msg) => Ok(msg),
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) {}
}

fn endpoint() -> Endpoint {
    "localhost:8000".parse().unwrap()
}

async fn next_event(events: &mut broadcast::Receiver<StreamEvent>) -> StreamEvent {
    tokio::time::timeout(Duration::from_secs(60), events.recv())
        .await
        .expect("no event within a minute")
        .expect("event channel closed")
}

fn wifi_data(bssids: &[&str]) -> Incoming {
    let aps: Vec<String> = bssids
        .iter()
        .map(|b| format!(r#"{{"bssid":"{b}","power":-50,"clients":[]}}"#))
        .collect();
    Incoming::Text(format!(
        r#"{{"event":"wifi_data","data":{{"aps":[{}],"total_clients":0}}}}"#,
        aps.join(",")
    ))
}

#[tokio::test(start_paused = true)]
async fn test_connect_requests_data() {
    let (_tx, rx) = mpsc::unbounded_channel();
    let transport = MockTransport::new(vec![Step::Accept(rx)]);
    let mut client = StreamClient::new(transport.clone(), StreamConfig::default());
    let mut events = client.subscribe();
    assert_eq!(client.current_status(), ConnectionStatus::Disconnected);

    client.connect(endpoint());
    assert!(matches!(next_event(&mut events).await, StreamEvent::Connected));
    assert_eq!(client.current_status(), ConnectionStatus::Connected);
    assert_eq!(transport.sent(), vec![r#"{"event":"request_data"}"#.to_string()]);

    client.close().await;
    assert_eq!(client.current_status(), ConnectionStatus::Disconnected);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_snapshots_and_status_are_forwarded() {
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = MockTransport::new(vec![Step::Accept(rx)]);
    let mut client = StreamClient::new(transport, StreamConfig::default());
    let mut events = client.subscribe();
    client.connect(endpoint());
    assert!(matches!(next_event(&mut events).await, StreamEvent::Connected));

    tx.send(wifi_data(&["AA", "BB"])).unwrap();
    match next_event(&mut events).await {
        StreamEvent::Snapshot(snapshot) => assert_eq!(snapshot.aps.len(), 2),
        other => panic!("expected snapshot, got {other:?}"),
    }

    tx.send(Incoming::Text(r#"{"event":"wifi_data","data":{"total_clients":2}}"#.into()))
        .unwrap();
    tx.send(Incoming::Text("{ not json".into())).unwrap();
    tx.send(Incoming::Text(r#"{"event":"status","data":{"clients":4}}"#.into()))
        .unwrap();
    match next_event(&mut events).await {
        StreamEvent::Status { connected_clients } => assert_eq!(connected_clients, 4),
        other => panic!("expected status, got {other:?}"),
    }
    assert!(logs_contain("discarded payload without aps field"));
    assert!(logs_contain("ignoring unreadable message"));
    assert_eq!(client.current_status(), ConnectionStatus::Connected);

    client.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_three_seconds_after_close() {
    let (tx1, rx1) = mpsc::unbounded_channel();
    let (_tx2, rx2) = mpsc::unbounded_channel();
    let transport = MockTransport::new(vec![Step::Accept(rx1), Step::Accept(rx2)]);
    let mut client = StreamClient::new(transport.clone(), StreamConfig::default());
    let mut events = client.subscribe();
    let mut status = client.status();

    client.connect(endpoint());
    assert!(matches!(next_event(&mut events).await, StreamEvent::Connected));
    status.borrow_and_update();

    let closed_at = Instant::now();
    tx1.send(Incoming::Closed("server restart".into())).unwrap();
    match next_event(&mut events).await {
        StreamEvent::Disconnected { reason } => assert_eq!(reason, "server restart"),
        other => panic!("expected disconnect, got {other:?}"),
    }
    assert_eq!(client.current_status(), ConnectionStatus::Disconnected);

    assert!(matches!(next_event(&mut events).await, StreamEvent::Connected));
    let waited = closed_at.elapsed();
    assert!(waited >= Duration::from_secs(3), "{waited:?}");
    assert!(waited < Duration::from_millis(3100), "{waited:?}");
    assert_eq!(transport.attempts(), 2);
    assert_eq!(*status.borrow_and_update(), ConnectionStatus::Connected);
    assert_eq!(transport.sent().len(), 2);

    client.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_error_waits_five_seconds() {
    let (_tx, rx) = mpsc::unbounded_channel();
    let transport = MockTransport::new(vec![Step::Fail, Step::Accept(rx)]);
    let mut client = StreamClient::new(transport.clone(), StreamConfig::default());
    let mut events = client.subscribe();

    let started = Instant::now();
    client.connect(endpoint());
    match next_event(&mut events).await {
        StreamEvent::Error { cause } => assert!(cause.contains("localhost:8000"), "{cause}"),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(client.current_status(), ConnectionStatus::Error);

    assert!(matches!(next_event(&mut events).await, StreamEvent::Connected));
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(5), "{waited:?}");
    assert!(waited < Duration::from_millis(5100), "{waited:?}");
    assert_eq!(transport.attempts(), 2);

    client.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_close_cancels_pending_reconnect() {
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = MockTransport::new(vec![Step::Accept(rx)]);
    let mut client = StreamClient::new(transport.clone(), StreamConfig::default());
    let mut events = client.subscribe();
    client.connect(endpoint());
    assert!(matches!(next_event(&mut events).await, StreamEvent::Connected));

    tx.send(Incoming::Closed("bye".into())).unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        StreamEvent::Disconnected { .. }
    ));
    client.close().await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.attempts(), 1);
    assert_eq!(client.current_status(), ConnectionStatus::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_second_connect_is_a_no_op() {
    let (_tx, rx) = mpsc::unbounded_channel();
    let transport = MockTransport::new(vec![Step::Accept(rx)]);
    let mut client = StreamClient::new(transport.clone(), StreamConfig::default());
    let mut events = client.subscribe();

    client.connect(endpoint());
    assert!(matches!(next_event(&mut events).await, StreamEvent::Connected));
    client.connect(endpoint());
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(transport.attempts(), 1);
    assert_eq!(transport.sent().len(), 1);
    client.close().await;
}
