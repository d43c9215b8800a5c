/// Subscription tests against a live server and against scripted raw sockets.
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::time::{Instant, timeout};

use server::{AppState, serve};
use shared::types::AppConfig;
use tui::{ClientViewState, ConnectionStatus, ReconnectPolicy, subscribe, subscribe_with_policy};

const WAIT: Duration = Duration::from_secs(5);

const FAST_RETRY: ReconnectPolicy = ReconnectPolicy {
    base_delay: Duration::from_millis(50),
    max_delay: Duration::from_millis(200),
};

async fn start_server_on(listener: TcpListener) -> (AppState, oneshot::Sender<()>) {
    let state = AppState::new(AppConfig::default());
    let (tx, rx) = oneshot::channel::<()>();
    let served = state.clone();
    tokio::spawn(async move {
        serve(listener, served, async {
            let _ = rx.await;
        })
        .await
        .unwrap();
    });
    (state, tx)
}

async fn wait_until<F>(rx: &mut watch::Receiver<ClientViewState>, what: &str, f: F) -> ClientViewState
where
    F: FnMut(&ClientViewState) -> bool,
{
    let outcome = timeout(WAIT, rx.wait_for(f))
        .await
        .map(|waited| waited.map(|state| state.clone()));
    match outcome {
        Ok(Ok(state)) => state,
        Ok(Err(_)) => panic!("subscription dropped while waiting for {}", what),
        Err(_) => panic!("timed out waiting for {}: {:?}", what, *rx.borrow()),
    }
}

async fn wait_for_streams(state: &AppState, expected: usize) {
    let deadline = Instant::now() + WAIT;
    while state.metrics.active_streams() != expected {
        assert!(
            Instant::now() < deadline,
            "server still has {} streams open",
            state.metrics.active_streams()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn live_server_updates_view_and_close_releases_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (server, _shutdown) = start_server_on(listener).await;

    let subscription = subscribe(&format!("http://{}", addr)).unwrap();
    let mut rx = subscription.watch();

    let state = wait_until(&mut rx, "two counter events", |s| {
        s.count.is_some_and(|c| c >= 2)
    })
    .await;
    assert!(state.status.is_connected());
    assert!(state.message.is_some());
    assert_eq!(state.malformed_events, 0);
    assert_eq!(server.metrics.active_streams(), 1);

    let last = subscription.close().await;
    assert_eq!(last.status, ConnectionStatus::Disconnected);
    wait_for_streams(&server, 0).await;
    assert_eq!(server.metrics.active_emitters(), 0);
}

#[tokio::test]
async fn reconnects_once_server_comes_up() {
    // Reserve a free port, then leave it closed.
    let addr: SocketAddr = {
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        probe.local_addr().unwrap()
    };

    let subscription = subscribe_with_policy(&format!("http://{}", addr), FAST_RETRY).unwrap();
    let mut rx = subscription.watch();

    wait_until(&mut rx, "connect error", |s| s.status.is_error()).await;

    let listener = TcpListener::bind(addr).await.unwrap();
    let (_server, _shutdown) = start_server_on(listener).await;

    let state = wait_until(&mut rx, "reconnect", |s| {
        s.status.is_connected() && s.count.is_some()
    })
    .await;
    assert_eq!(state.count, Some(1));

    subscription.close().await;
}

/// Accept one connection, answer with an event-stream head, write `body`,
/// then hold the socket until `release` fires.
async fn scripted_stream(body: &'static [u8]) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (release_tx, release_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await.unwrap();

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\n\
                  content-type: text/event-stream\r\n\
                  cache-control: no-cache\r\n\
                  connection: close\r\n\r\n",
            )
            .await
            .unwrap();
        socket.write_all(body).await.unwrap();
        socket.flush().await.unwrap();

        let _ = release_rx.await;
    });

    (addr, release_tx)
}

#[tokio::test]
async fn malformed_event_is_skipped_and_stream_continues() {
    let (addr, release) = scripted_stream(
        b"event: connected\ndata: {\"message\":\"scripted\"}\n\n\
          event: counter\ndata: {count:\n\n\
          : comment\n\
          event: surprise\ndata: {}\n\n\
          event: counter\r\ndata: {\"count\":5}\r\n\r\n",
    )
    .await;

    let subscription = subscribe_with_policy(&format!("http://{}", addr), FAST_RETRY).unwrap();
    let mut rx = subscription.watch();

    let state = wait_until(&mut rx, "count 5", |s| s.count == Some(5)).await;
    assert_eq!(state.message.as_deref(), Some("scripted"));
    assert_eq!(state.malformed_events, 1);
    assert_eq!(state.events_received, 2);
    assert!(state.status.is_connected());

    // Server hangs up; the view reports the error and keeps the last values.
    drop(release);
    let state = wait_until(&mut rx, "error after hang-up", |s| s.status.is_error()).await;
    assert_eq!(state.count, Some(5));

    subscription.close().await;
}

#[tokio::test]
async fn zero_retry_hint_on_short_lived_streams_still_backs_off() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));

    // Every connection gets a stream head, `retry: 0`, and an immediate hang-up.
    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\n\
                          content-type: text/event-stream\r\n\
                          connection: close\r\n\r\n\
                          retry: 0\n\n",
                    )
                    .await;
            });
        }
    });

    let subscription = subscribe(&format!("http://{}", addr)).unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    let state = subscription.close().await;

    // Floored at 100 ms and doubling: attempts near 0, 0.1, 0.3, 0.7 and 1.5 s.
    let connections = accepted.load(Ordering::SeqCst);
    assert!(connections >= 2, "only {} connections", connections);
    assert!(connections <= 8, "{} connections in 2s", connections);
    assert_eq!(state.events_received, 0);
}

#[tokio::test]
async fn non_stream_response_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await.unwrap();
        let _ = socket
            .write_all(b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n")
            .await;
        tokio::time::sleep(WAIT).await;
    });

    let subscription = subscribe_with_policy(&format!("http://{}", addr), FAST_RETRY).unwrap();
    let mut rx = subscription.watch();
    let state = wait_until(&mut rx, "status error", |s| s.status.is_error()).await;
    match state.status {
        ConnectionStatus::Error { message } => assert!(message.contains("404"), "{}", message),
        other => panic!("unexpected status {:?}", other),
    }
    assert_eq!(state.events_received, 0);

    subscription.close().await;
}

#[tokio::test]
async fn close_stops_reconnecting() {
    let addr: SocketAddr = {
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        probe.local_addr().unwrap()
    };

    let subscription = subscribe_with_policy(&format!("http://{}", addr), FAST_RETRY).unwrap();
    let mut rx = subscription.watch();
    wait_until(&mut rx, "connect error", |s| s.status.is_error()).await;

    let last = subscription.close().await;
    assert_eq!(last.status, ConnectionStatus::Disconnected);

    // Nothing reconnects after close: a server started now sees no client.
    let listener = TcpListener::bind(addr).await.unwrap();
    let (server, _shutdown) = start_server_on(listener).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(server.metrics.snapshot().streams_opened, 0);
}
