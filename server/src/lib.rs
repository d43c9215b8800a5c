//! Event stream server: `GET /api/events` pushes `connected`, `counter` and
//! `random` events over SSE until the client goes away.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

pub mod handlers;
pub mod stream;

use handlers::http::{Router, build_api_router};
use shared::types::AppConfig;
use stream::StreamMetrics;

/// Cheaply cloneable state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub metrics: Arc<StreamMetrics>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            metrics: Arc::new(StreamMetrics::new()),
        }
    }
}

/// Accept connections on `listener` until `shutdown` resolves.
///
/// Each TCP connection is served on its own task with HTTP/1.1 keep-alive.
/// Streams already open keep running until their client disconnects or the
/// runtime stops.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let router = Arc::new(build_api_router());
    debug!("{:?}", router);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };
                spawn_connection(stream, peer, Arc::clone(&router), state.clone());
            }
        }
    }

    Ok(())
}

fn spawn_connection(
    stream: tokio::net::TcpStream,
    peer: std::net::SocketAddr,
    router: Arc<Router>,
    state: AppState,
) {
    let io = TokioIo::new(stream);
    tokio::task::spawn(async move {
        let service = service_fn(move |req| {
            let router = Arc::clone(&router);
            let state = state.clone();
            async move { router.handle(req, state).await }
        });

        // Handle the connection from the client using HTTP1 and pass any
        // HTTP requests received on that connection to the router
        if let Err(err) = http1::Builder::new()
            .timer(TokioTimer::new())
            .serve_connection(io, service)
            .await
        {
            // Peers dropping an open event stream land here; not an error for us.
            debug!("Connection from {} ended: {:?}", peer, err);
        }
    });
}
