use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, error};

use crate::AppState;
use crate::handlers::http::utils::json_response;
use crate::handlers::sse;

use shared::types::event::EVENTS_PATH;
use shared::types::{ErrorResponse, StreamStats};

// ---------------------------------------------------------------------------
// Handler type alias
// ---------------------------------------------------------------------------
//
// No route in this server is authenticated, so there is a single tier:
// every handler receives (req, state).

type RouteHandler = Box<
    dyn Fn(
            Request<hyper::body::Incoming>,
            AppState,
        )
            -> Pin<Box<dyn Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send>>
        + Send
        + Sync,
>;

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

struct Route {
    method: Method,
    path: String,
    handler: RouteHandler,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct Router {
    routes: Vec<Route>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes_count", &self.routes.len())
            .finish()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn get<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method: Method::GET,
            path: path.to_string(),
            handler: Box::new(move |req, state| Box::pin(handler(req, state))),
        });
        self
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    pub async fn route(
        &self,
        req: Request<hyper::body::Incoming>,
        state: AppState,
    ) -> Result<Response<BoxBody<Bytes, Infallible>>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        for route in &self.routes {
            if route.method == method && Self::path_matches(&route.path, &path) {
                debug!("{} {}", method, path);
                return (route.handler)(req, state).await;
            }
        }

        debug!("No route for {} {}", method, path);
        json_response::deliver_serialized_json(&ErrorResponse::not_found(), StatusCode::NOT_FOUND)
            .context("Failed to deliver 404 response")
    }

    /// Entry point for hyper's `service_fn`. Handler failures become a 500 JSON body.
    pub async fn handle(
        &self,
        req: Request<hyper::body::Incoming>,
        state: AppState,
    ) -> std::result::Result<Response<BoxBody<Bytes, Infallible>>, Infallible> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        match self.route(req, state).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                error!("{} {} failed: {:#}", method, path, e);
                Ok(internal_error())
            }
        }
    }

    // ── Path matching ─────────────────────────────────────────────────────────

    pub fn path_matches(route_path: &str, request_path: &str) -> bool {
        // Strip query string from incoming request path before comparing.
        let clean = request_path.split('?').next().unwrap_or(request_path);
        route_path == clean
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn internal_error() -> Response<BoxBody<Bytes, Infallible>> {
    json_response::deliver_error_json(
        "INTERNAL_ERROR",
        "Internal server error",
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .unwrap_or_else(|_| {
        let mut resp = Response::new(json_response::empty());
        *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        resp
    })
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(flatten)]
    streams: StreamStats,
}

// ---------------------------------------------------------------------------
// API router
// ---------------------------------------------------------------------------

pub fn build_api_router() -> Router {
    Router::new()
        .get(EVENTS_PATH, |_req, state| async move {
            sse::open_event_stream(&state).context("Event stream failed")
        })
        .get("/health", |_req, state| async move {
            let health = HealthResponse {
                status: "ok",
                streams: state.metrics.snapshot(),
            };
            json_response::deliver_serialized_json(&health, StatusCode::OK)
                .context("Failed to deliver health response")
        })
}
