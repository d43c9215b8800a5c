use anyhow::{Context, Result};
use bytes::Bytes;
use futures_util::StreamExt;
use http_body_util::{BodyExt, StreamBody, combinators::BoxBody};
use hyper::{Response, StatusCode, body::Frame, header::HeaderValue};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::AppState;
use crate::handlers::http::utils::deliver_serialized_json;
use crate::stream::StreamConnection;
use shared::types::ErrorResponse;

// ---------------------------------------------------------------------------
// SseStreamBuilder
// ---------------------------------------------------------------------------

/// Helpers for SSE response headers
pub struct SseStreamBuilder;

impl SseStreamBuilder {
    /// Standard SSE response headers: content type and cache control
    pub fn response_headers() -> (HeaderValue, HeaderValue) {
        (
            HeaderValue::from_static("text/event-stream"),
            HeaderValue::from_static("no-cache"),
        )
    }
}

// ---------------------------------------------------------------------------
// GET /api/events
// ---------------------------------------------------------------------------

/// Open a live event stream.
///
/// ### Event sequence emitted
/// ```text
/// event: connected   once, before anything else
/// event: counter     every second, count = 1, 2, 3, …
/// event: random      every two seconds, number in [0, 100)
/// ```
///
/// The stream never ends on its own. When the client goes away hyper drops
/// the response body, which drops the [`StreamConnection`] held inside it and
/// cancels both emitters.
pub fn open_event_stream(state: &AppState) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let limit = state.config.server.max_connections;

    let Some(slot) = state.metrics.try_open(limit) else {
        warn!("Event stream rejected: {} streams already open", limit);
        return deliver_serialized_json(
            &ErrorResponse::too_many_streams(limit),
            StatusCode::SERVICE_UNAVAILABLE,
        );
    };

    let (mut connection, mut rx) = StreamConnection::open(
        Arc::clone(&state.metrics),
        slot,
        state.config.stream.channel_capacity,
    )
    .context("Failed to open event stream")?;
    connection.start().context("Failed to start event stream")?;

    let (content_type, cache_control) = SseStreamBuilder::response_headers();

    let stream = async_stream::stream! {
        // Owned by the body from here on.
        let connection = connection;

        while let Some(frame) = rx.recv().await {
            yield Ok::<Bytes, Infallible>(frame);
        }

        debug!(stream = %connection.id(), "Every emitter stopped, ending body");
    };

    let body = BodyExt::boxed(StreamBody::new(
        stream.map(|result| result.map(Frame::data)),
    ));

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", content_type)
        .header("cache-control", cache_control)
        .header("connection", "keep-alive")
        .header("x-accel-buffering", "no")
        .body(body)
        .map_err(|e| {
            error!("Failed to build SSE response: {}", e);
            anyhow::anyhow!("Failed to build SSE response: {}", e)
        })
}
