//! HTTP transport adapter.
//!
//! A thin axum layer over [`Engine`]: every method and path funnels into the
//! same handler, which reduces the request to a transport-agnostic
//! [`RequestMeta`], runs the pipeline, and maps the resulting envelope back
//! onto an HTTP response. All routing decisions belong to the pipeline's
//! router stage, not to axum.
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{Request, State},
    response::Response,
    routing::any,
};
use http::{HeaderName, HeaderValue, StatusCode, header};
use tracing::Instrument;

use crate::{
    core::{
        engine::Engine,
        envelope::{Envelope, Reply},
        pipeline::{PipelineOutcome, RequestMeta},
    },
    tracing_setup::create_request_span,
    utils::cookie,
};

/// Request bodies above this size are rejected before the pipeline runs.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the axum application serving the engine.
pub fn app(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/", any(serve))
        .route("/{*path}", any(serve))
        .with_state(engine)
}

async fn serve(State(engine): State<Arc<Engine>>, request: Request) -> Response {
    let meta = match request_meta(request).await {
        Ok(meta) => meta,
        Err(envelope) => {
            return render(
                PipelineOutcome {
                    envelope,
                    context: Default::default(),
                },
                false,
            );
        }
    };
    let head_only = meta.method.eq_ignore_ascii_case("head");
    let span = create_request_span(&meta.method, &meta.target);
    let start = std::time::Instant::now();
    let outcome = engine.handle(&meta).instrument(span.clone()).await;
    span.record("http.status_code", u64::from(outcome.envelope.status_code));
    span.record("duration_ms", start.elapsed().as_millis() as u64);
    render(outcome, head_only)
}

/// Reduce an HTTP request to the pipeline's transport-agnostic form.
async fn request_meta(request: Request) -> Result<RequestMeta, Envelope> {
    let (parts, body) = request.into_parts();

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        // Parameters like "; charset=utf-8" do not select the parser.
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_string());

    let cookies = parts
        .headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(cookie::unserialize)
        .unwrap_or_default();

    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| Envelope::respond(Reply::BadRequest).with_message("unreadable request body"))?;
    let payload = if bytes.is_empty() {
        None
    } else {
        Some(
            String::from_utf8(bytes.to_vec())
                .map_err(|_| Envelope::fail("request body is not valid UTF-8"))?,
        )
    };

    Ok(RequestMeta {
        method: parts.method.as_str().to_string(),
        target,
        content_type,
        cookies,
        payload,
    })
}

/// Map a pipeline outcome onto an HTTP response: envelope code and headers,
/// JSON body, and the session cookie the pipeline resolved.
fn render(outcome: PipelineOutcome, head_only: bool) -> Response {
    let envelope = &outcome.envelope;
    let status =
        StatusCode::from_u16(envelope.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut builder = Response::builder().status(status).header(
        header::CONTENT_TYPE,
        envelope
            .content_type
            .as_deref()
            .unwrap_or("application/json"),
    );

    if let Some(headers) = &envelope.header {
        for (name, value) in headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => builder = builder.header(name, value),
                _ => tracing::warn!(header = %name, "dropping invalid response header"),
            }
        }
    }

    if let Some(session_id) = outcome.context.get_str("sessionId") {
        match HeaderValue::try_from(format!(
            "sessionId={session_id}; Path=/; HttpOnly; SameSite=Lax"
        )) {
            Ok(value) => builder = builder.header(header::SET_COOKIE, value),
            Err(_) => tracing::warn!("session id is not a valid cookie value"),
        }
    }

    let body = if head_only {
        Body::empty()
    } else {
        match serde_json::to_vec(envelope) {
            Ok(bytes) => Body::from(bytes),
            Err(e) => {
                tracing::error!(%e, "failed to serialize response envelope");
                Body::from(r#"{"status":"error","statusCode":500,"message":"Internal error"}"#)
            }
        }
    };

    match builder.body(body) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(%e, "failed to build response");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}
