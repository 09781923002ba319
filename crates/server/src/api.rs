// HTTP surface the chat gateway talks to.
//
// One POST per inbound event; the body of the answer is the bot's response.
// Failures inside event handling are already rendered as replies by the
// dispatcher, so the error envelope only covers transport problems.

use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header::AUTHORIZATION, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response as HttpResponse},
    routing::{get, post},
    Json, Router,
};
use folio_common::protocol::{Event, Response};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    dispatch::Dispatcher,
    error::{with_request_id_scope, ApiError, ErrorCode, REQUEST_ID_HEADER},
};

pub const MAX_REQUEST_BODY_BYTES: usize = 256 * 1024;

#[derive(Clone)]
pub struct AppState {
    dispatcher: Dispatcher,
    gateway_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, gateway_token: Option<String>) -> Self {
        Self { dispatcher, gateway_token: gateway_token.map(Arc::from) }
    }
}

pub fn build_router(state: AppState) -> Router {
    let interactions = Router::new()
        .route("/v1/interactions", post(handle_event))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_gateway_token));

    apply_middleware(
        Router::new()
            .route("/healthz", get(healthz))
            .route("/readyz", get(readyz))
            .merge(interactions)
            .with_state(state),
    )
}

fn apply_middleware(router: Router) -> Router {
    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(middleware::from_fn(request_context_middleware))
        .layer(middleware::from_fn(panic_handler))
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn readyz(State(state): State<AppState>) -> Result<(StatusCode, &'static str), ApiError> {
    state.dispatcher.store().health_check().await.map_err(|error| {
        warn!(error = %error, backend = state.dispatcher.store().backend_name(), "readiness check failed");
        ApiError::new(ErrorCode::Timeout, "storage is not ready")
    })?;
    Ok((StatusCode::OK, "ready"))
}

async fn handle_event(
    State(state): State<AppState>,
    payload: Result<Json<Event>, JsonRejection>,
) -> Result<Json<Response>, ApiError> {
    let Json(event) = payload.map_err(|rejection| {
        ApiError::new(ErrorCode::ValidationFailed, format!("malformed event: {}", rejection.body_text()))
    })?;
    Ok(Json(state.dispatcher.handle(event).await))
}

async fn require_gateway_token(State(state): State<AppState>, request: Request<Body>, next: Next) -> HttpResponse {
    let Some(expected) = state.gateway_token.as_deref() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token);

    match presented {
        Some(token) if token == expected => next.run(request).await,
        Some(_) => ApiError::new(ErrorCode::AuthInvalidToken, "invalid gateway token").into_response(),
        None => ApiError::new(ErrorCode::AuthInvalidToken, "missing gateway token").into_response(),
    }
}

fn extract_bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

async fn panic_handler(request: Request<Body>, next: Next) -> HttpResponse {
    match tokio::spawn(async move { next.run(request).await }).await {
        Ok(response) => response,
        Err(join_error) => {
            error!(?join_error, "request handling panicked");
            ApiError::from_code(ErrorCode::InternalError).into_response()
        }
    }
}

async fn request_context_middleware(request: Request<Body>, next: Next) -> HttpResponse {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started_at = Instant::now();

    let mut response = with_request_id_scope(request_id.clone(), next.run(request)).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started_at.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
        routing::{get, post},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::store::Store;

    fn test_router(token: Option<&str>) -> Router {
        let state = AppState::new(Dispatcher::new(Store::in_memory()), token.map(str::to_string));
        build_router(state)
    }

    fn event_request() -> axum::http::request::Builder {
        Request::builder()
            .method(Method::POST)
            .uri("/v1/interactions")
            .header("content-type", "application/json")
    }

    async fn json_body(response: HttpResponse) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body should read");
        serde_json::from_slice(&bytes).expect("body should be json")
    }

    fn help_event() -> Value {
        json!({
            "type": "command",
            "context": { "workspace_id": "w1", "actor": { "user_id": "u1" } },
            "invocation": { "name": "help", "options": {} }
        })
    }

    #[tokio::test]
    async fn health_check_has_request_id_header() {
        let response = test_router(None)
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).expect("request should build"))
            .await
            .expect("healthz should respond");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn readiness_passes_for_memory_store() {
        let response = test_router(None)
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).expect("request should build"))
            .await
            .expect("readyz should respond");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn help_command_round_trips_over_http() {
        let event = help_event();
        let response = test_router(None)
            .oneshot(
                event_request()
                    .header(REQUEST_ID_HEADER, "req-1")
                    .body(Body::from(event.to_string()))
                    .expect("request should build"),
            )
            .await
            .expect("event should respond");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-1");
        let body = json_body(response).await;
        assert_eq!(body["type"], "message");
        assert!(body["content"].as_str().expect("content").starts_with("Commands"));
        assert_eq!(body["ephemeral"], true);
    }

    #[tokio::test]
    async fn malformed_event_gets_error_envelope() {
        let response = test_router(None)
            .oneshot(
                event_request()
                    .header(REQUEST_ID_HEADER, "req-2")
                    .body(Body::from(r#"{"type":"nope"}"#))
                    .expect("request should build"),
            )
            .await
            .expect("event should respond");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
        assert_eq!(body["error"]["request_id"], "req-2");
    }

    #[tokio::test]
    async fn gateway_token_is_enforced_when_configured() {
        let router = test_router(Some("s3cret"));
        let event = help_event();

        let missing = router
            .clone()
            .oneshot(event_request().body(Body::from(event.to_string())).expect("request"))
            .await
            .expect("respond");
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = router
            .clone()
            .oneshot(
                event_request()
                    .header(AUTHORIZATION, "Bearer nope")
                    .body(Body::from(event.to_string()))
                    .expect("request"),
            )
            .await
            .expect("respond");
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let accepted = router
            .oneshot(
                event_request()
                    .header(AUTHORIZATION, "Bearer s3cret")
                    .body(Body::from(event.to_string()))
                    .expect("request"),
            )
            .await
            .expect("respond");
        assert_eq!(accepted.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_check_skips_gateway_token() {
        let response = test_router(Some("s3cret"))
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).expect("request should build"))
            .await
            .expect("healthz should respond");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn panic_handler_returns_internal_error() {
        async fn panic_route() -> &'static str {
            panic!("test panic");
        }

        let response = apply_middleware(Router::new().route("/panic", get(panic_route)))
            .oneshot(Request::builder().uri("/panic").body(Body::empty()).expect("request should build"))
            .await
            .expect("panic request should return a response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn request_body_limit_is_enforced() {
        async fn echo(body: String) -> String {
            body
        }

        let response = apply_middleware(Router::new().route("/echo", post(echo)))
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/echo")
                    .header("content-type", "text/plain")
                    .body(Body::from("a".repeat(MAX_REQUEST_BODY_BYTES + 1)))
                    .expect("request should build"),
            )
            .await
            .expect("echo should respond");
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
