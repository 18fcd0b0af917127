//! HTTP surface of the terminal.
//!
//! - `GET /fp` - landing text
//! - `GET /fp/command?action=..&id=..` - scan/enroll/erase/status commands
//! - `GET /fp/events` - server-sent event stream
//! - `/api/*` - template administration
//!
//! Every route answers with permissive CORS headers.

use std::net::SocketAddr;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use fpterm_core::TemplateId;
use fpterm_hardware::FingerprintSensor;
use fpterm_terminal::FpEvent;

use crate::sse::event_stream;
use crate::state::AppState;

pub const LANDING_TEXT: &str = "Use /fp/command?action=scan or subscribe to SSE /fp/events";

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Query string of `/fp/command` and the `/api` routes taking an id.
#[derive(Debug, Default, Deserialize)]
pub struct CommandParams {
    pub action: Option<String>,
    pub id: Option<String>,
}

impl CommandParams {
    fn template_id(&self) -> Option<TemplateId> {
        self.id.as_deref().and_then(|s| s.parse().ok())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/fp", get(landing))
        .route("/fp/command", get(command))
        .route("/fp/events", get(events))
        .route("/api/status", get(api_status))
        .route("/api/info", get(api_info))
        .route("/api/count", get(api_count))
        .route("/api/empty", post(api_empty))
        .route("/api/id", delete(api_delete))
        .route("/api/enroll", post(api_enroll))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the listener fails.
pub async fn serve(addr: &str, state: AppState) -> Result<(), HttpError> {
    let listener = TcpListener::bind(addr).await.map_err(|source| HttpError::Bind {
        addr: addr.to_string(),
        source,
    })?;
    let local: Option<SocketAddr> = listener.local_addr().ok();
    info!(addr = ?local, "HTTP server listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

async fn landing() -> Html<&'static str> {
    Html(LANDING_TEXT)
}

async fn command(State(state): State<AppState>, Query(params): Query<CommandParams>) -> Response {
    let action = params.action.as_deref().unwrap_or_default();
    info!(action, id = ?params.id, "HTTP command");

    match action {
        "scan" => {
            state.request_scan();
            reply(StatusCode::ACCEPTED, json!({"status": "ok", "action": "scan"}))
        }
        "enrollStart" => {
            state.queue.emit(&FpEvent::enroll_start(params.template_id()));
            reply(StatusCode::ACCEPTED, json!({"status": "ok", "action": "enrollStart"}))
        }
        "enrollAbort" => {
            if !state.enroller.abort() {
                state.queue.emit(&FpEvent::enroll_abort());
            }
            reply(StatusCode::ACCEPTED, json!({"status": "ok", "action": "enrollAbort"}))
        }
        "erase" => match params.id.as_deref().map(str::trim) {
            None | Some("") => reply(StatusCode::BAD_REQUEST, json!({"error": "missing id"})),
            Some(raw) => match raw.parse::<u16>() {
                Ok(id) => {
                    state.queue.emit(&FpEvent::erase_request(id));
                    reply(
                        StatusCode::ACCEPTED,
                        json!({"status": "ok", "action": "erase", "id": id}),
                    )
                }
                Err(_) => reply(StatusCode::BAD_REQUEST, json!({"error": "invalid id"})),
            },
        },
        "status" => reply(StatusCode::OK, json!({"status": "idle", "scanBar": true})),
        _ => reply(StatusCode::BAD_REQUEST, json!({"error": "unknown action"})),
    }
}

async fn events(State(state): State<AppState>) -> impl IntoResponse {
    info!(listeners = state.hub.listeners() + 1, "SSE listener connected");
    event_stream(state.hub.subscribe(), state.keep_alive)
}

async fn api_status(State(state): State<AppState>) -> Response {
    let templates = state.sensor.template_count().await.ok();
    reply(
        StatusCode::OK,
        json!({
            "ok": true,
            "state": state.current_state().as_str(),
            "templates": templates,
            "pending": state.queue.len(),
        }),
    )
}

async fn api_info(State(state): State<AppState>) -> Response {
    match state.sensor.parameters().await {
        Ok(p) => reply(
            StatusCode::OK,
            json!({
                "ok": true,
                "capacity": p.capacity,
                "security": p.security_level,
                "systemId": p.system_id,
                "baud": p.baud_rate,
                "packetLen": p.packet_len,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Reading sensor parameters failed");
            reply(StatusCode::INTERNAL_SERVER_ERROR, json!({"ok": false}))
        }
    }
}

async fn api_count(State(state): State<AppState>) -> Response {
    match state.sensor.template_count().await {
        Ok(count) => reply(StatusCode::OK, json!({"ok": true, "count": count})),
        Err(e) => {
            warn!(error = %e, "Counting templates failed");
            reply(StatusCode::INTERNAL_SERVER_ERROR, json!({"ok": false}))
        }
    }
}

async fn api_empty(State(state): State<AppState>) -> Response {
    match state.empty_database().await {
        Ok(()) => reply(StatusCode::OK, json!({"ok": true})),
        Err(e) => {
            warn!(error = %e, "Emptying template database failed");
            reply(StatusCode::INTERNAL_SERVER_ERROR, json!({"ok": false}))
        }
    }
}

async fn api_delete(
    State(state): State<AppState>,
    Query(params): Query<CommandParams>,
) -> Response {
    let Some(id) = params.template_id() else {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({"ok": false, "error": "id requerido"}),
        );
    };

    match state.delete_template(id).await {
        Ok(true) => reply(StatusCode::OK, json!({"ok": true, "id": id})),
        Ok(false) => reply(StatusCode::NOT_FOUND, json!({"ok": false, "id": id})),
        Err(e) => {
            warn!(%id, error = %e, "Deleting template failed");
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"ok": false, "id": id}),
            )
        }
    }
}

async fn api_enroll(
    State(state): State<AppState>,
    Query(params): Query<CommandParams>,
) -> Response {
    let Some(id) = params.template_id() else {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({"ok": false, "error": "id requerido"}),
        );
    };

    match state.enroller.start(id) {
        Ok(()) => reply(StatusCode::ACCEPTED, json!({"ok": true, "id": id})),
        Err(e) => reply(
            StatusCode::CONFLICT,
            json!({"ok": false, "id": id, "error": e.to_string()}),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{harness, payloads};
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, header};
    use fpterm_terminal::ScanState;
    use rstest::rstest;
    use tower::ServiceExt;

    async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_scan_command_prompts_and_opens_request() {
        let h = harness().await;
        let app = router(h.state.clone());

        let (status, body) = call(app, Method::GET, "/fp/command?action=scan").await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, json!({"status": "ok", "action": "scan"}));
        assert!(h.state.gate.is_live());
        assert_eq!(
            payloads(&h.state),
            vec![r#"{"event":"prompt","msg":"Ponga su huella"}"#]
        );

        h.clock.advance(15_001);
        assert!(!h.state.gate.is_live());
    }

    #[rstest]
    #[case("enrollStart", r#"{"event":"enroll","stage":"start"}"#)]
    #[case("enrollAbort", r#"{"event":"enroll","stage":"abort"}"#)]
    #[tokio::test]
    async fn test_enroll_commands_emit_events(#[case] action: &str, #[case] payload: &str) {
        let h = harness().await;
        let uri = format!("/fp/command?action={action}");

        let (status, body) = call(router(h.state.clone()), Method::GET, &uri).await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, json!({"status": "ok", "action": action}));
        assert_eq!(payloads(&h.state), vec![payload]);
    }

    #[tokio::test]
    async fn test_erase_command_echoes_id() {
        let h = harness().await;

        let (status, body) =
            call(router(h.state.clone()), Method::GET, "/fp/command?action=erase&id=42").await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, json!({"status": "ok", "action": "erase", "id": 42}));
        assert_eq!(
            payloads(&h.state),
            vec![r#"{"event":"erase","stage":"request","id":42}"#]
        );
    }

    #[rstest]
    #[case("/fp/command?action=erase", json!({"error": "missing id"}))]
    #[case("/fp/command?action=erase&id=", json!({"error": "missing id"}))]
    #[case("/fp/command?action=erase&id=abc", json!({"error": "invalid id"}))]
    #[case("/fp/command?action=erase&id=70000", json!({"error": "invalid id"}))]
    #[case("/fp/command?action=reboot", json!({"error": "unknown action"}))]
    #[case("/fp/command", json!({"error": "unknown action"}))]
    #[tokio::test]
    async fn test_bad_commands(#[case] uri: &str, #[case] expected: Value) {
        let h = harness().await;

        let (status, body) = call(router(h.state.clone()), Method::GET, uri).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, expected);
        assert!(h.state.queue.is_empty());
        assert!(!h.state.gate.is_live());
    }

    #[tokio::test]
    async fn test_status_command() {
        let h = harness().await;
        let (status, body) =
            call(router(h.state.clone()), Method::GET, "/fp/command?action=status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "idle", "scanBar": true}));
    }

    #[tokio::test]
    async fn test_landing_and_cors() {
        let h = harness().await;
        let response = router(h.state)
            .oneshot(
                Request::builder()
                    .uri("/fp")
                    .header(header::ORIGIN, "http://example.test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], LANDING_TEXT.as_bytes());
    }

    #[tokio::test]
    async fn test_events_route_is_event_stream() {
        let h = harness().await;
        let response = router(h.state.clone())
            .oneshot(Request::builder().uri("/fp/events").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert!(h.state.hub.listeners() >= 1);
    }

    #[tokio::test]
    async fn test_api_status_reports_state_and_counts() {
        let h = harness().await;
        h.handle.add_template(TemplateId::new(1).unwrap(), 0x11);
        h.state.request_scan();
        h.state_tx.send(ScanState::Cooldown).unwrap();

        let (status, body) = call(router(h.state.clone()), Method::GET, "/api/status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"ok": true, "state": "cooldown", "templates": 1, "pending": 1})
        );
    }

    #[tokio::test]
    async fn test_api_info_and_count() {
        let h = harness().await;
        h.handle.add_template(TemplateId::new(3).unwrap(), 0x33);

        let (status, body) = call(router(h.state.clone()), Method::GET, "/api/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
        assert_eq!(body["baud"], json!(57_600));

        let (status, body) = call(router(h.state.clone()), Method::GET, "/api/count").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true, "count": 1}));

        h.handle.set_connected(false);
        let (status, body) = call(router(h.state.clone()), Method::GET, "/api/count").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"ok": false}));
    }

    #[tokio::test]
    async fn test_api_delete() {
        let h = harness().await;
        h.handle.add_template(TemplateId::new(8).unwrap(), 0x88);

        let (status, body) = call(router(h.state.clone()), Method::DELETE, "/api/id?id=8").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true, "id": 8}));

        let (status, body) = call(router(h.state.clone()), Method::DELETE, "/api/id?id=8").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"ok": false, "id": 8}));

        let (status, body) = call(router(h.state.clone()), Method::DELETE, "/api/id").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"ok": false, "error": "id requerido"}));
    }

    #[tokio::test]
    async fn test_api_empty() {
        let h = harness().await;
        h.handle.add_template(TemplateId::new(1).unwrap(), 0x11);
        h.handle.add_template(TemplateId::new(2).unwrap(), 0x22);

        let (status, body) = call(router(h.state.clone()), Method::POST, "/api/empty").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));
        assert_eq!(h.handle.template_count(), 0);
    }

    #[tokio::test]
    async fn test_api_enroll() {
        let h = harness().await;

        let (status, _) = call(router(h.state.clone()), Method::POST, "/api/enroll?id=1000").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let lease = h.lock.try_acquire().unwrap();
        let (status, body) = call(router(h.state.clone()), Method::POST, "/api/enroll?id=5").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["ok"], json!(false));
        drop(lease);

        let (status, body) = call(router(h.state.clone()), Method::POST, "/api/enroll?id=5").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, json!({"ok": true, "id": 5}));
        assert!(h.state.enroller.is_running());
        assert!(h.state.enroller.abort());
    }
}
