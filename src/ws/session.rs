use std::time::{Duration, Instant};

use actix_web::{HttpRequest, HttpResponse, web};
use actix_ws::{CloseCode, CloseReason, Message, MessageStream, Session};
use chrono::Utc;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast::{self, error::RecvError};

use super::hub::EventHub;
use crate::auth::auth::{access_token, authenticate_token};
use crate::config::Config;
use crate::error::ApiError;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(75);

#[derive(Deserialize)]
pub struct WsQuery {
    /// Browsers cannot set headers on a websocket handshake
    pub token: Option<String>,
}

pub async fn ws_connect(
    req: HttpRequest,
    body: web::Payload,
    query: web::Query<WsQuery>,
    hub: web::Data<EventHub>,
    config: web::Data<Config>,
) -> actix_web::Result<HttpResponse> {
    let token = query
        .into_inner()
        .token
        .or_else(|| access_token(&req))
        .ok_or_else(|| ApiError::Unauthorized("Missing token".into()))?;
    let user = authenticate_token(&token, &config)?;

    let (response, session, stream) = actix_ws::handle(&req, body)?;
    let rx = hub.subscribe();

    tracing::info!(user_id = user.user_id, "WebSocket connected");
    actix_web::rt::spawn(run_session(session, stream, rx, user.user_id));

    Ok(response)
}

async fn run_session(
    mut session: Session,
    mut stream: MessageStream,
    mut rx: broadcast::Receiver<String>,
    user_id: u64,
) {
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut last_seen = Instant::now();

    let reason = loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if last_seen.elapsed() > CLIENT_TIMEOUT {
                    tracing::info!(user_id, "WebSocket client timed out");
                    break Some(CloseReason::from(CloseCode::Away));
                }
                if session.ping(b"").await.is_err() {
                    break None;
                }
            }
            event = rx.recv() => match event {
                Ok(text) => {
                    if session.text(text).await.is_err() {
                        break None;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id, skipped, "WebSocket subscriber lagged");
                }
                Err(RecvError::Closed) => break None,
            },
            msg = stream.next() => {
                last_seen = Instant::now();
                match msg {
                    Some(Ok(Message::Ping(bytes))) => {
                        if session.pong(&bytes).await.is_err() {
                            break None;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        if is_app_ping(&text) && session.text(pong()).await.is_err() {
                            break None;
                        }
                    }
                    Some(Ok(Message::Close(reason))) => break reason,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(user_id, error = %e, "WebSocket protocol error");
                        break None;
                    }
                    None => break None,
                }
            }
        }
    };

    let _ = session.close(reason).await;
    tracing::info!(user_id, "WebSocket session ended");
}

fn is_app_ping(raw: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(raw),
        Ok(Value::Object(map)) if map.get("type").and_then(Value::as_str) == Some("ping")
    )
}

fn pong() -> String {
    json!({ "event": "pong", "payload": {}, "ts": Utc::now().to_rfc3339() }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{TokenSubject, generate_access_token};
    use actix_web::{App, http::StatusCode, test as actix_test, web::Data};

    #[test]
    fn recognises_application_ping() {
        assert!(is_app_ping(r#"{"type":"ping"}"#));
        assert!(!is_app_ping(r#"{"type":"subscribe"}"#));
        assert!(!is_app_ping("ping"));
    }

    #[actix_web::test]
    async fn handshake_requires_a_token() {
        let config = Config::for_tests();
        let app = actix_test::init_service(
            App::new()
                .app_data(Data::new(config))
                .app_data(Data::new(EventHub::default()))
                .route("/ws", web::get().to(ws_connect)),
        )
        .await;

        let resp = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/ws").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn valid_token_without_upgrade_headers_is_a_bad_request() {
        let config = Config::for_tests();
        let token = generate_access_token(
            &TokenSubject {
                user_id: 1,
                email: "a@company.com".into(),
                role: 2,
                employee_id: "EMP-2026-0001".into(),
            },
            &config.jwt_secret,
            60,
        )
        .unwrap();

        let app = actix_test::init_service(
            App::new()
                .app_data(Data::new(config))
                .app_data(Data::new(EventHub::default()))
                .route("/ws", web::get().to(ws_connect)),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri(&format!("/ws?token={token}"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
