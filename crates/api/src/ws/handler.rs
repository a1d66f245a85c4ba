use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use printframe_core::job_events::{ClientMessage, ServerMessage};
use printframe_core::types::DbId;

use crate::auth::jwt::validate_token;
use crate::state::AppState;

/// GET /api/v1/ws
///
/// Upgrades to a WebSocket. The connection carries no identity until a
/// `subscribe` message with a valid token arrives.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = state.ws_manager.add(conn_id.clone()).await;
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => handle_client_text(&state, &conn_id, text.as_str()).await,
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Apply one inbound text frame to the connection `conn_id`.
///
/// A subscription is accepted only for a valid token whose subject owns the
/// job. On acceptance the current status is sent right away so a client
/// that subscribes after a transition still sees it.
pub async fn handle_client_text(state: &AppState, conn_id: &str, text: &str) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(conn_id, error = %e, "Malformed push channel message");
            reply_error(state, conn_id, "Malformed message").await;
            return;
        }
    };

    match message {
        ClientMessage::Subscribe { job_id, token } => subscribe(state, conn_id, job_id, &token).await,
        ClientMessage::Unsubscribe { job_id } => state.ws_manager.unsubscribe(conn_id, job_id).await,
    }
}

async fn subscribe(state: &AppState, conn_id: &str, job_id: DbId, token: &str) {
    let Ok(claims) = validate_token(token, &state.config.jwt) else {
        reply_error(state, conn_id, "Invalid or expired token").await;
        return;
    };

    let job = match state.service.jobs().find(job_id).await {
        Ok(job) => job.filter(|job| job.user_id == claims.sub),
        Err(e) => {
            tracing::error!(conn_id, job_id, error = %e, "Failed to load job for subscription");
            reply_error(state, conn_id, "Subscription failed, please retry").await;
            return;
        }
    };
    let Some(job) = job else {
        // Missing and foreign jobs are indistinguishable.
        reply_error(state, conn_id, &format!("Job {job_id} not found")).await;
        return;
    };

    if !state.ws_manager.subscribe(conn_id, &claims.sub, job_id).await {
        reply_error(state, conn_id, "Connection is bound to another user").await;
        return;
    }
    tracing::debug!(conn_id, job_id, user_id = %claims.sub, "Push subscription added");

    state
        .ws_manager
        .send(conn_id, &ServerMessage::Subscribed { job_id })
        .await;
    state
        .ws_manager
        .send(
            conn_id,
            &ServerMessage::JobUpdated {
                job_id,
                status: job.status,
                error_message: job.error_message,
            },
        )
        .await;
}

async fn reply_error(state: &AppState, conn_id: &str, message: &str) {
    state
        .ws_manager
        .send(
            conn_id,
            &ServerMessage::Error {
                message: message.to_string(),
            },
        )
        .await;
}
