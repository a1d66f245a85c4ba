//! Push channel consumer.
//!
//! [`WsPushConnector`] opens the API's WebSocket, subscribes to one job and
//! hands back a stream of [`ServerMessage`]s. The stream ends with an error
//! item when the socket drops so the caller can fall back to polling.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{SinkExt, StreamExt};
use printframe_core::job_events::{ClientMessage, ServerMessage};
use printframe_core::types::DbId;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::ClientError;

/// Messages for one subscribed job, in arrival order.
pub type PushStream = BoxStream<'static, Result<ServerMessage, ClientError>>;

/// Opens a push subscription for a single job.
#[async_trait]
pub trait PushConnector: Send + Sync {
    /// Resolve once the server has acknowledged the subscription.
    async fn connect(&self, job_id: DbId) -> Result<PushStream, ClientError>;
}

/// WebSocket implementation of [`PushConnector`].
pub struct WsPushConnector {
    ws_url: Url,
    token: String,
}

impl WsPushConnector {
    pub fn new(ws_url: Url, token: impl Into<String>) -> Self {
        Self {
            ws_url,
            token: token.into(),
        }
    }
}

#[async_trait]
impl PushConnector for WsPushConnector {
    async fn connect(&self, job_id: DbId) -> Result<PushStream, ClientError> {
        let (mut socket, _response) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| ClientError::Push(format!("failed to connect to {}: {e}", self.ws_url)))?;

        let subscribe = serde_json::to_string(&ClientMessage::Subscribe {
            job_id,
            token: self.token.clone(),
        })?;
        socket
            .send(Message::Text(subscribe))
            .await
            .map_err(|e| ClientError::Push(e.to_string()))?;

        // The acknowledgement must arrive before any update is trusted.
        loop {
            let frame = socket
                .next()
                .await
                .ok_or_else(|| ClientError::Push("closed before subscription was acknowledged".into()))?
                .map_err(|e| ClientError::Push(e.to_string()))?;
            match decode_frame(frame) {
                Some(Ok(ServerMessage::Subscribed { job_id: acked })) if acked == job_id => break,
                Some(Ok(ServerMessage::Error { message })) => return Err(ClientError::Push(message)),
                Some(Err(e)) => return Err(e),
                _ => continue,
            }
        }
        tracing::debug!(job_id, url = %self.ws_url, "Push subscription acknowledged");

        let stream = socket.filter_map(|frame| async move {
            match frame {
                Ok(frame) => decode_frame(frame),
                Err(e) => Some(Err(ClientError::Push(e.to_string()))),
            }
        });
        Ok(stream.boxed())
    }
}

/// Map one WebSocket frame to a push item. Control frames yield nothing; a
/// close frame becomes an error so consumers notice the drop.
fn decode_frame(frame: Message) -> Option<Result<ServerMessage, ClientError>> {
    match frame {
        Message::Text(text) => Some(serde_json::from_str(&text).map_err(ClientError::from)),
        Message::Close(_) => Some(Err(ClientError::Push("closed by server".into()))),
        _ => None,
    }
}
