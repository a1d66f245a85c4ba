//! WebSocket message types for the job push channel.
//!
//! Used by the API's WebSocket handler and notification router on the
//! server side, and by the push observer in the client crate.

use serde::{Deserialize, Serialize};

use crate::status::UpscaleStatus;
use crate::types::DbId;

/// Client asks to follow one job.
pub const MSG_TYPE_SUBSCRIBE: &str = "subscribe";

/// Client stops following a job.
pub const MSG_TYPE_UNSUBSCRIBE: &str = "unsubscribe";

/// Server acknowledged a subscription.
pub const MSG_TYPE_SUBSCRIBED: &str = "subscribed";

/// A followed job changed status.
pub const MSG_TYPE_JOB_UPDATED: &str = "job_updated";

/// Subscription refused or malformed message.
pub const MSG_TYPE_ERROR: &str = "error";

/// Messages sent by clients over the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Browser WebSockets cannot set headers, so the bearer token rides
    /// along with each subscription.
    #[serde(rename_all = "camelCase")]
    Subscribe { job_id: DbId, token: String },
    #[serde(rename_all = "camelCase")]
    Unsubscribe { job_id: DbId },
}

/// Messages sent by the server over the push channel.
///
/// Job updates never carry signed URLs; clients fetch the status snapshot
/// for that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Subscribed { job_id: DbId },
    #[serde(rename_all = "camelCase")]
    JobUpdated {
        job_id: DbId,
        status: UpscaleStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_wire_form() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","jobId":12,"token":"t"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                job_id: 12,
                token: "t".into()
            }
        );
    }

    #[test]
    fn job_updated_wire_form() {
        let msg = ServerMessage::JobUpdated {
            job_id: 3,
            status: UpscaleStatus::Failed,
            error_message: Some("boom".into()),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], MSG_TYPE_JOB_UPDATED);
        assert_eq!(json["jobId"], 3);
        assert_eq!(json["status"], "failed");
        assert_eq!(json["errorMessage"], "boom");
    }

    #[test]
    fn type_tags_match_constants() {
        let subscribed = serde_json::to_value(ServerMessage::Subscribed { job_id: 1 }).unwrap();
        assert_eq!(subscribed["type"], MSG_TYPE_SUBSCRIBED);
        let error = serde_json::to_value(ServerMessage::Error { message: "x".into() }).unwrap();
        assert_eq!(error["type"], MSG_TYPE_ERROR);
        let unsubscribe = serde_json::to_value(ClientMessage::Unsubscribe { job_id: 1 }).unwrap();
        assert_eq!(unsubscribe["type"], MSG_TYPE_UNSUBSCRIBE);
        let subscribe = serde_json::to_value(ClientMessage::Subscribe {
            job_id: 1,
            token: "t".into(),
        })
        .unwrap();
        assert_eq!(subscribe["type"], MSG_TYPE_SUBSCRIBE);
    }
}
