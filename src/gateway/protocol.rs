use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A frame sent by a WebSocket client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    Subscribe {
        execution_id: String,
    },
    Unsubscribe {
        execution_id: String,
    },
    UserInput {
        execution_id: String,
        response: Value,
        #[serde(default)]
        node_id: Option<String>,
    },
}

/// Acknowledgements sent to a WebSocket client.
///
/// Execution events go out as serialized [`Envelope`](crate::events::Envelope)s.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    Subscribed {
        execution_id: String,
    },
    Unsubscribed {
        execution_id: String,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        execution_id: Option<String>,
        message: String,
    },
}

impl ServerFrame {
    pub fn error(
        execution_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        ServerFrame::Error {
            execution_id,
            message: message.into(),
        }
    }
}
