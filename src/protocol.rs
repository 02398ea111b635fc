// SUBSCRIBE / UNSUBSCRIBE envelopes for the stats socket

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::Result;
use crate::models::StatType;
use crate::transport::FrameSink;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub name: StatType,
}

/// Subscription request. Absent lists go out as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "SUBSCRIBE")]
    pub subscribe: Option<Vec<Name>>,
    #[serde(rename = "UNSUBSCRIBE")]
    pub unsubscribe: Option<Vec<Name>>,
    #[serde(rename = "SESSION_ID")]
    pub session_id: String,
}

impl Request {
    /// Subscribes to `stats`, or to every category when `stats` is empty.
    pub fn subscribe(stats: &[StatType], session_id: impl Into<String>) -> Self {
        let stats = if stats.is_empty() {
            &StatType::ALL[..]
        } else {
            stats
        };
        Request {
            subscribe: Some(stats.iter().map(|&name| Name { name }).collect()),
            unsubscribe: None,
            session_id: session_id.into(),
        }
    }

    /// Turns a subscription into the matching unsubscription.
    pub fn into_unsubscribe(mut self) -> Self {
        self.unsubscribe = self.subscribe.take();
        self
    }

    /// Category names carried by either list.
    pub fn stat_types(&self) -> Vec<StatType> {
        self.subscribe
            .iter()
            .chain(self.unsubscribe.iter())
            .flatten()
            .map(|n| n.name)
            .collect()
    }
}

/// Encodes `req` as one frame and writes it to the socket.
pub async fn send<S: FrameSink>(sink: &mut S, req: &Request) -> Result<()> {
    let (frame, payload_type) = codec::encode(req)?;
    tracing::debug!(
        operation = "send_request",
        subscribe = req.subscribe.is_some(),
        unsubscribe = req.unsubscribe.is_some(),
        "sending stats request"
    );
    sink.send(frame, payload_type).await
}
