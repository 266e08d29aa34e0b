//! Telemetry subscription stream messages.

use crate::path::Path;
use crate::protocol::{Classify, MessageKind, Protocol, SubscriptionProtocol};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sample interval used by the command line when none is given.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(5000);

pub struct Telemetry;

impl Protocol for Telemetry {
    const NAME: &'static str = "telemetry";
    const REQUIRES_ARBITRATION: bool = false;

    type Request = SubscribeRequest;
    type Response = SubscribeResponse;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionMode {
    OnChange,
    Sample { interval: Duration },
}

impl SubscriptionMode {
    pub fn sample(interval: Duration) -> Self {
        SubscriptionMode::Sample { interval }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListMode {
    Stream,
    Once,
    Poll,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    OnChange,
    Sample,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub path: Path,
    pub mode: StreamMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_interval_ms: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionList {
    pub mode: ListMode,
    #[serde(default)]
    pub updates_only: bool,
    pub subscriptions: Vec<Subscription>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscribeRequest {
    Subscribe(SubscriptionList),
    Poll,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub path: Path,
    pub value: serde_json::Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Nanoseconds since the unix epoch, as stamped by the device.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<Path>,
    #[serde(default)]
    pub updates: Vec<Update>,
    #[serde(default)]
    pub deletes: Vec<Path>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeError {
    pub code: i32,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscribeResponse {
    Update(Notification),
    /// Marks the end of the initial snapshot.
    SyncResponse(bool),
    Error(SubscribeError),
}

impl Classify for SubscribeRequest {
    fn kind(&self) -> MessageKind {
        MessageKind::SubscribeRequest
    }
}

impl Classify for SubscribeResponse {
    fn kind(&self) -> MessageKind {
        match self {
            SubscribeResponse::Update(_) => MessageKind::SubscribeUpdate,
            SubscribeResponse::SyncResponse(_) => MessageKind::SyncResponse,
            SubscribeResponse::Error(_) => MessageKind::Error,
        }
    }
}

impl SubscriptionProtocol for Telemetry {
    fn subscription_request(
        path: &Path,
        mode: SubscriptionMode,
        updates_only: bool,
    ) -> SubscribeRequest {
        let (stream_mode, sample_interval_ms) = match mode {
            SubscriptionMode::OnChange => (StreamMode::OnChange, None),
            SubscriptionMode::Sample { interval } => (
                StreamMode::Sample,
                Some(u64::try_from(interval.as_millis()).unwrap_or(u64::MAX)),
            ),
        };

        SubscribeRequest::Subscribe(SubscriptionList {
            mode: ListMode::Stream,
            updates_only,
            subscriptions: vec![Subscription {
                path: path.clone(),
                mode: stream_mode,
                sample_interval_ms,
            }],
        })
    }
}
