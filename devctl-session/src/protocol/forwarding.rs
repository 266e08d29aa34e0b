//! Forwarding-control stream messages: arbitration and packet I/O.
//!
//! Only the stream-channel messages are modelled; table programming and pipeline
//! configuration travel over unary calls that do not use a session.

use crate::protocol::{ArbitrationProtocol, ArbitrationReply, Classify, MessageKind, Protocol};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

/// Status code carried by an arbitration reply when this controller is primary.
pub const STATUS_OK: i32 = 0;
/// Status code carried by an arbitration reply when another controller is primary.
pub const STATUS_ALREADY_EXISTS: i32 = 6;

pub struct Forwarding;

impl Protocol for Forwarding {
    const NAME: &'static str = "forwarding";
    const REQUIRES_ARBITRATION: bool = true;

    type Request = StreamRequest;
    type Response = StreamResponse;
}

/// 128-bit election id; higher ids win arbitration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElectionId {
    pub high: u64,
    pub low: u64,
}

impl ElectionId {
    pub const fn new(high: u64, low: u64) -> Self {
        Self { high, low }
    }

    pub const fn from_u128(value: u128) -> Self {
        Self {
            high: (value >> 64) as u64,
            low: value as u64,
        }
    }

    pub const fn as_u128(self) -> u128 {
        ((self.high as u128) << 64) | self.low as u128
    }

    /// Current unix time in seconds as the high half, so later controllers win.
    pub fn time_based() -> Self {
        let seconds = chrono::Utc::now().timestamp().max(0) as u64;
        Self::new(seconds, 0)
    }
}

impl Display for ElectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.high, self.low)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid election id {0:?}: expected \"high,low\" or a single integer")]
pub struct ParseElectionIdError(String);

impl FromStr for ElectionId {
    type Err = ParseElectionIdError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseElectionIdError(text.to_string());
        match text.split_once(',') {
            Some((high, low)) => Ok(Self::new(
                high.trim().parse().map_err(|_| invalid())?,
                low.trim().parse().map_err(|_| invalid())?,
            )),
            None => text
                .trim()
                .parse::<u128>()
                .map(Self::from_u128)
                .map_err(|_| invalid()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Primary,
    Backup,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Role::Primary => f.write_str("primary"),
            Role::Backup => f.write_str("backup"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrationUpdate {
    pub device_id: u64,
    pub election_id: ElectionId,
    #[serde(default)]
    pub status_code: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_message: String,
}

impl ArbitrationUpdate {
    pub fn request(device_id: u64, election_id: ElectionId) -> Self {
        Self {
            device_id,
            election_id,
            ..Default::default()
        }
    }

    /// Reply telling the requester it is primary.
    pub fn granted(device_id: u64, election_id: ElectionId) -> Self {
        Self::request(device_id, election_id)
    }

    /// Reply telling the requester that a controller with a higher election id holds
    /// the device. The requester's own election id is echoed back.
    pub fn backup(device_id: u64, election_id: ElectionId) -> Self {
        Self {
            device_id,
            election_id,
            status_code: STATUS_ALREADY_EXISTS,
            status_message: "a controller with a higher election id is primary".to_string(),
        }
    }

    pub fn role(&self) -> Role {
        if self.status_code == STATUS_OK {
            Role::Primary
        } else {
            Role::Backup
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketMetadata {
    pub metadata_id: u32,
    pub value: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketOut {
    pub payload: Vec<u8>,
    #[serde(default)]
    pub metadata: Vec<PacketMetadata>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketIn {
    pub payload: Vec<u8>,
    #[serde(default)]
    pub metadata: Vec<PacketMetadata>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamError {
    pub canonical_code: i32,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamRequest {
    Arbitration(ArbitrationUpdate),
    Packet(PacketOut),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamResponse {
    Arbitration(ArbitrationUpdate),
    Packet(PacketIn),
    Error(StreamError),
}

impl Classify for StreamRequest {
    fn kind(&self) -> MessageKind {
        match self {
            StreamRequest::Arbitration(_) => MessageKind::ArbitrationRequest,
            StreamRequest::Packet(_) => MessageKind::PacketOut,
        }
    }
}

impl Classify for StreamResponse {
    fn kind(&self) -> MessageKind {
        match self {
            StreamResponse::Arbitration(_) => MessageKind::ArbitrationReply,
            StreamResponse::Packet(_) => MessageKind::PacketIn,
            StreamResponse::Error(_) => MessageKind::Error,
        }
    }
}

impl ArbitrationProtocol for Forwarding {
    fn arbitration_request(device_id: u64, election_id: ElectionId) -> StreamRequest {
        StreamRequest::Arbitration(ArbitrationUpdate::request(device_id, election_id))
    }

    fn arbitration_reply(response: &StreamResponse) -> Option<ArbitrationReply> {
        match response {
            StreamResponse::Arbitration(update) => Some(ArbitrationReply {
                device_id: update.device_id,
                election_id: update.election_id,
                role: update.role(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ArbitrationUpdate, ElectionId, Forwarding, Role, StreamRequest, StreamResponse,
    };
    use crate::protocol::{ArbitrationProtocol, Classify, MessageKind};

    #[test]
    fn election_id_parses_high_low_and_single_forms() {
        assert_eq!("0,1".parse::<ElectionId>(), Ok(ElectionId::new(0, 1)));
        assert_eq!(" 3 , 4 ".parse::<ElectionId>(), Ok(ElectionId::new(3, 4)));
        assert_eq!("5".parse::<ElectionId>(), Ok(ElectionId::new(0, 5)));
        assert!("1,".parse::<ElectionId>().is_err());
        assert!("x".parse::<ElectionId>().is_err());

        let id = ElectionId::new(7, 9);
        assert_eq!(id.to_string().parse::<ElectionId>(), Ok(id));
    }

    #[test]
    fn election_id_orders_by_high_then_low() {
        assert!(ElectionId::new(1, 0) > ElectionId::new(0, u64::MAX));
        assert_eq!(
            ElectionId::from_u128(ElectionId::new(2, 3).as_u128()),
            ElectionId::new(2, 3)
        );
    }

    #[test]
    fn time_based_election_id_uses_high_half() {
        let id = ElectionId::time_based();
        assert!(id.high > 0);
        assert_eq!(id.low, 0);
    }

    #[test]
    fn replies_carry_role_through_status() {
        let election_id = ElectionId::new(0, 1);
        let primary = StreamResponse::Arbitration(ArbitrationUpdate::granted(1, election_id));
        let backup = StreamResponse::Arbitration(ArbitrationUpdate::backup(1, election_id));

        assert_eq!(primary.kind(), MessageKind::ArbitrationReply);
        assert_eq!(
            Forwarding::arbitration_reply(&primary).map(|reply| reply.role),
            Some(Role::Primary)
        );
        let backup_reply = Forwarding::arbitration_reply(&backup).expect("arbitration reply");
        assert_eq!(backup_reply.role, Role::Backup);
        assert_eq!(backup_reply.election_id, election_id);
    }

    #[test]
    fn stream_messages_serialize_with_tagged_variants() {
        let request = Forwarding::arbitration_request(1, ElectionId::new(0, 1));
        assert_eq!(request.kind(), MessageKind::ArbitrationRequest);

        let json = serde_json::to_value(&request).expect("serialize request");
        assert_eq!(json["arbitration"]["device_id"], 1);
        assert_eq!(json["arbitration"]["election_id"]["low"], 1);

        let decoded: StreamRequest = serde_json::from_value(json).expect("deserialize request");
        assert_eq!(decoded, request);
    }
}
