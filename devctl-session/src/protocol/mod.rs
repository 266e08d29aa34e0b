/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Protocol layer.
//!
//! The session core treats messages as opaque payloads plus a [`MessageKind`]
//! discriminant. A [`Protocol`] names the request/response types of one stream and
//! whether it needs an arbitration handshake; [`ArbitrationProtocol`] and
//! [`SubscriptionProtocol`] build the few requests the core itself has to send.
//!
//! ```
//! use devctl_session::protocol::forwarding::{PacketIn, StreamResponse};
//! use devctl_session::{Envelope, MessageKind};
//!
//! let envelope = Envelope::wrap(StreamResponse::Packet(PacketIn::default()));
//! assert_eq!(envelope.kind(), MessageKind::PacketIn);
//! ```

use crate::path::Path;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub mod forwarding;
pub mod telemetry;

use forwarding::{ElectionId, Role};
use telemetry::SubscriptionMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ArbitrationRequest,
    ArbitrationReply,
    PacketOut,
    PacketIn,
    SubscribeRequest,
    SubscribeUpdate,
    SyncResponse,
    Error,
    Other,
}

pub trait Classify {
    fn kind(&self) -> MessageKind;
}

/// A message paired with its kind, as delivered to waiters and subscriptions.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope<M> {
    kind: MessageKind,
    message: M,
}

impl<M: Classify> Envelope<M> {
    pub fn wrap(message: M) -> Self {
        Self {
            kind: message.kind(),
            message,
        }
    }
}

impl<M> Envelope<M> {
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn message(&self) -> &M {
        &self.message
    }

    pub fn into_message(self) -> M {
        self.message
    }
}

pub trait Protocol: Send + Sync + 'static {
    const NAME: &'static str;
    /// Whether a session must arbitrate before it becomes Active.
    const REQUIRES_ARBITRATION: bool;

    type Request: Classify + Debug + Send + Sync + 'static;
    type Response: Classify + Debug + Send + Sync + 'static;
}

/// Arbitration outcome as carried by a reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArbitrationReply {
    pub device_id: u64,
    pub election_id: ElectionId,
    pub role: Role,
}

pub trait ArbitrationProtocol: Protocol {
    fn arbitration_request(device_id: u64, election_id: ElectionId) -> Self::Request;

    /// Extracts the arbitration outcome from a response classified as
    /// [`MessageKind::ArbitrationReply`].
    fn arbitration_reply(response: &Self::Response) -> Option<ArbitrationReply>;
}

pub trait SubscriptionProtocol: Protocol {
    fn subscription_request(
        path: &Path,
        mode: SubscriptionMode,
        updates_only: bool,
    ) -> Self::Request;
}
