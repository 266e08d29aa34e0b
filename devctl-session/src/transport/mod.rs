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

//! Transport seam.
//!
//! A [`Transport`] is one bidirectional message stream to a device. A session drives it
//! from two tasks at once: the receiver only calls [`Transport::read`], the send drain
//! only calls [`Transport::write`] and, once the outbound side is finished,
//! [`Transport::close`]. Implementations must therefore allow a read to be in flight
//! while a write happens.
//!
//! Two implementations ship with the crate: [`channel_pair`] for in-process peers and
//! [`JsonLinesTransport`] for newline-delimited JSON over TCP.

use crate::error::TransportError;
use async_trait::async_trait;

mod channel;
pub use channel::{channel_pair, ChannelPeer, ChannelTransport};

mod json_lines;
pub use json_lines::JsonLinesTransport;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Outbound: Send + 'static;
    type Inbound: Send + 'static;

    async fn write(&self, message: Self::Outbound) -> Result<(), TransportError>;

    /// Next inbound message; `Ok(None)` once the peer has ended the stream.
    async fn read(&self) -> Result<Option<Self::Inbound>, TransportError>;

    /// Ends the outbound direction. The peer is expected to end the inbound direction
    /// in response, which lets a pending `read` return `Ok(None)`.
    async fn close(&self);
}
