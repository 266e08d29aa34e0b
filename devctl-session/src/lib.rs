/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
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

//! # devctl-session
//!
//! `devctl-session` implements the streaming control-session core shared by switch
//! control clients: one long-lived bidirectional stream per device, a background
//! receiver, a producer-side send queue, a bounded "wait for a message kind" primitive
//! and, for the forwarding-control protocol, the arbitration handshake that must
//! succeed before forwarding state may be written.
//!
//! It also provides the path-expression parser used to address configuration and
//! telemetry subtrees (`/interfaces/interface[name=1/1/1]/state`).
//!
//! Typical usage is API-first and remains centered on [`StreamSession`].
//!
//! ## Forwarding-control session
//!
//! ```
//! use std::time::Duration;
//! use devctl_session::protocol::forwarding::{
//!     ArbitrationUpdate, ElectionId, Forwarding, StreamRequest, StreamResponse,
//! };
//! use devctl_session::transport::channel_pair;
//! use devctl_session::{Arbitration, Role, SessionConfig, SessionIdAllocator, StreamSession};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let (transport, mut device) = channel_pair::<StreamRequest, StreamResponse>();
//!
//! // A device that grants primary to whoever asks and ends the stream on half-close.
//! tokio::spawn(async move {
//!     while let Some(request) = device.recv().await {
//!         if let StreamRequest::Arbitration(update) = request {
//!             device.send(StreamResponse::Arbitration(ArbitrationUpdate::granted(
//!                 update.device_id,
//!                 update.election_id,
//!             )));
//!         }
//!     }
//!     device.finish();
//! });
//!
//! let allocator = SessionIdAllocator::new();
//! let session = StreamSession::<Forwarding>::new(&allocator, SessionConfig::default());
//! session.open(transport).await.unwrap();
//!
//! let outcome = session
//!     .arbitrate(1, ElectionId::new(0, 1), Duration::from_secs(1))
//!     .await
//!     .unwrap();
//! assert_eq!(outcome, Arbitration::Acknowledged(Role::Primary));
//!
//! session.close().await.unwrap();
//! # });
//! ```
//!
//! ## Telemetry subscription
//!
//! ```
//! use devctl_session::protocol::telemetry::{SubscribeRequest, SubscribeResponse, Telemetry};
//! use devctl_session::transport::channel_pair;
//! use devctl_session::{
//!     Path, SessionConfig, SessionIdAllocator, SubscriptionBuilder, SubscriptionMode,
//! };
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let (transport, mut device) = channel_pair::<SubscribeRequest, SubscribeResponse>();
//! tokio::spawn(async move {
//!     while device.recv().await.is_some() {
//!         device.send(SubscribeResponse::SyncResponse(true));
//!     }
//!     device.finish();
//! });
//!
//! let path: Path = "/interfaces/interface[name=1/1/1]/state".parse().unwrap();
//! let allocator = SessionIdAllocator::new();
//! let handle = SubscriptionBuilder::new(path, SubscriptionMode::OnChange)
//!     .open_and_subscribe::<Telemetry, _>(&allocator, SessionConfig::default(), transport)
//!     .await
//!     .unwrap();
//!
//! let first = handle.next().await.unwrap().unwrap();
//! assert_eq!(first.message(), &SubscribeResponse::SyncResponse(true));
//! handle.close().await.unwrap();
//! # });
//! ```
//!
//! ## Internal architecture map
//!
//! - Path: lexical path-expression parsing and canonical serialization
//! - Control plane: session state machine and session-id allocation
//! - Data plane: message queues plus the receiver and send-drain loops
//! - Protocol: message classification and the forwarding/telemetry models
//! - Transport: the transport seam plus in-memory and TCP implementations
//! - Session: the public session facade, arbitration and subscriptions
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events.
//! Library code emits events/spans and does not unconditionally initialize a global
//! subscriber. Binaries and tests are responsible for one-time
//! `tracing_subscriber` initialization at process boundaries.

pub mod config;
pub use config::SessionConfig;

mod control_plane;
pub use control_plane::id_allocator::{SessionId, SessionIdAllocator};
pub use control_plane::session_state::SessionState;

mod data_plane;
pub use data_plane::message_queue::{MessageQueue, Popped};

pub mod error;
pub use error::{ConfigError, MalformedPathError, SessionError, TransportError};

#[doc(hidden)]
pub mod observability;

pub mod path;
pub use path::{Path, PathElement};

pub mod protocol;
pub use protocol::forwarding::{ElectionId, Role};
pub use protocol::telemetry::SubscriptionMode;
pub use protocol::{Envelope, MessageKind};

mod session;
pub use session::arbitration::Arbitration;
pub use session::subscription::{SubscriptionBuilder, SubscriptionHandle};
pub use session::{ShutdownReport, StreamSession, WaitOutcome};

pub mod transport;
