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

//! Control-plane layer.
//!
//! Owns the session lifecycle state machine and session identity. Every state change
//! made by callers (open, arbitrate, close) or by the I/O loops (failure) goes through
//! the session state cell, so transitions stay atomic and observable.
//!
//! ```
//! use devctl_session::protocol::telemetry::Telemetry;
//! use devctl_session::{SessionConfig, SessionIdAllocator, SessionState, StreamSession};
//!
//! let allocator = SessionIdAllocator::new();
//! let first = StreamSession::<Telemetry>::new(&allocator, SessionConfig::default());
//! let second = StreamSession::<Telemetry>::new(&allocator, SessionConfig::default());
//!
//! // Ids come from the allocator handed to the constructor, never from global state.
//! assert_ne!(first.id(), second.id());
//! assert_eq!(first.state(), SessionState::Idle);
//! ```

pub(crate) mod id_allocator;
pub(crate) mod session_state;
