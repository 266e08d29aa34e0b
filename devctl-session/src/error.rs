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

//! Error taxonomy for path parsing, transports and sessions.
//!
//! Timeouts are not errors: they are reported through [`crate::WaitOutcome`] and
//! [`crate::Arbitration`].

use crate::control_plane::session_state::SessionState;
use crate::protocol::MessageKind;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// A path expression that could not be tokenized.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("malformed path {text:?} at offset {offset}: {reason}")]
pub struct MalformedPathError {
    pub text: String,
    pub offset: usize,
    pub reason: &'static str,
}

impl MalformedPathError {
    pub(crate) fn new(text: &str, offset: usize, reason: &'static str) -> Self {
        Self {
            text: text.to_string(),
            offset,
            reason,
        }
    }
}

/// Failure of the underlying stream. Fatal to the session that observed it.
#[derive(Clone, Debug, Error)]
pub enum TransportError {
    #[error("transport I/O failed: {0}")]
    Io(Arc<io::Error>),
    #[error("unable to encode or decode frame: {0}")]
    Codec(String),
    #[error("stream ended by peer")]
    Closed,
    #[error("peer reported error: {0}")]
    Peer(String),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Codec(err.to_string())
    }
}

#[derive(Clone, Debug, Error)]
pub enum SessionError {
    #[error("session is closed")]
    SessionClosed,
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
    #[error("forwarding writes require an arbitrated session (session is {0})")]
    NotArbitrated(SessionState),
    #[error("arbitration reply rejected: {0}")]
    ArbitrationRejected(String),
    #[error("{0:?} message does not carry the expected payload")]
    UnexpectedMessage(MessageKind),
    #[error("invalid subscription: {0}")]
    InvalidSubscription(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to parse config: {0}")]
    Parse(#[from] json5::Error),
}
