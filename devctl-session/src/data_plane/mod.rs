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

//! Data-plane layer.
//!
//! Owns the two mailboxes of a session and the two loops that move messages between
//! them and the transport: the receiver (transport -> inbound queue) and the send drain
//! (outbound queue -> transport). Each loop runs in its own task so a stalled peer on
//! one direction cannot starve the other.
//!
//! ```
//! use std::time::Duration;
//! use devctl_session::{MessageQueue, Popped};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let queue = MessageQueue::new();
//! queue.push("first");
//! queue.close();
//!
//! assert_eq!(queue.pop(None).await, Popped::Item("first"));
//! assert_eq!(queue.pop(Some(Duration::from_millis(10))).await, Popped::Closed);
//! # });
//! ```

pub(crate) mod message_queue;
pub(crate) mod receiver;
pub(crate) mod send_drain;
