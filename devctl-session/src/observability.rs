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

//! Stable event names and field formatters for structured `tracing` output.
//!
//! Every event emitted by the crate carries `event = events::...` so log scrapers can
//! match on a fixed vocabulary instead of free-form messages.

pub mod events {
    pub const SESSION_OPEN: &str = "session_open";
    pub const SESSION_STATE_TRANSITION: &str = "session_state_transition";
    pub const SESSION_FAILED: &str = "session_failed";
    pub const SESSION_CLOSE: &str = "session_close";
    pub const SESSION_CLOSE_LINGER_EXPIRED: &str = "session_close_linger_expired";
    pub const SESSION_TASK_JOIN_FAILED: &str = "session_task_join_failed";

    pub const EGRESS_SEND_ATTEMPT: &str = "egress_send_attempt";
    pub const EGRESS_SEND_OK: &str = "egress_send_ok";
    pub const EGRESS_SEND_FAILED: &str = "egress_send_failed";
    pub const EGRESS_SENTINEL: &str = "egress_sentinel";
    pub const UNSENT_DISCARDED: &str = "unsent_discarded";

    pub const INGRESS_RECEIVE: &str = "ingress_receive";
    pub const INGRESS_END_OF_STREAM: &str = "ingress_end_of_stream";
    pub const INGRESS_READ_FAILED: &str = "ingress_read_failed";

    pub const WAIT_FOR_DISCARD: &str = "wait_for_discard";
    pub const WAIT_FOR_TIMEOUT: &str = "wait_for_timeout";

    pub const ARBITRATION_REQUEST: &str = "arbitration_request";
    pub const ARBITRATION_REPLY: &str = "arbitration_reply";
    pub const ARBITRATION_TIMEOUT: &str = "arbitration_timeout";
    pub const ARBITRATION_REJECTED: &str = "arbitration_rejected";

    pub const SUBSCRIPTION_REQUEST: &str = "subscription_request";
    pub const SUBSCRIPTION_CLOSE: &str = "subscription_close";

    pub const TRANSPORT_CONNECT: &str = "transport_connect";
    pub const TRANSPORT_SHUTDOWN_FAILED: &str = "transport_shutdown_failed";
}

pub mod fields {
    use std::fmt::Debug;

    const SUMMARY_LIMIT: usize = 256;

    /// Debug-formats a message, truncated so payload-heavy frames stay readable in logs.
    pub fn summarize<M: Debug>(message: &M) -> String {
        let mut rendered = format!("{message:?}");
        if rendered.len() > SUMMARY_LIMIT {
            let mut cut = SUMMARY_LIMIT;
            while !rendered.is_char_boundary(cut) {
                cut -= 1;
            }
            rendered.truncate(cut);
            rendered.push_str("...");
        }
        rendered
    }

}
