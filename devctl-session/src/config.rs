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

//! Session configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Timeouts and shutdown policy of a [`StreamSession`](crate::StreamSession).
///
/// # JSON5 Format
///
/// Every field is optional:
///
/// - `close_linger_ms`: how long `close` waits for each session task before aborting
///   it. Absent means wait until the peer ends the stream.
/// - `arbitration_timeout_ms`: default arbitration wait. The default is `5000`.
/// - `wait_timeout_ms`: default wait for an expected message. The default is `5000`.
///
/// ```
/// use std::time::Duration;
/// use devctl_session::SessionConfig;
///
/// let config = SessionConfig::from_json5_str(
///     "{
///         // give the device a second to end the stream
///         close_linger_ms: 1000,
///     }",
/// )
/// .unwrap();
/// assert_eq!(config.close_linger(), Some(Duration::from_secs(1)));
/// assert_eq!(config.wait_timeout(), Duration::from_secs(5));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    close_linger_ms: Option<u64>,
    #[serde(default = "SessionConfig::default_arbitration_timeout_ms")]
    arbitration_timeout_ms: u64,
    #[serde(default = "SessionConfig::default_wait_timeout_ms")]
    wait_timeout_ms: u64,
}

impl SessionConfig {
    fn default_arbitration_timeout_ms() -> u64 {
        5000
    }

    fn default_wait_timeout_ms() -> u64 {
        5000
    }

    pub fn from_json5_str(text: &str) -> Result<Self, ConfigError> {
        Ok(json5::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json5_str(&text)
    }

    pub fn close_linger(&self) -> Option<Duration> {
        self.close_linger_ms.map(Duration::from_millis)
    }

    pub fn arbitration_timeout(&self) -> Duration {
        Duration::from_millis(self.arbitration_timeout_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn with_close_linger(mut self, linger: Duration) -> Self {
        self.close_linger_ms = Some(u64::try_from(linger.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_arbitration_timeout(mut self, timeout: Duration) -> Self {
        self.arbitration_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            close_linger_ms: None,
            arbitration_timeout_ms: Self::default_arbitration_timeout_ms(),
            wait_timeout_ms: Self::default_wait_timeout_ms(),
        }
    }
}
