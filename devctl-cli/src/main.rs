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

mod commands;

use clap::{Parser, Subcommand};
use devctl_session::ElectionId;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const BIN_NAME: &str = "devctl";

#[derive(Debug, Parser)]
#[command(name = BIN_NAME)]
#[command(about = "Streaming control-session client for switch forwarding and telemetry")]
struct Cli {
    /// Device address (host:port) speaking newline-delimited JSON.
    #[arg(long, env = "DEVCTL_ADDR", default_value = "localhost:28000", global = true)]
    addr: String,

    /// JSON5 session configuration file.
    #[arg(long, env = "DEVCTL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Overrides `close_linger_ms` from the configuration file.
    #[arg(long, global = true)]
    close_linger_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse a path expression and print its elements as JSON.
    ParsePath { path: String },

    /// Subscribe to on-change updates for a path.
    SubOnchange {
        path: String,
        /// Stop after this many messages.
        #[arg(long)]
        count: Option<usize>,
    },

    /// Subscribe to sampled updates for a path.
    SubSample {
        path: String,
        /// Sample interval in milliseconds.
        #[arg(long, default_value_t = 5000)]
        interval: u64,
        /// Stop after this many messages.
        #[arg(long)]
        count: Option<usize>,
    },

    /// Arbitrate for a device on the forwarding-control stream.
    Arbitrate {
        #[arg(long, default_value_t = 1)]
        device_id: u64,
        /// Election id as "high,low" or a single integer.
        #[arg(long, default_value = "0,1")]
        election_id: ElectionId,
        /// Use the current unix time as the election id instead.
        #[arg(long, conflicts_with = "election_id")]
        time_based_election_id: bool,
        /// Overrides `arbitration_timeout_ms` from the configuration file.
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// After arbitrating, print packet-ins until interrupted.
        #[arg(long)]
        watch_packets: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{BIN_NAME} failed: {error:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use clap::Parser;
    use devctl_session::ElectionId;

    #[test]
    fn arbitrate_defaults_match_single_controller_setup() {
        let cli = Cli::try_parse_from(["devctl", "arbitrate"]).expect("parse");
        match cli.command {
            Command::Arbitrate {
                device_id,
                election_id,
                time_based_election_id,
                ..
            } => {
                assert_eq!(device_id, 1);
                assert_eq!(election_id, ElectionId::new(0, 1));
                assert!(!time_based_election_id);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn sub_sample_defaults_to_five_second_interval() {
        let cli = Cli::try_parse_from(["devctl", "--addr", "10.0.0.1:9339", "sub-sample", "/a/b"])
            .expect("parse");
        assert_eq!(cli.addr, "10.0.0.1:9339");
        match cli.command {
            Command::SubSample {
                path,
                interval,
                count,
            } => {
                assert_eq!(path, "/a/b");
                assert_eq!(interval, 5000);
                assert_eq!(count, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn malformed_election_id_is_a_usage_error() {
        assert!(Cli::try_parse_from(["devctl", "arbitrate", "--election-id", "one,two"]).is_err());
    }
}
