//! Command implementations. Each one owns its session for the lifetime of the command.

use crate::{Cli, Command};
use anyhow::{anyhow, Context, Result};
use devctl_session::protocol::forwarding::{Forwarding, StreamRequest, StreamResponse};
use devctl_session::protocol::telemetry::{SubscribeRequest, SubscribeResponse, Telemetry};
use devctl_session::transport::JsonLinesTransport;
use devctl_session::{
    Arbitration, ElectionId, Path, SessionConfig, SessionIdAllocator, ShutdownReport,
    StreamSession, SubscriptionBuilder, SubscriptionMode, WaitOutcome,
};
use futures::StreamExt;
use std::time::Duration;
use tracing::{info, warn};

pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let allocator = SessionIdAllocator::new();

    match cli.command {
        Command::ParsePath { path } => parse_path(&path),
        Command::SubOnchange { path, count } => {
            subscribe(
                &cli.addr,
                &allocator,
                config,
                &path,
                SubscriptionMode::OnChange,
                count,
            )
            .await
        }
        Command::SubSample {
            path,
            interval,
            count,
        } => {
            subscribe(
                &cli.addr,
                &allocator,
                config,
                &path,
                SubscriptionMode::sample(Duration::from_millis(interval)),
                count,
            )
            .await
        }
        Command::Arbitrate {
            device_id,
            election_id,
            time_based_election_id,
            timeout_ms,
            watch_packets,
        } => {
            let election_id = if time_based_election_id {
                ElectionId::time_based()
            } else {
                election_id
            };
            let config = match timeout_ms {
                Some(timeout_ms) => {
                    config.with_arbitration_timeout(Duration::from_millis(timeout_ms))
                }
                None => config,
            };
            arbitrate(
                &cli.addr,
                &allocator,
                config,
                device_id,
                election_id,
                watch_packets,
            )
            .await
        }
    }
}

fn load_config(cli: &Cli) -> Result<SessionConfig> {
    let config = match &cli.config {
        Some(path) => SessionConfig::from_file(path)
            .with_context(|| format!("unable to load session config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    Ok(match cli.close_linger_ms {
        Some(linger_ms) => config.with_close_linger(Duration::from_millis(linger_ms)),
        None => config,
    })
}

fn parse_path(text: &str) -> Result<()> {
    let path: Path = text.parse()?;
    let elements: Vec<_> = path
        .iter()
        .map(|element| {
            serde_json::json!({
                "name": element.name(),
                "qualifiers": element.qualifiers(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&elements)?);
    Ok(())
}

async fn subscribe(
    addr: &str,
    allocator: &SessionIdAllocator,
    config: SessionConfig,
    path: &str,
    mode: SubscriptionMode,
    count: Option<usize>,
) -> Result<()> {
    let path: Path = path.parse()?;
    let transport = JsonLinesTransport::<SubscribeRequest, SubscribeResponse>::connect(addr)
        .await
        .with_context(|| format!("unable to connect to {addr}"))?;
    let handle = SubscriptionBuilder::new(path, mode)
        .open_and_subscribe::<Telemetry, _>(allocator, config, transport)
        .await
        .context("unable to start subscription")?;

    let mut updates = Box::pin(handle.updates());
    let mut received = 0;
    let outcome = loop {
        if count.is_some_and(|count| received >= count) {
            break Ok(());
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!(received, "interrupted, closing subscription");
                break Ok(());
            }
            next = updates.next() => match next {
                Some(Ok(envelope)) => {
                    println!("{}", serde_json::to_string_pretty(envelope.message())?);
                    received += 1;
                }
                Some(Err(err)) => {
                    break Err(anyhow::Error::new(err).context("subscription ended early"));
                }
                None => break Ok(()),
            },
        }
    };

    report_shutdown(handle.close().await?);
    outcome
}

async fn arbitrate(
    addr: &str,
    allocator: &SessionIdAllocator,
    config: SessionConfig,
    device_id: u64,
    election_id: ElectionId,
    watch_packets: bool,
) -> Result<()> {
    let transport = JsonLinesTransport::<StreamRequest, StreamResponse>::connect(addr)
        .await
        .with_context(|| format!("unable to connect to {addr}"))?;
    let timeout = config.arbitration_timeout();
    let wait_timeout = config.wait_timeout();
    let session = StreamSession::<Forwarding>::new(allocator, config);
    session.open(transport).await?;

    let outcome = match session.arbitrate(device_id, election_id, timeout).await {
        Ok(Arbitration::Acknowledged(role)) => {
            println!("device {device_id}: {role} (election id {election_id})");
            if watch_packets {
                watch_packet_ins(&session, wait_timeout).await
            } else {
                Ok(())
            }
        }
        Ok(Arbitration::TimedOut) => Err(anyhow!(
            "no arbitration reply from device {device_id} within {}ms",
            timeout.as_millis()
        )),
        Err(err) => Err(anyhow::Error::new(err).context("arbitration failed")),
    };

    report_shutdown(session.close().await?);
    outcome
}

async fn watch_packet_ins(session: &StreamSession<Forwarding>, poll: Duration) -> Result<()> {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            next = session.next_packet_in(poll) => match next? {
                WaitOutcome::Received(packet) => {
                    println!("{}", serde_json::to_string(&packet)?);
                }
                WaitOutcome::TimedOut => session.check_health().map(|_| ())?,
            },
        }
    }
}

fn report_shutdown(report: ShutdownReport) {
    if let Some(failure) = &report.failure {
        warn!(err = %failure, "session ended by transport failure");
    }
    if report.unsent > 0 {
        warn!(unsent = report.unsent, "messages were never sent");
    }
}

#[cfg(test)]
mod tests {
    use super::load_config;
    use crate::Cli;
    use clap::Parser;
    use std::time::Duration;

    #[test]
    fn close_linger_flag_overrides_config() {
        let cli = Cli::try_parse_from(["devctl", "--close-linger-ms", "250", "parse-path", "/"])
            .expect("parse");
        let config = load_config(&cli).expect("config");
        assert_eq!(config.close_linger(), Some(Duration::from_millis(250)));
    }
}
