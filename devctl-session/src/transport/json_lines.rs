//! Newline-delimited JSON frames over TCP.

use crate::error::TransportError;
use crate::observability::{events, fields};
use crate::transport::Transport;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

const COMPONENT: &str = "json_lines_transport";

/// One JSON document per line in each direction. Blank lines are ignored.
pub struct JsonLinesTransport<Out, In> {
    peer: SocketAddr,
    reader: Mutex<Lines<BufReader<OwnedReadHalf>>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    _messages: PhantomData<fn(Out) -> In>,
}

impl<Out, In> JsonLinesTransport<Out, In> {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_stream(stream)
    }

    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        info!(
            event = events::TRANSPORT_CONNECT,
            component = COMPONENT,
            peer = %peer,
            "stream connected"
        );

        Ok(Self {
            peer,
            reader: Mutex::new(BufReader::new(read_half).lines()),
            writer: Mutex::new(Some(write_half)),
            _messages: PhantomData,
        })
    }
}

#[async_trait]
impl<Out, In> Transport for JsonLinesTransport<Out, In>
where
    Out: Serialize + Send + 'static,
    In: DeserializeOwned + Send + 'static,
{
    type Outbound = Out;
    type Inbound = In;

    async fn write(&self, message: Out) -> Result<(), TransportError> {
        let mut frame = serde_json::to_vec(&message)?;
        frame.push(b'\n');

        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(TransportError::Closed);
        };
        writer.write_all(&frame).await?;
        writer.flush().await?;
        trace!(component = COMPONENT, peer = %self.peer, bytes = frame.len(), "frame written");
        Ok(())
    }

    async fn read(&self) -> Result<Option<In>, TransportError> {
        let mut reader = self.reader.lock().await;
        loop {
            let Some(line) = reader.next_line().await? else {
                debug!(component = COMPONENT, peer = %self.peer, "peer ended stream");
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(&line).map(Some).map_err(|err| {
                TransportError::Codec(format!(
                    "{err} in frame {}",
                    fields::summarize(&line)
                ))
            });
        }
    }

    async fn close(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(err) = writer.shutdown().await {
                warn!(
                    event = events::TRANSPORT_SHUTDOWN_FAILED,
                    component = COMPONENT,
                    peer = %self.peer,
                    err = %err,
                    "unable to shut down write half"
                );
            }
        }
    }
}
