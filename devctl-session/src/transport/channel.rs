//! In-process transport backed by tokio channels.

use crate::error::TransportError;
use crate::transport::Transport;
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

/// Session side of an in-memory stream.
pub struct ChannelTransport<Out, In> {
    tx: Mutex<Option<mpsc::UnboundedSender<Out>>>,
    rx: Mutex<mpsc::UnboundedReceiver<Result<In, TransportError>>>,
}

/// Device side of an in-memory stream.
pub struct ChannelPeer<Out, In> {
    rx: mpsc::UnboundedReceiver<Out>,
    tx: Option<mpsc::UnboundedSender<Result<In, TransportError>>>,
}

/// Creates a connected transport/peer pair. `Out` flows from the session to the peer,
/// `In` from the peer to the session.
pub fn channel_pair<Out, In>() -> (ChannelTransport<Out, In>, ChannelPeer<Out, In>) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    (
        ChannelTransport {
            tx: Mutex::new(Some(out_tx)),
            rx: Mutex::new(in_rx),
        },
        ChannelPeer {
            rx: out_rx,
            tx: Some(in_tx),
        },
    )
}

#[async_trait]
impl<Out, In> Transport for ChannelTransport<Out, In>
where
    Out: Send + 'static,
    In: Send + 'static,
{
    type Outbound = Out;
    type Inbound = In;

    async fn write(&self, message: Out) -> Result<(), TransportError> {
        let tx = self.tx.lock().await;
        match tx.as_ref() {
            Some(tx) => tx.send(message).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    async fn read(&self) -> Result<Option<In>, TransportError> {
        match self.rx.lock().await.recv().await {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }

    async fn close(&self) {
        self.tx.lock().await.take();
    }
}

impl<Out, In> ChannelPeer<Out, In> {
    /// Next message written by the session; `None` once the session closed its side.
    pub async fn recv(&mut self) -> Option<Out> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Out> {
        self.rx.try_recv().ok()
    }

    /// Delivers a message to the session. Returns `false` when the stream has ended.
    pub fn send(&self, message: In) -> bool {
        match &self.tx {
            Some(tx) => tx.send(Ok(message)).is_ok(),
            None => false,
        }
    }

    /// Makes the session's next read fail with `err`, then ends the stream.
    pub fn fail(&mut self, err: TransportError) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(err));
        }
    }

    /// Ends the stream towards the session.
    pub fn finish(&mut self) {
        self.tx.take();
    }

    /// Stops accepting session writes; later writes fail with a transport error.
    pub fn hang_up(&mut self) {
        self.rx.close();
    }
}
