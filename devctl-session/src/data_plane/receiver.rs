//! Receiver loop: transport reads into the inbound queue.

use crate::control_plane::id_allocator::SessionId;
use crate::control_plane::session_state::StateCell;
use crate::data_plane::message_queue::MessageQueue;
use crate::error::TransportError;
use crate::observability::{events, fields};
use crate::protocol::{Classify, Envelope};
use crate::transport::Transport;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, warn};

const COMPONENT: &str = "receiver";

pub(crate) async fn run_receiver_loop<Out, In>(
    session_id: SessionId,
    transport: Arc<dyn Transport<Outbound = Out, Inbound = In>>,
    inbound: Arc<MessageQueue<Envelope<In>>>,
    outbound: Arc<MessageQueue<Out>>,
    state: Arc<StateCell>,
) where
    Out: Send + 'static,
    In: Classify + Debug + Send + 'static,
{
    loop {
        match transport.read().await {
            Ok(Some(message)) => {
                let envelope = Envelope::wrap(message);
                debug!(
                    event = events::INGRESS_RECEIVE,
                    component = COMPONENT,
                    session_id,
                    kind = ?envelope.kind(),
                    msg = %fields::summarize(envelope.message()),
                    "received inbound message"
                );
                inbound.push(envelope);
            }
            Ok(None) => {
                info!(
                    event = events::INGRESS_END_OF_STREAM,
                    component = COMPONENT,
                    session_id,
                    "transport ended inbound stream"
                );
                // Expected while Closing; a failure otherwise.
                if state.fail(TransportError::Closed) {
                    outbound.close();
                }
                break;
            }
            Err(err) => {
                warn!(
                    event = events::INGRESS_READ_FAILED,
                    component = COMPONENT,
                    session_id,
                    err = %err,
                    "transport read failed"
                );
                if state.fail(err) {
                    outbound.close();
                }
                break;
            }
        }
    }

    // The failure is recorded before the sentinel so a consumer that pops it can
    // report why the stream ended. Closing outbound above wakes the send drain, which
    // discards whatever is still queued instead of writing it.
    inbound.close();
}

#[cfg(test)]
mod tests {
    use super::run_receiver_loop;
    use crate::control_plane::session_state::{SessionState, StateCell};
    use crate::data_plane::message_queue::{MessageQueue, Popped};
    use crate::error::TransportError;
    use crate::protocol::forwarding::{PacketIn, StreamRequest, StreamResponse};
    use crate::protocol::MessageKind;
    use crate::transport::{channel_pair, Transport};
    use std::sync::Arc;
    use std::time::Duration;

    fn opened_state() -> Arc<StateCell> {
        let state = Arc::new(StateCell::new(1));
        state
            .transition(&[SessionState::Idle], SessionState::Active)
            .expect("activate");
        state
    }

    #[tokio::test]
    async fn pushes_in_transport_order_then_sentinel() {
        let (transport, mut peer) = channel_pair::<StreamRequest, StreamResponse>();
        let transport: Arc<dyn Transport<Outbound = StreamRequest, Inbound = StreamResponse>> =
            Arc::new(transport);
        let inbound = Arc::new(MessageQueue::new());
        let outbound = Arc::new(MessageQueue::<StreamRequest>::new());
        let state = opened_state();

        for byte in 0..3u8 {
            peer.send(StreamResponse::Packet(PacketIn {
                payload: vec![byte],
                metadata: Vec::new(),
            }));
        }
        peer.finish();

        run_receiver_loop(1, transport, inbound.clone(), outbound.clone(), state.clone()).await;

        for byte in 0..3u8 {
            let Popped::Item(envelope) = inbound.pop(None).await else {
                panic!("expected queued message");
            };
            assert_eq!(envelope.kind(), MessageKind::PacketIn);
            assert!(matches!(
                envelope.message(),
                StreamResponse::Packet(packet) if packet.payload == vec![byte]
            ));
        }
        assert!(matches!(inbound.pop(None).await, Popped::Closed));
        assert_eq!(state.current(), SessionState::Failed);
        assert!(matches!(outbound.pop(None).await, Popped::Closed));
    }

    #[tokio::test]
    async fn end_of_stream_while_closing_is_not_a_failure() {
        let (transport, mut peer) = channel_pair::<StreamRequest, StreamResponse>();
        let transport: Arc<dyn Transport<Outbound = StreamRequest, Inbound = StreamResponse>> =
            Arc::new(transport);
        let inbound = Arc::new(MessageQueue::new());
        let outbound = Arc::new(MessageQueue::<StreamRequest>::new());
        let state = opened_state();
        state
            .transition(&[SessionState::Active], SessionState::Closing)
            .expect("closing");

        peer.finish();
        run_receiver_loop(1, transport, inbound.clone(), outbound.clone(), state.clone()).await;

        assert_eq!(state.current(), SessionState::Closing);
        assert!(state.failure().is_none());
        assert!(matches!(inbound.pop(None).await, Popped::Closed));
        assert_eq!(outbound.pop(Some(Duration::ZERO)).await, Popped::Timeout);
    }

    #[tokio::test]
    async fn read_error_is_recorded() {
        let (transport, mut peer) = channel_pair::<StreamRequest, StreamResponse>();
        let transport: Arc<dyn Transport<Outbound = StreamRequest, Inbound = StreamResponse>> =
            Arc::new(transport);
        let inbound = Arc::new(MessageQueue::new());
        let outbound = Arc::new(MessageQueue::<StreamRequest>::new());
        let state = opened_state();

        peer.fail(TransportError::Peer("connection reset".to_string()));
        run_receiver_loop(1, transport, inbound, outbound.clone(), state.clone()).await;

        assert!(matches!(
            state.failure(),
            Some(TransportError::Peer(message)) if message == "connection reset"
        ));
        assert!(matches!(outbound.pop(None).await, Popped::Closed));
    }
}
