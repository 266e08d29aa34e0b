//! Send-drain loop: the only writer to a session's transport.

use crate::control_plane::id_allocator::SessionId;
use crate::control_plane::session_state::{SessionState, StateCell};
use crate::data_plane::message_queue::{MessageQueue, Popped};
use crate::observability::{events, fields};
use crate::protocol::{Classify, Envelope};
use crate::transport::Transport;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

const COMPONENT: &str = "send_drain";

pub(crate) struct SendDrain<Out, In> {
    pub(crate) session_id: SessionId,
    pub(crate) transport: Arc<dyn Transport<Outbound = Out, Inbound = In>>,
    pub(crate) outbound: Arc<MessageQueue<Out>>,
    /// Closed on a write failure so inbound consumers stop waiting.
    pub(crate) inbound: Arc<MessageQueue<Envelope<In>>>,
    pub(crate) state: Arc<StateCell>,
    pub(crate) unsent: Arc<AtomicUsize>,
}

impl<Out, In> SendDrain<Out, In>
where
    Out: Classify + Debug + Send + 'static,
    In: Send + 'static,
{
    pub(crate) async fn run(self) {
        loop {
            let message = match self.outbound.pop(None).await {
                Popped::Item(message) => message,
                Popped::Closed => {
                    debug!(
                        event = events::EGRESS_SENTINEL,
                        component = COMPONENT,
                        session_id = self.session_id,
                        "outbound sentinel popped"
                    );
                    break;
                }
                Popped::Timeout => continue,
            };

            // A failed session writes nothing more; the popped message counts as unsent.
            if self.state.current() == SessionState::Failed {
                self.discard_unsent(1).await;
                break;
            }

            let kind = message.kind();
            debug!(
                event = events::EGRESS_SEND_ATTEMPT,
                component = COMPONENT,
                session_id = self.session_id,
                kind = ?kind,
                msg = %fields::summarize(&message),
                "attempting send"
            );

            match self.transport.write(message).await {
                Ok(()) => debug!(
                    event = events::EGRESS_SEND_OK,
                    component = COMPONENT,
                    session_id = self.session_id,
                    kind = ?kind,
                    "send succeeded"
                ),
                Err(err) => {
                    warn!(
                        event = events::EGRESS_SEND_FAILED,
                        component = COMPONENT,
                        session_id = self.session_id,
                        kind = ?kind,
                        err = %err,
                        "send failed"
                    );
                    self.state.fail(err);
                    self.inbound.close();
                    self.discard_unsent(0).await;
                    break;
                }
            }
        }

        self.transport.close().await;
    }

    /// Drops everything still queued. `popped` counts messages already taken off the
    /// queue that will not be written either.
    async fn discard_unsent(&self, popped: usize) {
        let discarded = popped + self.outbound.drain().await;
        if discarded > 0 {
            self.unsent.fetch_add(discarded, Ordering::SeqCst);
            info!(
                event = events::UNSENT_DISCARDED,
                component = COMPONENT,
                session_id = self.session_id,
                discarded,
                "discarded queued messages after session failure"
            );
        }
    }
}
