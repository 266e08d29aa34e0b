//! Arbitration handshake for protocols that elect a primary controller.

use crate::control_plane::session_state::SessionState;
use crate::error::SessionError;
use crate::observability::events;
use crate::protocol::forwarding::{
    ElectionId, Forwarding, PacketIn, PacketOut, Role, StreamRequest, StreamResponse,
};
use crate::protocol::{ArbitrationProtocol, Envelope, MessageKind};
use crate::session::{StreamSession, WaitOutcome};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const COMPONENT: &str = "arbitration";

/// Outcome of one arbitration attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arbitration {
    Acknowledged(Role),
    /// No reply within the timeout. The session stays Arbitrating and may retry.
    TimedOut,
}

impl<P: ArbitrationProtocol> StreamSession<P> {
    /// Sends one arbitration request and waits up to `timeout` for the reply.
    ///
    /// Valid while Opening, after a timed-out attempt, and on an Active session that
    /// re-arbitrates with a new election id. No retry happens inside this call.
    pub async fn arbitrate(
        &self,
        device_id: u64,
        election_id: ElectionId,
        timeout: Duration,
    ) -> Result<Arbitration, SessionError> {
        self.state
            .transition(
                &[
                    SessionState::Opening,
                    SessionState::Arbitrating,
                    SessionState::Active,
                ],
                SessionState::Arbitrating,
            )
            .map_err(|state| self.rejection("arbitrate", state))?;
        self.role.store(None);

        info!(
            event = events::ARBITRATION_REQUEST,
            component = COMPONENT,
            session_id = self.id,
            device_id,
            election_id = %election_id,
            "requesting arbitration"
        );
        self.send(P::arbitration_request(device_id, election_id))?;

        let envelope = match self
            .wait_for(|kind| kind == MessageKind::ArbitrationReply, timeout)
            .await?
        {
            WaitOutcome::Received(envelope) => envelope,
            WaitOutcome::TimedOut => {
                warn!(
                    event = events::ARBITRATION_TIMEOUT,
                    component = COMPONENT,
                    session_id = self.id,
                    device_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "no arbitration reply"
                );
                return Ok(Arbitration::TimedOut);
            }
        };

        let Some(reply) = P::arbitration_reply(envelope.message()) else {
            return Err(self.reject_reply(format!(
                "{} reply carries no arbitration outcome",
                P::NAME
            )));
        };
        if reply.device_id != device_id {
            return Err(self.reject_reply(format!(
                "reply for device {} while arbitrating for device {}",
                reply.device_id, device_id
            )));
        }
        if reply.election_id != election_id {
            return Err(self.reject_reply(format!(
                "{} reply carries election id {} instead of {}",
                reply.role, reply.election_id, election_id
            )));
        }

        self.role.store(Some(Arc::new(reply.role)));
        self.state
            .transition(&[SessionState::Arbitrating], SessionState::Active)
            .map_err(|state| self.rejection("arbitrate", state))?;

        info!(
            event = events::ARBITRATION_REPLY,
            component = COMPONENT,
            session_id = self.id,
            device_id,
            election_id = %reply.election_id,
            role = %reply.role,
            "arbitration acknowledged"
        );
        Ok(Arbitration::Acknowledged(reply.role))
    }

    /// Queues a forwarding-state write. Requires a successfully arbitrated session.
    pub fn send_forwarding(&self, message: P::Request) -> Result<(), SessionError> {
        match self.state.current() {
            SessionState::Active => self.send(message),
            state @ (SessionState::Opening | SessionState::Arbitrating) => {
                Err(SessionError::NotArbitrated(state))
            }
            state => Err(self.rejection("send_forwarding", state)),
        }
    }

    fn reject_reply(&self, reason: String) -> SessionError {
        warn!(
            event = events::ARBITRATION_REJECTED,
            component = COMPONENT,
            session_id = self.id,
            reason = %reason,
            "arbitration reply rejected"
        );
        SessionError::ArbitrationRejected(reason)
    }
}

impl StreamSession<Forwarding> {
    pub fn packet_out(&self, packet: PacketOut) -> Result<(), SessionError> {
        self.send_forwarding(StreamRequest::Packet(packet))
    }

    /// Waits for the next packet-in, discarding other inbound messages.
    pub async fn next_packet_in(
        &self,
        timeout: Duration,
    ) -> Result<WaitOutcome<PacketIn>, SessionError> {
        let outcome = self
            .wait_for(|kind| kind == MessageKind::PacketIn, timeout)
            .await?;
        Ok(match outcome {
            WaitOutcome::Received(envelope) => WaitOutcome::Received(packet_in(envelope)?),
            WaitOutcome::TimedOut => WaitOutcome::TimedOut,
        })
    }
}

fn packet_in(envelope: Envelope<StreamResponse>) -> Result<PacketIn, SessionError> {
    let kind = envelope.kind();
    match envelope.into_message() {
        StreamResponse::Packet(packet) => Ok(packet),
        _ => Err(SessionError::UnexpectedMessage(kind)),
    }
}
