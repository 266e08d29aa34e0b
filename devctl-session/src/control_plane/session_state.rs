//! Session lifecycle states and the cell that serializes transitions.

use crate::control_plane::id_allocator::SessionId;
use crate::error::TransportError;
use crate::observability::events;
use std::fmt;
use std::fmt::{Display, Formatter};
use tokio::sync::watch;
use tracing::{debug, warn};

const COMPONENT: &str = "session_state";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Opening,
    Arbitrating,
    Active,
    Closing,
    Closed,
    Failed,
}

impl SessionState {
    /// States in which `send` is accepted.
    pub fn accepts_sends(self) -> bool {
        matches!(
            self,
            SessionState::Opening | SessionState::Arbitrating | SessionState::Active
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Opening => "opening",
            SessionState::Arbitrating => "arbitrating",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        }
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub(crate) struct StateSnapshot {
    pub(crate) state: SessionState,
    pub(crate) failure: Option<TransportError>,
}

/// Shared state of one session. Written by the owning caller and by its I/O loops.
pub(crate) struct StateCell {
    session_id: SessionId,
    tx: watch::Sender<StateSnapshot>,
}

impl StateCell {
    pub(crate) fn new(session_id: SessionId) -> Self {
        let (tx, _rx) = watch::channel(StateSnapshot {
            state: SessionState::Idle,
            failure: None,
        });
        Self { session_id, tx }
    }

    pub(crate) fn current(&self) -> SessionState {
        self.tx.borrow().state
    }

    pub(crate) fn snapshot(&self) -> StateSnapshot {
        self.tx.borrow().clone()
    }

    pub(crate) fn failure(&self) -> Option<TransportError> {
        self.tx.borrow().failure.clone()
    }

    /// Moves to `to` if the current state is one of `from`.
    ///
    /// Returns the state that was replaced, or the current state when the move is not
    /// allowed.
    pub(crate) fn transition(
        &self,
        from: &[SessionState],
        to: SessionState,
    ) -> Result<SessionState, SessionState> {
        let mut outcome = Err(SessionState::Idle);
        self.tx.send_if_modified(|snapshot| {
            if from.contains(&snapshot.state) {
                outcome = Ok(snapshot.state);
                let changed = snapshot.state != to;
                snapshot.state = to;
                changed
            } else {
                outcome = Err(snapshot.state);
                false
            }
        });

        match outcome {
            Ok(previous) => debug!(
                event = events::SESSION_STATE_TRANSITION,
                component = COMPONENT,
                session_id = self.session_id,
                from = %previous,
                to = %to,
                "session state transition"
            ),
            Err(current) => debug!(
                event = events::SESSION_STATE_TRANSITION,
                component = COMPONENT,
                session_id = self.session_id,
                current = %current,
                requested = %to,
                "session state transition refused"
            ),
        }
        outcome
    }

    /// Records a transport failure and moves to Failed, unless the session is already
    /// shutting down or terminal. The first recorded failure wins.
    pub(crate) fn fail(&self, err: TransportError) -> bool {
        let mut failed = false;
        self.tx.send_if_modified(|snapshot| match snapshot.state {
            SessionState::Closing | SessionState::Closed | SessionState::Failed => false,
            _ => {
                snapshot.state = SessionState::Failed;
                snapshot.failure = Some(err.clone());
                failed = true;
                true
            }
        });

        if failed {
            warn!(
                event = events::SESSION_FAILED,
                component = COMPONENT,
                session_id = self.session_id,
                err = %err,
                "session failed"
            );
        }
        failed
    }
}
