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

//! Session facade.
//!
//! [`StreamSession`] owns one bidirectional stream: an outbound queue drained by a
//! dedicated send task, an inbound queue fed by a dedicated receiver task, and the
//! state cell both tasks report into. Forwarding-control arbitration lives in
//! [`arbitration`], telemetry subscriptions in [`subscription`].

pub(crate) mod arbitration;
pub(crate) mod subscription;

use crate::config::SessionConfig;
use crate::control_plane::id_allocator::{SessionId, SessionIdAllocator};
use crate::control_plane::session_state::{SessionState, StateCell};
use crate::data_plane::message_queue::{MessageQueue, Popped};
use crate::data_plane::receiver::run_receiver_loop;
use crate::data_plane::send_drain::SendDrain;
use crate::error::{SessionError, TransportError};
use crate::observability::events;
use crate::protocol::forwarding::Role;
use crate::protocol::{Envelope, MessageKind, Protocol};
use crate::transport::Transport;
use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const COMPONENT: &str = "stream_session";

/// Result of a bounded wait. A timeout leaves the session usable.
#[derive(Clone, Debug, PartialEq)]
pub enum WaitOutcome<T> {
    Received(T),
    TimedOut,
}

impl<T> WaitOutcome<T> {
    pub fn received(self) -> Option<T> {
        match self {
            WaitOutcome::Received(value) => Some(value),
            WaitOutcome::TimedOut => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, WaitOutcome::TimedOut)
    }
}

/// What [`StreamSession::close`] found when it shut the session down.
#[derive(Clone, Debug, Default)]
pub struct ShutdownReport {
    /// Messages accepted by `send` that never reached the transport.
    pub unsent: usize,
    /// Transport failure that ended the session early, if any.
    pub failure: Option<TransportError>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.unsent == 0 && self.failure.is_none()
    }
}

struct SessionTasks {
    receiver: JoinHandle<()>,
    send_drain: JoinHandle<()>,
}

/// One long-lived bidirectional stream to a device.
///
/// `send` may be called from any number of tasks; messages reach the transport in the
/// order `send` accepted them. Inbound messages are consumed through
/// [`wait_for`](Self::wait_for) or [`next_message`](Self::next_message), which share a
/// single queue.
pub struct StreamSession<P: Protocol> {
    id: SessionId,
    config: SessionConfig,
    state: Arc<StateCell>,
    outbound: Arc<MessageQueue<P::Request>>,
    inbound: Arc<MessageQueue<Envelope<P::Response>>>,
    inbound_ended: AtomicBool,
    unsent: Arc<AtomicUsize>,
    role: ArcSwapOption<Role>,
    tasks: Mutex<Option<SessionTasks>>,
}

impl<P: Protocol> StreamSession<P> {
    pub fn new(allocator: &SessionIdAllocator, config: SessionConfig) -> Self {
        let id = allocator.allocate();
        Self {
            id,
            config,
            state: Arc::new(StateCell::new(id)),
            outbound: Arc::new(MessageQueue::new()),
            inbound: Arc::new(MessageQueue::new()),
            inbound_ended: AtomicBool::new(false),
            unsent: Arc::new(AtomicUsize::new(0)),
            role: ArcSwapOption::empty(),
            tasks: Mutex::new(None),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// Role granted by the last successful arbitration.
    pub fn role(&self) -> Option<Role> {
        self.role.load_full().map(|role| *role)
    }

    /// Takes ownership of `transport` and starts the receiver and send-drain tasks.
    ///
    /// Protocols without a handshake are Active when this returns; the others stay
    /// Opening until they arbitrate. Must be called from within a tokio runtime.
    pub async fn open<T>(&self, transport: T) -> Result<(), SessionError>
    where
        T: Transport<Outbound = P::Request, Inbound = P::Response>,
    {
        let mut tasks = self.tasks.lock().await;
        self.state
            .transition(&[SessionState::Idle], SessionState::Opening)
            .map_err(|state| SessionError::InvalidState {
                operation: "open",
                state,
            })?;

        let transport: Arc<dyn Transport<Outbound = P::Request, Inbound = P::Response>> =
            Arc::new(transport);
        let receiver = tokio::spawn(run_receiver_loop(
            self.id,
            transport.clone(),
            self.inbound.clone(),
            self.outbound.clone(),
            self.state.clone(),
        ));
        let send_drain = tokio::spawn(
            SendDrain {
                session_id: self.id,
                transport,
                outbound: self.outbound.clone(),
                inbound: self.inbound.clone(),
                state: self.state.clone(),
                unsent: self.unsent.clone(),
            }
            .run(),
        );
        *tasks = Some(SessionTasks {
            receiver,
            send_drain,
        });
        drop(tasks);

        info!(
            event = events::SESSION_OPEN,
            component = COMPONENT,
            session_id = self.id,
            protocol = P::NAME,
            requires_arbitration = P::REQUIRES_ARBITRATION,
            "session opened"
        );

        if !P::REQUIRES_ARBITRATION {
            self.state
                .transition(&[SessionState::Opening], SessionState::Active)
                .map_err(|state| self.rejection("open", state))?;
        }
        Ok(())
    }

    /// Queues `message` for the send-drain task.
    pub fn send(&self, message: P::Request) -> Result<(), SessionError> {
        let state = self.state.current();
        if !state.accepts_sends() {
            return Err(self.rejection("send", state));
        }
        self.outbound.push(message);
        Ok(())
    }

    /// Pops inbound messages until one whose kind satisfies `matches` arrives, or until
    /// `timeout` has elapsed in total.
    ///
    /// Messages that do not match are discarded, not requeued: two consumers waiting
    /// on the same session for different kinds can lose each other's messages. Use one
    /// consumer per session.
    ///
    /// When the inbound stream has ended the recorded transport failure is returned,
    /// or [`SessionError::SessionClosed`] if the session was closed.
    pub async fn wait_for<F>(
        &self,
        mut matches: F,
        timeout: Duration,
    ) -> Result<WaitOutcome<Envelope<P::Response>>, SessionError>
    where
        F: FnMut(MessageKind) -> bool,
    {
        self.ensure_receivable("wait_for")?;
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.inbound.pop(Some(remaining)).await {
                Popped::Item(envelope) if matches(envelope.kind()) => {
                    return Ok(WaitOutcome::Received(envelope));
                }
                Popped::Item(envelope) => {
                    debug!(
                        event = events::WAIT_FOR_DISCARD,
                        component = COMPONENT,
                        session_id = self.id,
                        kind = ?envelope.kind(),
                        "discarding message while waiting"
                    );
                    if Instant::now() >= deadline {
                        return Ok(self.timed_out(timeout));
                    }
                }
                Popped::Timeout => return Ok(self.timed_out(timeout)),
                Popped::Closed => return Err(self.inbound_ended()),
            }
        }
    }

    /// Next inbound message of any kind. Waits forever when `timeout` is `None`.
    pub async fn next_message(
        &self,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome<Envelope<P::Response>>, SessionError> {
        self.ensure_receivable("next_message")?;
        match self.inbound.pop(timeout).await {
            Popped::Item(envelope) => Ok(WaitOutcome::Received(envelope)),
            Popped::Timeout => Ok(WaitOutcome::TimedOut),
            Popped::Closed => Err(self.inbound_ended()),
        }
    }

    /// Current state, or the transport failure that ended the session.
    pub fn check_health(&self) -> Result<SessionState, SessionError> {
        let snapshot = self.state.snapshot();
        match snapshot.failure {
            Some(err) => Err(SessionError::Transport(err)),
            None => Ok(snapshot.state),
        }
    }

    /// Ends the session: pushes the outbound sentinel, joins the send-drain task, then
    /// joins the receiver once the peer has ended the stream.
    ///
    /// With `close_linger` configured, a task that has not finished within the linger
    /// is aborted. Messages still queued are discarded and reported.
    pub async fn close(&self) -> Result<ShutdownReport, SessionError> {
        let previous = self
            .state
            .transition(
                &[
                    SessionState::Opening,
                    SessionState::Arbitrating,
                    SessionState::Active,
                    SessionState::Failed,
                ],
                SessionState::Closing,
            )
            .map_err(|state| match state {
                SessionState::Idle => SessionError::InvalidState {
                    operation: "close",
                    state,
                },
                _ => SessionError::SessionClosed,
            })?;

        info!(
            event = events::SESSION_CLOSE,
            component = COMPONENT,
            session_id = self.id,
            from = %previous,
            "closing session"
        );

        self.outbound.close();
        let tasks = self.tasks.lock().await.take();
        if let Some(SessionTasks {
            receiver,
            send_drain,
        }) = tasks
        {
            self.join_task("send_drain", send_drain).await;
            if !self.join_task("receiver", receiver).await {
                self.inbound.close();
            }
        }

        let discarded = self.outbound.drain().await;
        let unsent = self.unsent.fetch_add(discarded, Ordering::SeqCst) + discarded;
        if discarded > 0 {
            info!(
                event = events::UNSENT_DISCARDED,
                component = COMPONENT,
                session_id = self.id,
                discarded,
                "discarded queued messages on close"
            );
        }

        self.state
            .transition(&[SessionState::Closing], SessionState::Closed)
            .map_err(|state| self.rejection("close", state))?;

        let report = ShutdownReport {
            unsent,
            failure: self.state.failure(),
        };
        info!(
            event = events::SESSION_CLOSE,
            component = COMPONENT,
            session_id = self.id,
            unsent = report.unsent,
            failed = report.failure.is_some(),
            "session closed"
        );
        Ok(report)
    }

    /// Joins `handle`, bounded by the close linger. Returns `false` if the task had to
    /// be aborted.
    async fn join_task(&self, task: &'static str, mut handle: JoinHandle<()>) -> bool {
        let (joined, completed) = match self.config.close_linger() {
            None => (handle.await, true),
            Some(linger) => match tokio::time::timeout(linger, &mut handle).await {
                Ok(joined) => (joined, true),
                Err(_) => {
                    warn!(
                        event = events::SESSION_CLOSE_LINGER_EXPIRED,
                        component = COMPONENT,
                        session_id = self.id,
                        task,
                        linger_ms = linger.as_millis() as u64,
                        "task still running after close linger, aborting"
                    );
                    handle.abort();
                    (handle.await, false)
                }
            },
        };

        if let Err(err) = joined {
            if !err.is_cancelled() {
                warn!(
                    event = events::SESSION_TASK_JOIN_FAILED,
                    component = COMPONENT,
                    session_id = self.id,
                    task,
                    err = %err,
                    "session task did not finish cleanly"
                );
            }
        }
        completed
    }

    fn ensure_receivable(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.inbound_ended.load(Ordering::SeqCst) {
            return Err(self.ended_error());
        }
        match self.state.current() {
            state @ (SessionState::Idle | SessionState::Closing | SessionState::Closed) => {
                Err(self.rejection(operation, state))
            }
            _ => Ok(()),
        }
    }

    fn timed_out<T>(&self, timeout: Duration) -> WaitOutcome<T> {
        debug!(
            event = events::WAIT_FOR_TIMEOUT,
            component = COMPONENT,
            session_id = self.id,
            timeout_ms = timeout.as_millis() as u64,
            "wait timed out"
        );
        WaitOutcome::TimedOut
    }

    fn inbound_ended(&self) -> SessionError {
        self.inbound_ended.store(true, Ordering::SeqCst);
        self.ended_error()
    }

    fn ended_error(&self) -> SessionError {
        match self.state.failure() {
            Some(err) => SessionError::Transport(err),
            None => SessionError::SessionClosed,
        }
    }

    /// Error for an operation refused in `state`.
    fn rejection(&self, operation: &'static str, state: SessionState) -> SessionError {
        match state {
            SessionState::Closing | SessionState::Closed => SessionError::SessionClosed,
            SessionState::Failed => self.ended_error(),
            _ => SessionError::InvalidState { operation, state },
        }
    }
}

impl<P: Protocol> Drop for StreamSession<P> {
    fn drop(&mut self) {
        if let Some(tasks) = self.tasks.get_mut().take() {
            tasks.receiver.abort();
            tasks.send_drain.abort();
        }
    }
}
