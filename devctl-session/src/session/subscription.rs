//! Telemetry subscriptions driven over a [`StreamSession`].

use crate::config::SessionConfig;
use crate::control_plane::id_allocator::SessionIdAllocator;
use crate::error::SessionError;
use crate::observability::events;
use crate::path::Path;
use crate::protocol::telemetry::SubscriptionMode;
use crate::protocol::{Envelope, Protocol, SubscriptionProtocol};
use crate::session::{ShutdownReport, StreamSession, WaitOutcome};
use crate::transport::Transport;
use futures::stream::{self, Stream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const COMPONENT: &str = "subscription";

/// Builds one subscription-list request for a path.
///
/// `updates_only` defaults to `true`: the device skips the initial snapshot and only
/// streams changes.
#[derive(Clone, Debug)]
pub struct SubscriptionBuilder {
    path: Path,
    mode: SubscriptionMode,
    updates_only: bool,
}

impl SubscriptionBuilder {
    pub fn new(path: Path, mode: SubscriptionMode) -> Self {
        Self {
            path,
            mode,
            updates_only: true,
        }
    }

    pub fn updates_only(mut self, updates_only: bool) -> Self {
        self.updates_only = updates_only;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> SubscriptionMode {
        self.mode
    }

    fn validate(&self) -> Result<(), SessionError> {
        match self.mode {
            SubscriptionMode::Sample { interval } if interval.is_zero() => {
                Err(SessionError::InvalidSubscription(format!(
                    "sample interval for {} must be greater than zero",
                    self.path
                )))
            }
            _ => Ok(()),
        }
    }

    /// Sends the subscription request on an already open session.
    pub fn subscribe<P: SubscriptionProtocol>(
        self,
        session: Arc<StreamSession<P>>,
    ) -> Result<SubscriptionHandle<P>, SessionError> {
        self.validate()?;

        info!(
            event = events::SUBSCRIPTION_REQUEST,
            component = COMPONENT,
            session_id = session.id(),
            path = %self.path,
            mode = ?self.mode,
            updates_only = self.updates_only,
            "sending subscription request"
        );
        session.send(P::subscription_request(
            &self.path,
            self.mode,
            self.updates_only,
        ))?;

        Ok(SubscriptionHandle {
            session,
            path: self.path,
            finished: AtomicBool::new(false),
        })
    }

    /// Opens a new session on `transport` and subscribes on it.
    pub async fn open_and_subscribe<P, T>(
        self,
        allocator: &SessionIdAllocator,
        config: SessionConfig,
        transport: T,
    ) -> Result<SubscriptionHandle<P>, SessionError>
    where
        P: SubscriptionProtocol,
        T: Transport<Outbound = P::Request, Inbound = P::Response>,
    {
        self.validate()?;
        let session = Arc::new(StreamSession::<P>::new(allocator, config));
        session.open(transport).await?;
        self.subscribe(session)
    }
}

/// Consumer side of a subscription. Every inbound message of the session is yielded,
/// whatever its kind.
pub struct SubscriptionHandle<P: Protocol> {
    session: Arc<StreamSession<P>>,
    path: Path,
    finished: AtomicBool,
}

impl<P: Protocol> SubscriptionHandle<P> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session(&self) -> &Arc<StreamSession<P>> {
        &self.session
    }

    /// Next message. `None` once the handle is closed; a failed session yields its
    /// error once and then `None`.
    pub async fn next(&self) -> Option<Result<Envelope<P::Response>, SessionError>> {
        match self.pull(None).await? {
            Ok(WaitOutcome::Received(envelope)) => Some(Ok(envelope)),
            Ok(WaitOutcome::TimedOut) => None,
            Err(err) => Some(Err(err)),
        }
    }

    /// Like [`next`](Self::next), but gives up after `timeout`.
    pub async fn next_timeout(
        &self,
        timeout: Duration,
    ) -> Option<Result<WaitOutcome<Envelope<P::Response>>, SessionError>> {
        self.pull(Some(timeout)).await
    }

    async fn pull(
        &self,
        timeout: Option<Duration>,
    ) -> Option<Result<WaitOutcome<Envelope<P::Response>>, SessionError>> {
        if self.finished.load(Ordering::SeqCst) {
            return None;
        }
        match self.session.next_message(timeout).await {
            Ok(outcome) => Some(Ok(outcome)),
            Err(SessionError::SessionClosed) => {
                self.finished.store(true, Ordering::SeqCst);
                None
            }
            Err(err) => {
                self.finished.store(true, Ordering::SeqCst);
                Some(Err(err))
            }
        }
    }

    /// Lazy, unbounded stream over the session's inbound messages. Each call starts a
    /// new stream from wherever the queue currently is.
    pub fn updates(
        &self,
    ) -> impl Stream<Item = Result<Envelope<P::Response>, SessionError>> + Send + 'static {
        stream::unfold(Some(self.session.clone()), |session| async move {
            let session = session?;
            match session.next_message(None).await {
                Ok(WaitOutcome::Received(envelope)) => Some((Ok(envelope), Some(session))),
                Ok(WaitOutcome::TimedOut) | Err(SessionError::SessionClosed) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    /// Closes the underlying session.
    pub async fn close(&self) -> Result<ShutdownReport, SessionError> {
        info!(
            event = events::SUBSCRIPTION_CLOSE,
            component = COMPONENT,
            session_id = self.session.id(),
            path = %self.path,
            "closing subscription"
        );
        self.finished.store(true, Ordering::SeqCst);
        self.session.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriptionBuilder;
    use crate::config::SessionConfig;
    use crate::control_plane::id_allocator::SessionIdAllocator;
    use crate::error::{SessionError, TransportError};
    use crate::path::Path;
    use crate::protocol::telemetry::{
        Notification, StreamMode, SubscribeRequest, SubscribeResponse, SubscriptionMode,
        Telemetry, Update,
    };
    use crate::protocol::MessageKind;
    use crate::session::StreamSession;
    use crate::transport::channel_pair;
    use futures::StreamExt;
    use std::sync::Arc;
    use std::time::Duration;

    fn path() -> Path {
        "/interfaces/interface[name=1/1/1]/state"
            .parse()
            .expect("valid path")
    }

    fn counter_update(value: u64) -> SubscribeResponse {
        SubscribeResponse::Update(Notification {
            timestamp: value as i64,
            prefix: None,
            updates: vec![Update {
                path: "/state/counters/in-octets".parse().expect("valid path"),
                value: serde_json::json!(value),
            }],
            deletes: Vec::new(),
        })
    }

    #[tokio::test]
    async fn subscribe_sends_exactly_one_request() {
        let (transport, mut device) = channel_pair::<SubscribeRequest, SubscribeResponse>();
        let allocator = SessionIdAllocator::new();
        let _handle = SubscriptionBuilder::new(
            path(),
            SubscriptionMode::sample(Duration::from_millis(5000)),
        )
        .open_and_subscribe::<Telemetry, _>(&allocator, SessionConfig::default(), transport)
        .await
        .expect("subscribe");

        let Some(SubscribeRequest::Subscribe(list)) = device.recv().await else {
            panic!("expected subscription list");
        };
        assert!(list.updates_only);
        assert_eq!(list.subscriptions.len(), 1);
        assert_eq!(list.subscriptions[0].path, path());
        assert_eq!(list.subscriptions[0].mode, StreamMode::Sample);
        assert_eq!(list.subscriptions[0].sample_interval_ms, Some(5000));

        tokio::task::yield_now().await;
        assert!(device.try_recv().is_none());
    }

    #[tokio::test]
    async fn zero_sample_interval_is_rejected() {
        let allocator = SessionIdAllocator::new();
        let session = Arc::new(StreamSession::<Telemetry>::new(
            &allocator,
            SessionConfig::default(),
        ));
        assert!(matches!(
            SubscriptionBuilder::new(path(), SubscriptionMode::sample(Duration::ZERO))
                .subscribe(session),
            Err(SessionError::InvalidSubscription(_))
        ));
    }

    #[tokio::test]
    async fn every_message_is_yielded_until_close() {
        let (transport, mut device) = channel_pair::<SubscribeRequest, SubscribeResponse>();
        let allocator = SessionIdAllocator::new();
        let handle = SubscriptionBuilder::new(path(), SubscriptionMode::OnChange)
            .updates_only(false)
            .open_and_subscribe::<Telemetry, _>(&allocator, SessionConfig::default(), transport)
            .await
            .expect("subscribe");

        let device_task = tokio::spawn(async move {
            let Some(SubscribeRequest::Subscribe(list)) = device.recv().await else {
                panic!("expected subscription list");
            };
            assert!(!list.updates_only);
            device.send(counter_update(1));
            device.send(SubscribeResponse::SyncResponse(true));
            device.send(counter_update(2));
            while device.recv().await.is_some() {}
            device.finish();
        });

        let mut kinds = Vec::new();
        for _ in 0..3 {
            let envelope = handle.next().await.expect("message").expect("healthy");
            kinds.push(envelope.kind());
        }
        assert_eq!(
            kinds,
            vec![
                MessageKind::SubscribeUpdate,
                MessageKind::SyncResponse,
                MessageKind::SubscribeUpdate
            ]
        );

        let report = handle.close().await.expect("close");
        assert!(report.is_clean());
        assert!(handle.next().await.is_none());
        device_task.await.expect("device task");
    }

    #[tokio::test]
    async fn stream_ends_with_error_when_session_fails() {
        let (transport, mut device) = channel_pair::<SubscribeRequest, SubscribeResponse>();
        let allocator = SessionIdAllocator::new();
        let handle = SubscriptionBuilder::new(path(), SubscriptionMode::OnChange)
            .open_and_subscribe::<Telemetry, _>(&allocator, SessionConfig::default(), transport)
            .await
            .expect("subscribe");

        device.send(counter_update(1));
        device.fail(TransportError::Peer("stream reset".to_string()));

        let items: Vec<_> = handle.updates().collect().await;
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Ok(envelope) if envelope.message() == &counter_update(1)));
        assert!(matches!(
            &items[1],
            Err(SessionError::Transport(TransportError::Peer(_)))
        ));

        assert!(matches!(handle.next().await, Some(Err(SessionError::Transport(_)))));
        assert!(handle.next().await.is_none());
    }

    #[tokio::test]
    async fn next_timeout_returns_timed_out_without_ending() {
        let (transport, device) = channel_pair::<SubscribeRequest, SubscribeResponse>();
        let allocator = SessionIdAllocator::new();
        let handle = SubscriptionBuilder::new(path(), SubscriptionMode::OnChange)
            .open_and_subscribe::<Telemetry, _>(&allocator, SessionConfig::default(), transport)
            .await
            .expect("subscribe");

        let outcome = handle
            .next_timeout(Duration::from_millis(20))
            .await
            .expect("not finished")
            .expect("healthy");
        assert!(outcome.is_timed_out());

        device.send(SubscribeResponse::SyncResponse(true));
        let outcome = handle
            .next_timeout(Duration::from_secs(1))
            .await
            .expect("not finished")
            .expect("healthy");
        assert!(!outcome.is_timed_out());
    }
}
