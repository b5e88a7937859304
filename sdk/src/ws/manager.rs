//! Stream manager.
//!
//! Owns at most one [`Connection`] per [`Role`], replaces it when the role's
//! subscription changes and routes decoded messages to the role's observer.
//!
//! Each role has its own locks, taken in the order registry, slot, view.
//! No lock of one role is held while a lock of another role is taken.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::config::StreamConfig;
use super::connection::{
    Connection, ConnectionContext, ConnectionStatus, SharedSlot, SharedView, View,
};
use super::error::WsError;
use super::messages::StreamMessage;
use super::metrics::StreamMetrics;
use super::transport::{Transport, TungsteniteTransport};
use crate::types::{Role, SubscriptionKey};

/// Locks of one role.
#[derive(Default)]
struct RoleEntry {
    /// Running connection. Held across subscription changes.
    registry: Mutex<Option<Connection>>,
    /// Observer and active connection id.
    slot: SharedSlot,
    /// Subscribed key and status for readers.
    view: SharedView,
}

impl RoleEntry {
    /// Stops delivery and clears what readers see.
    fn detach(&self) {
        let mut slot = self.slot.lock();
        slot.active = None;
        *self.view.lock() = View::default();
    }
}

/// Keeps one live feed per role alive with bounded reconnect backoff.
///
/// `subscribe`, `unsubscribe` and `unsubscribe_all` return immediately; the
/// connection work happens on spawned tokio tasks, so they must be called
/// from within a tokio runtime.
///
/// Observers run while their role's delivery lock is held. From an observer
/// it is safe to call the read accessors ([`config`](Self::config),
/// [`metrics`](Self::metrics), [`subscription`](Self::subscription),
/// [`status`](Self::status), [`statuses`](Self::statuses)) for any role. An
/// observer must not call `subscribe`, `unsubscribe`, `unsubscribe_all`,
/// `on_message` or `shutdown`.
pub struct StreamManager {
    config: StreamConfig,
    context: ConnectionContext,
    roles: HashMap<Role, RoleEntry>,
    next_id: AtomicU64,
}

impl StreamManager {
    /// Creates a manager using the WebSocket transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: StreamConfig) -> Result<Self, WsError> {
        let transport = TungsteniteTransport::new(&config);
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a manager with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_defaults() -> Result<Self, WsError> {
        Self::new(StreamConfig::default())
    }

    /// Creates a manager over a custom transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_transport(
        config: StreamConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, WsError> {
        config.validate()?;

        let context = ConnectionContext {
            transport,
            backoff: config.backoff(),
            metrics: Arc::new(StreamMetrics::new()),
        };
        let roles = Role::ALL
            .into_iter()
            .map(|role| (role, RoleEntry::default()))
            .collect();

        Ok(Self {
            config,
            context,
            roles,
            next_id: AtomicU64::new(1),
        })
    }

    /// Returns the manager configuration.
    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Returns the shared metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<StreamMetrics> {
        Arc::clone(&self.context.metrics)
    }

    /// Subscribes `role` to `key`.
    ///
    /// A no-op if the role already streams `key`. Otherwise the role's current
    /// connection is detached from delivery and terminated before the new
    /// connection is started, so once this returns no message of the previous
    /// key reaches the observer.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid; the role is left untouched.
    pub fn subscribe(&self, role: Role, key: SubscriptionKey) -> Result<(), WsError> {
        let url = key.endpoint(&self.config.base_url)?;
        let Some(entry) = self.roles.get(&role) else {
            return Ok(());
        };

        let mut registry = entry.registry.lock();
        if registry
            .as_ref()
            .is_some_and(|current| current.key() == &key)
        {
            debug!(%role, %key, "already subscribed");
            return Ok(());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut slot = entry.slot.lock();
            slot.active = Some(id);
            *entry.view.lock() = View {
                key: Some(key.clone()),
                status: None,
            };
        }

        if let Some(previous) = registry.take() {
            previous.terminate();
            self.context.metrics.record_teardown();
            info!(%role, previous = %previous.key(), next = %key, "replacing subscription");
        } else {
            info!(%role, %key, "subscribing");
        }

        *registry = Some(Connection::spawn(
            id,
            role,
            key,
            url,
            Arc::clone(&entry.slot),
            Arc::clone(&entry.view),
            self.context.clone(),
        ));

        Ok(())
    }

    /// Terminates `role`'s connection. Returns false if there was none.
    pub fn unsubscribe(&self, role: Role) -> bool {
        let Some(entry) = self.roles.get(&role) else {
            return false;
        };

        let mut registry = entry.registry.lock();
        entry.detach();

        match registry.take() {
            Some(connection) => {
                connection.terminate();
                self.context.metrics.record_teardown();
                info!(%role, key = %connection.key(), "unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Terminates every role's connection and cancels all pending reconnects.
    pub fn unsubscribe_all(&self) {
        for role in Role::ALL {
            self.unsubscribe(role);
        }
    }

    /// Registers the observer for `role`, replacing any previous one.
    pub fn on_message<F>(&self, role: Role, handler: F)
    where
        F: FnMut(StreamMessage) + Send + 'static,
    {
        if let Some(entry) = self.roles.get(&role) {
            entry.slot.lock().handler = Some(Box::new(handler));
        }
    }

    /// Returns the key `role` is subscribed to.
    #[must_use]
    pub fn subscription(&self, role: Role) -> Option<SubscriptionKey> {
        self.roles.get(&role)?.view.lock().key.clone()
    }

    /// Returns the status of `role`'s connection.
    #[must_use]
    pub fn status(&self, role: Role) -> Option<ConnectionStatus> {
        self.roles.get(&role)?.view.lock().status.clone()
    }

    /// Returns the status of every connected role.
    #[must_use]
    pub fn statuses(&self) -> Vec<ConnectionStatus> {
        Role::ALL
            .into_iter()
            .filter_map(|role| self.status(role))
            .collect()
    }

    /// Terminates every connection and waits for their tasks to finish.
    pub async fn shutdown(&self) {
        let tasks: Vec<_> = Role::ALL
            .into_iter()
            .filter_map(|role| {
                let entry = self.roles.get(&role)?;
                let mut registry = entry.registry.lock();
                entry.detach();
                let connection = registry.take()?;
                self.context.metrics.record_teardown();
                Some((role, connection.into_task()))
            })
            .collect();

        for (role, task) in tasks {
            if let Err(e) = task.await {
                warn!(%role, error = %e, "connection task failed");
            }
        }
        info!("stream manager shut down");
    }
}

impl Drop for StreamManager {
    fn drop(&mut self) {
        for entry in self.roles.values_mut() {
            if let Some(connection) = entry.registry.get_mut() {
                connection.terminate();
            }
        }
    }
}

impl std::fmt::Debug for StreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamManager")
            .field("config", &self.config)
            .field("statuses", &self.statuses())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::Instant;

    use super::super::connection::ConnectionState;
    use super::super::transport::scripted::{PendingOpen, ScriptedTransport};
    use super::*;
    use crate::types::StreamEvent;

    const KLINE_FRAME: &str = r#"{"e":"kline","E":1700000001000,"s":"BTCUSDT","k":{"t":1700000000000,"T":1700000059999,"s":"BTCUSDT","i":"1m","o":"1.0","c":"2.0","h":"3.0","l":"0.5","v":"10","x":false}}"#;

    fn ticker_frame(price: &str) -> String {
        format!(r#"{{"e":"24hrTicker","s":"BTCUSDT","c":"{price}"}}"#)
    }

    fn manager() -> (
        StreamManager,
        mpsc::UnboundedReceiver<PendingOpen>,
        mpsc::UnboundedReceiver<StreamMessage>,
    ) {
        let (transport, opens) = ScriptedTransport::new();
        let manager = StreamManager::with_transport(
            StreamConfig::new("wss://example.com/ws"),
            Arc::new(transport),
        )
        .expect("manager");

        let (delivered_tx, delivered) = mpsc::unbounded_channel();
        for role in Role::ALL {
            let tx = delivered_tx.clone();
            manager.on_message(role, move |message| {
                let _ = tx.send(message);
            });
        }
        (manager, opens, delivered)
    }

    /// Lets spawned connection tasks run until they block.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_manager_invalid_config() {
        let result = StreamManager::new(StreamConfig::new("http://example.com"));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_manager_with_defaults() {
        let manager = StreamManager::with_defaults().expect("manager");
        assert!(manager.statuses().is_empty());
        assert!(manager.subscription(Role::Chart).is_none());
    }

    #[tokio::test]
    async fn test_subscribe_rejects_invalid_key() {
        let (manager, _opens, _delivered) = manager();
        let result = manager.subscribe(Role::Chart, SubscriptionKey::kline("BTCUSDT", "2m"));

        assert!(matches!(result, Err(WsError::InvalidSubscription(_))));
        assert!(manager.subscription(Role::Chart).is_none());
    }

    #[tokio::test]
    async fn test_subscribe_opens_endpoint_for_key() {
        let (manager, mut opens, _delivered) = manager();
        manager
            .subscribe(Role::Chart, SubscriptionKey::kline("BTCUSDT", "1m"))
            .expect("subscribe");

        let pending = opens.recv().await.expect("open");
        assert_eq!(pending.url, "wss://example.com/ws/btcusdt@kline_1m");

        let status = manager.status(Role::Chart).expect("status");
        assert_eq!(status.state, ConnectionState::Connecting);
        assert_eq!(status.attempt, 0);
        assert_eq!(status.generation, 1);

        let _frames = pending.accept();
        settle().await;
        assert_eq!(
            manager.status(Role::Chart).expect("status").state,
            ConnectionState::Open
        );
    }

    #[tokio::test]
    async fn test_subscribe_same_key_is_idempotent() {
        let (manager, mut opens, _delivered) = manager();
        let key = SubscriptionKey::ticker("BTCUSDT");

        manager.subscribe(Role::Price, key.clone()).expect("first");
        manager.subscribe(Role::Price, key.clone()).expect("second");
        settle().await;

        assert!(opens.recv().await.is_some());
        assert!(opens.try_recv().is_err());
        assert_eq!(manager.metrics().teardowns(), 0);
        assert_eq!(manager.metrics().open_attempts(), 1);
        assert_eq!(manager.subscription(Role::Price), Some(key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribe_before_open_cancels_previous() {
        let (manager, mut opens, mut delivered) = manager();
        let k1 = SubscriptionKey::ticker("BTCUSDT");
        let k2 = SubscriptionKey::ticker("ETHUSDT");

        manager.subscribe(Role::Price, k1).expect("k1");
        let first = opens.recv().await.expect("k1 open");

        manager.subscribe(Role::Price, k2.clone()).expect("k2");
        assert_eq!(manager.metrics().teardowns(), 1);

        let second = opens.recv().await.expect("k2 open");
        assert_eq!(second.url, "wss://example.com/ws/ethusdt@ticker");
        settle().await;
        assert!(first.is_abandoned());

        // Opening the abandoned session goes nowhere.
        let stale = first.accept();
        assert!(stale.send(Ok(ticker_frame("1"))).is_err());

        let frames = second.accept();
        frames.send(Ok(ticker_frame("2"))).expect("frame");

        let message = delivered.recv().await.expect("delivery");
        assert_eq!(message.key, k2);

        // No further opens for the cancelled key, however long we wait.
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(opens.try_recv().is_err());
        assert_eq!(manager.metrics().open_attempts(), 2);
    }

    #[tokio::test]
    async fn test_resubscribe_while_open_stops_old_deliveries() {
        let (manager, mut opens, mut delivered) = manager();
        let k1 = SubscriptionKey::kline("BTCUSDT", "1m");
        let k2 = SubscriptionKey::kline("BTCUSDT", "5m");

        manager.subscribe(Role::Chart, k1.clone()).expect("k1");
        let k1_frames = opens.recv().await.expect("k1 open").accept();
        k1_frames.send(Ok(KLINE_FRAME.to_string())).expect("frame");
        assert_eq!(delivered.recv().await.expect("delivery").key, k1);

        manager.subscribe(Role::Chart, k2.clone()).expect("k2");

        // Frames still in flight on the old transport are never delivered.
        let _ = k1_frames.send(Ok(KLINE_FRAME.to_string()));
        let k2_frames = opens.recv().await.expect("k2 open").accept();
        k2_frames.send(Ok(KLINE_FRAME.to_string())).expect("frame");

        let message = delivered.recv().await.expect("delivery");
        assert_eq!(message.key, k2);
        settle().await;
        assert!(delivered.try_recv().is_err());
        assert!(k1_frames.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_all_cancels_pending_reconnects() {
        let (manager, mut opens, _delivered) = manager();
        manager
            .subscribe(Role::Chart, SubscriptionKey::kline("BTCUSDT", "1m"))
            .expect("chart");
        manager
            .subscribe(Role::Price, SubscriptionKey::ticker("BTCUSDT"))
            .expect("price");

        for _ in 0..2 {
            opens
                .recv()
                .await
                .expect("open")
                .reject(WsError::Connection("refused".to_string()));
        }
        settle().await;
        assert!(manager
            .statuses()
            .iter()
            .all(|status| status.state == ConnectionState::Closed));

        manager.unsubscribe_all();
        assert!(manager.statuses().is_empty());

        tokio::time::sleep(Duration::from_secs(3_600)).await;
        assert!(opens.try_recv().is_err());
        assert_eq!(manager.metrics().open_attempts(), 2);
        assert_eq!(manager.metrics().teardowns(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_after_message_reconnects_once_after_one_second() {
        let (manager, mut opens, mut delivered) = manager();
        let key = SubscriptionKey::ticker("BTCUSDT");
        manager.subscribe(Role::Price, key.clone()).expect("subscribe");

        let frames = opens.recv().await.expect("open").accept();
        frames.send(Ok(ticker_frame("42.5"))).expect("frame");
        let message = delivered.recv().await.expect("delivery");
        assert!(matches!(message.event, StreamEvent::Ticker(_)));

        let failed_at = Instant::now();
        frames
            .send(Err(WsError::Protocol("reset".to_string())))
            .expect("error");

        let reopened = opens.recv().await.expect("reconnect");
        assert!(failed_at.elapsed() >= Duration::from_millis(1_000));
        assert!(failed_at.elapsed() < Duration::from_millis(2_000));
        let _frames = reopened.accept();
        settle().await;

        let metrics = manager.metrics();
        assert_eq!(metrics.messages_delivered(), 1);
        assert_eq!(metrics.reconnects(), 1);
        assert_eq!(metrics.opens(), 2);
        assert!(delivered.try_recv().is_err());

        let status = manager.status(Role::Price).expect("status");
        assert_eq!(status.state, ConnectionState::Open);
        assert_eq!(status.attempt, 0);
        assert_eq!(status.generation, 2);
        assert!(frames.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_opens_back_off_exponentially() {
        let (manager, mut opens, _delivered) = manager();
        manager
            .subscribe(Role::Price, SubscriptionKey::ticker("BTCUSDT"))
            .expect("subscribe");

        let mut pending = opens.recv().await.expect("open");
        let mut gaps = Vec::new();
        for _ in 0..3 {
            let rejected_at = Instant::now();
            pending.reject(WsError::Connection("refused".to_string()));
            pending = opens.recv().await.expect("retry");
            gaps.push(rejected_at.elapsed().as_millis());
        }

        assert_eq!(gaps, vec![1_000, 2_000, 4_000]);
        let status = manager.status(Role::Price).expect("status");
        assert_eq!(status.state, ConnectionState::Connecting);
        assert_eq!(status.attempt, 3);
        assert_eq!(status.generation, 4);
        assert_eq!(manager.metrics().reconnects(), 3);
    }

    #[tokio::test]
    async fn test_malformed_messages_are_dropped() {
        let (manager, mut opens, mut delivered) = manager();
        manager
            .subscribe(Role::Price, SubscriptionKey::ticker("BTCUSDT"))
            .expect("subscribe");

        let frames = opens.recv().await.expect("open").accept();
        frames.send(Ok("not json".to_string())).expect("frame");
        frames.send(Ok(r#"{"c":"NaN?"}"#.to_string())).expect("frame");
        frames.send(Ok(ticker_frame("10"))).expect("frame");

        let message = delivered.recv().await.expect("delivery");
        assert_eq!(message.event.symbol(), "BTCUSDT");
        assert_eq!(manager.metrics().messages_dropped(), 2);
        assert_eq!(
            manager.status(Role::Price).expect("status").state,
            ConnectionState::Open
        );
    }

    #[tokio::test]
    async fn test_replacing_handler_applies_to_next_message() {
        let (manager, mut opens, mut first_observer) = manager();
        manager
            .subscribe(Role::Price, SubscriptionKey::ticker("BTCUSDT"))
            .expect("subscribe");
        let frames = opens.recv().await.expect("open").accept();

        frames.send(Ok(ticker_frame("1"))).expect("frame");
        assert!(first_observer.recv().await.is_some());

        let (tx, mut second_observer) = mpsc::unbounded_channel();
        manager.on_message(Role::Price, move |message| {
            let _ = tx.send(message);
        });
        frames.send(Ok(ticker_frame("2"))).expect("frame");

        assert!(second_observer.recv().await.is_some());
        assert!(first_observer.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_roles_are_independent() {
        let (manager, mut opens, mut delivered) = manager();
        manager
            .subscribe(Role::Chart, SubscriptionKey::kline("BTCUSDT", "1m"))
            .expect("chart");
        manager
            .subscribe(Role::Price, SubscriptionKey::ticker("BTCUSDT"))
            .expect("price");

        let chart = opens.recv().await.expect("chart open");
        let price = opens.recv().await.expect("price open");
        let mut by_url = HashMap::new();
        by_url.insert(chart.url.clone(), chart);
        by_url.insert(price.url.clone(), price);

        let price_frames = by_url
            .remove("wss://example.com/ws/btcusdt@ticker")
            .expect("price pending")
            .accept();
        let _chart_frames = by_url
            .remove("wss://example.com/ws/btcusdt@kline_1m")
            .expect("chart pending")
            .accept();

        assert!(manager.unsubscribe(Role::Chart));
        assert!(!manager.unsubscribe(Role::Chart));

        price_frames.send(Ok(ticker_frame("3"))).expect("frame");
        let message = delivered.recv().await.expect("delivery");
        assert_eq!(message.key, SubscriptionKey::ticker("BTCUSDT"));
        assert_eq!(manager.statuses().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_joins_connections() {
        let (manager, mut opens, _delivered) = manager();
        manager
            .subscribe(Role::Price, SubscriptionKey::ticker("BTCUSDT"))
            .expect("subscribe");
        let frames = opens.recv().await.expect("open").accept();

        manager.shutdown().await;

        assert!(frames.is_closed());
        assert!(manager.subscription(Role::Price).is_none());
        assert_eq!(manager.metrics().teardowns(), 1);
    }

    #[tokio::test]
    async fn test_panicking_observer_does_not_block_shutdown() {
        let (manager, mut opens, _delivered) = manager();
        manager.on_message(Role::Chart, |_| panic!("observer failed"));
        manager
            .subscribe(Role::Chart, SubscriptionKey::kline("BTCUSDT", "1m"))
            .expect("subscribe");
        let frames = opens.recv().await.expect("open").accept();
        frames.send(Ok(KLINE_FRAME.to_string())).expect("frame");
        settle().await;

        manager.shutdown().await;

        assert!(manager.subscription(Role::Chart).is_none());
        assert_eq!(manager.metrics().teardowns(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_observer_reads_state_while_role_is_resubscribed() {
        let (manager, mut opens, _delivered) = manager();
        let manager = Arc::new(manager);
        let price = SubscriptionKey::ticker("BTCUSDT");

        let (entered_tx, mut entered) = mpsc::unbounded_channel();
        let (release_tx, release) = std::sync::mpsc::channel::<()>();
        let (seen_tx, mut seen) = mpsc::unbounded_channel();
        let weak = Arc::downgrade(&manager);
        manager.on_message(Role::Chart, move |_| {
            let _ = entered_tx.send(());
            let _ = release.recv();
            if let Some(manager) = weak.upgrade() {
                let _ = seen_tx.send((
                    manager.subscription(Role::Price),
                    manager.status(Role::Chart).is_some(),
                ));
            }
        });

        manager
            .subscribe(Role::Chart, SubscriptionKey::kline("BTCUSDT", "1m"))
            .expect("chart");
        let frames = opens.recv().await.expect("chart open").accept();
        manager.subscribe(Role::Price, price.clone()).expect("price");
        frames.send(Ok(KLINE_FRAME.to_string())).expect("frame");
        entered.recv().await.expect("observer entered");

        // The observer holds the chart delivery lock while this waits for it.
        let resubscribe = tokio::task::spawn_blocking({
            let manager = Arc::clone(&manager);
            move || manager.subscribe(Role::Chart, SubscriptionKey::kline("BTCUSDT", "5m"))
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        release_tx.send(()).expect("release");

        let result = tokio::time::timeout(Duration::from_secs(5), resubscribe)
            .await
            .expect("subscribe finished")
            .expect("join");
        tokio_test::assert_ok!(result);

        let (price_seen, _) = seen.recv().await.expect("observer result");
        assert_eq!(price_seen, Some(price));
        assert_eq!(
            manager.subscription(Role::Chart),
            Some(SubscriptionKey::kline("BTCUSDT", "5m"))
        );
    }
}
