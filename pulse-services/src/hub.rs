//! Subscription Hub
//!
//! The single read/write surface of the data layer. Holds the current
//! configuration and snapshot, fans updates out to listeners, and is the
//! only path through which the transport is restarted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use pulse_core::{
    ApiProvider, AssetType, Catalog, ConnectionMethod, ConnectionStatus, Configuration,
    PulseError, PulseResult, Snapshot,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregator::merge_batch;
use crate::feed::FeedRegistry;
use crate::settings::PulseSettings;
use crate::synthetic;
use crate::transport::{
    Generation, GenerationGate, TickBatch, TransportHealth, TransportManager, TransportMetrics,
};

/// Capacity of the transport -> hub batch channel
const BATCH_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the hub event broadcast
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Change notifications delivered to listeners and subscribers
#[derive(Debug, Clone)]
pub enum HubEvent {
    Snapshot(Arc<Snapshot>),
    Configuration(Configuration),
    Status(ConnectionStatus),
}

/// Synchronous change callback
pub type Listener = Arc<dyn Fn(&HubEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Which classes have reported in the current generation
#[derive(Debug, Default)]
struct IngestState {
    generation: Option<Generation>,
    stocks_reported: bool,
    crypto_reported: bool,
}

impl IngestState {
    /// Switch to `generation`, returning true if it was new
    fn observe(&mut self, generation: Generation) -> bool {
        if self.generation == Some(generation) {
            return false;
        }
        *self = IngestState {
            generation: Some(generation),
            ..IngestState::default()
        };
        true
    }

    fn mark(&mut self, asset_type: AssetType) {
        match asset_type {
            AssetType::Stock => self.stocks_reported = true,
            AssetType::Crypto => self.crypto_reported = true,
        }
    }

    fn complete(&self) -> bool {
        self.stocks_reported && self.crypto_reported
    }
}

/// State shared between the hub handle and its background tasks
struct HubShared {
    configuration: RwLock<Configuration>,
    snapshot: watch::Sender<Arc<Snapshot>>,
    events: broadcast::Sender<HubEvent>,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
    ingest: Mutex<IngestState>,
    gate: Arc<GenerationGate>,
}

impl HubShared {
    fn publish(&self, event: HubEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&event);
        }
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Merge a batch if its generation is still live
    fn apply_batch(&self, batch: TickBatch) -> bool {
        let published = {
            let current = self.gate.read();
            if *current != batch.generation {
                debug!(
                    "[Hub] Dropping stale {} batch from {} (current {})",
                    batch.asset_type, batch.generation, *current
                );
                return false;
            }

            let mut ingest = self.ingest.lock();
            ingest.observe(batch.generation);
            ingest.mark(batch.asset_type);

            let previous = self.snapshot.borrow().clone();
            let mut next = merge_batch(&previous, batch.asset_type, &batch.ticks, Utc::now());
            next.is_loading = !ingest.complete();

            let next = Arc::new(next);
            self.snapshot.send_replace(Arc::clone(&next));
            next
        };

        self.publish(HubEvent::Snapshot(published));
        true
    }

    /// Publish `is_loading = true` for a freshly started generation,
    /// unless that generation has already reported
    fn begin_loading(&self, generation: Generation) {
        let published = {
            let current = self.gate.read();
            if *current != generation {
                return;
            }
            let mut ingest = self.ingest.lock();
            if !ingest.observe(generation) {
                return;
            }

            let next = Arc::new(self.snapshot.borrow().with_loading(true));
            self.snapshot.send_replace(Arc::clone(&next));
            next
        };

        self.publish(HubEvent::Snapshot(published));
    }
}

/// Market data hub: configuration, snapshot, status and listeners
pub struct MarketDataHub {
    shared: Arc<HubShared>,
    transport: tokio::sync::Mutex<TransportManager>,
    status: watch::Receiver<ConnectionStatus>,
    metrics: Arc<TransportMetrics>,
    catalog: Catalog,
    volatility: f64,
    batches: Mutex<Option<mpsc::Receiver<TickBatch>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl MarketDataHub {
    pub fn new(settings: PulseSettings, registry: Arc<dyn FeedRegistry>) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(Snapshot::empty()));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (batch_tx, batch_rx) = mpsc::channel(BATCH_CHANNEL_CAPACITY);

        let transport = TransportManager::new(
            registry,
            settings.transport.clone(),
            settings.catalog.clone(),
            batch_tx,
            snapshot_rx,
        );

        let shared = Arc::new(HubShared {
            configuration: RwLock::new(settings.initial),
            snapshot: snapshot_tx,
            events,
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            ingest: Mutex::new(IngestState::default()),
            gate: transport.gate(),
        });

        Self {
            shared,
            status: transport.status(),
            metrics: transport.metrics(),
            transport: tokio::sync::Mutex::new(transport),
            catalog: settings.catalog,
            volatility: settings.transport.volatility,
            batches: Mutex::new(Some(batch_rx)),
            tasks: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Spawn the ingest and status tasks and start the initial transport.
    ///
    /// If the initial configuration cannot be prepared the hub falls back
    /// to dummy data and reports the reason as an error status.
    pub async fn start(&self) -> PulseResult<()> {
        let Some(batches) = self.batches.lock().take() else {
            return Err(PulseError::internal("MarketDataHub already started"));
        };

        let ingest = tokio::spawn(Self::ingest_loop(
            Arc::clone(&self.shared),
            batches,
            self.shutdown.child_token(),
        ));
        let status = tokio::spawn(Self::status_loop(
            Arc::clone(&self.shared),
            self.status.clone(),
            self.shutdown.child_token(),
        ));
        self.tasks.lock().extend([ingest, status]);

        let mut transport = self.transport.lock().await;
        let requested = *self.shared.configuration.read();

        match transport.prepare(&requested) {
            Ok(plan) => {
                let generation = transport.start(plan).await;
                self.shared.begin_loading(generation);
            }
            Err(e) => {
                error!("[Hub] Initial configuration unusable: {}", e);
                let fallback = Configuration {
                    use_dummy_data: true,
                    ..requested
                };
                let fallback = if fallback.validate().is_ok() {
                    fallback
                } else {
                    Configuration::default()
                };
                let plan = transport.prepare(&fallback)?;

                *self.shared.configuration.write() = fallback;
                self.shared.publish(HubEvent::Configuration(fallback));
                let generation = transport.start(plan).await;
                self.shared.begin_loading(generation);
                transport.reject(&e);
            }
        }

        info!("[Hub] Started with {:?}", *self.shared.configuration.read());
        Ok(())
    }

    /// Stop the transport and background tasks
    pub async fn shutdown(&self) {
        self.transport.lock().await.stop().await;
        self.shutdown.cancel();

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("[Hub] Background task ended abnormally: {}", e);
            }
        }
        info!("[Hub] Shut down");
    }

    async fn ingest_loop(
        shared: Arc<HubShared>,
        mut batches: mpsc::Receiver<TickBatch>,
        cancel: CancellationToken,
    ) {
        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                batch = batches.recv() => match batch {
                    Some(batch) => batch,
                    None => break,
                },
            };
            shared.apply_batch(batch);
        }
        debug!("[Hub] Ingest loop exited");
    }

    async fn status_loop(
        shared: Arc<HubShared>,
        mut status: watch::Receiver<ConnectionStatus>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = status.borrow_and_update().clone();
                    shared.publish(HubEvent::Status(current));
                }
            }
        }
        debug!("[Hub] Status loop exited");
    }

    // ========================================================================
    // Read API
    // ========================================================================

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.shared.snapshot.borrow().clone()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.shared.snapshot.subscribe()
    }

    pub fn configuration(&self) -> Configuration {
        *self.shared.configuration.read()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.shared.events.subscribe()
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&HubEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::SeqCst));
        let listener: Listener = Arc::new(listener);
        self.shared.listeners.write().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.shared.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub async fn health(&self) -> TransportHealth {
        self.transport.lock().await.health()
    }

    pub fn metrics(&self) -> Arc<TransportMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Synthetic chart series of `points` values seeded from the symbol's
    /// current price, or its catalog seed before any data has arrived
    pub fn price_history(&self, symbol: &str, points: usize) -> Option<Vec<Decimal>> {
        let seed = self
            .snapshot()
            .price_of(symbol)
            .or_else(|| self.catalog.find(symbol).map(|spec| spec.seed_price))?;

        let mut rng = StdRng::from_os_rng();
        Some(synthetic::series(seed, points, self.volatility, &mut rng))
    }

    // ========================================================================
    // Setters
    // ========================================================================

    pub async fn set_api_provider(&self, provider: ApiProvider) -> PulseResult<()> {
        self.reconfigure(|c| c.api_provider = provider).await
    }

    pub async fn set_connection_method(&self, method: ConnectionMethod) -> PulseResult<()> {
        self.reconfigure(|c| c.connection_method = method).await
    }

    pub async fn set_use_dummy_data(&self, use_dummy_data: bool) -> PulseResult<()> {
        self.reconfigure(|c| c.use_dummy_data = use_dummy_data).await
    }

    /// Ask every running class for an immediate out-of-cycle update
    pub async fn refresh_data(&self) {
        self.transport.lock().await.refresh();
    }

    /// Apply a mutation and restart the transport.
    ///
    /// A conflicting mutation leaves the configuration untouched, sets the
    /// status to error and returns the reason.
    async fn reconfigure<F>(&self, mutate: F) -> PulseResult<()>
    where
        F: FnOnce(&mut Configuration),
    {
        let mut transport = self.transport.lock().await;

        let current = *self.shared.configuration.read();
        let mut candidate = current;
        mutate(&mut candidate);

        if candidate == current {
            debug!("[Hub] Configuration unchanged, no restart");
            return Ok(());
        }

        let plan = match transport.prepare(&candidate) {
            Ok(plan) => plan,
            Err(e) => {
                transport.reject(&e);
                return Err(e);
            }
        };

        info!("[Hub] Configuration {:?} -> {:?}", current, candidate);
        *self.shared.configuration.write() = candidate;
        self.shared.publish(HubEvent::Configuration(candidate));

        let generation = transport.start(plan).await;
        self.shared.begin_loading(generation);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TickSource;
    use pulse_core::{default_crypto, default_stocks, RawTick};
    use rust_decimal_macros::dec;

    fn shared() -> HubShared {
        let (snapshot, _) = watch::channel(Arc::new(Snapshot::empty()));
        let (events, _) = broadcast::channel(16);
        HubShared {
            configuration: RwLock::new(Configuration::default()),
            snapshot,
            events,
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            ingest: Mutex::new(IngestState::default()),
            gate: Arc::new(GenerationGate::new()),
        }
    }

    fn batch(generation: Generation, asset_type: AssetType, symbol: &str, price: Decimal) -> TickBatch {
        TickBatch {
            generation,
            asset_type,
            source: TickSource::Synthetic,
            ticks: vec![RawTick::new(symbol, symbol, asset_type, price)],
        }
    }

    #[test]
    fn test_stale_generation_is_discarded() {
        let shared = shared();
        let stale = shared.gate.current();
        let live = shared.gate.advance();

        assert!(!shared.apply_batch(batch(stale, AssetType::Stock, "AAPL", dec!(999))));
        assert!(shared.snapshot.borrow().stocks_data.is_empty());

        assert!(shared.apply_batch(batch(live, AssetType::Stock, "AAPL", dec!(100))));
        assert_eq!(shared.snapshot.borrow().price_of("AAPL"), Some(dec!(100)));
    }

    #[test]
    fn test_loading_until_both_classes_report() {
        let shared = shared();
        let generation = shared.gate.advance();
        shared.begin_loading(generation);
        assert!(shared.snapshot.borrow().is_loading);

        shared.apply_batch(batch(generation, AssetType::Crypto, "BTC", dec!(65000)));
        assert!(shared.snapshot.borrow().is_loading);

        shared.apply_batch(batch(generation, AssetType::Stock, "AAPL", dec!(190)));
        assert!(!shared.snapshot.borrow().is_loading);

        // a restart resets loading but keeps data
        let next = shared.gate.advance();
        shared.begin_loading(next);
        let snapshot = shared.snapshot.borrow().clone();
        assert!(snapshot.is_loading);
        assert_eq!(snapshot.price_of("BTC"), Some(dec!(65000)));
    }

    #[test]
    fn test_listeners_receive_every_snapshot() {
        let shared = Arc::new(shared());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: Listener = Arc::new(move |event: &HubEvent| {
            if let HubEvent::Snapshot(s) = event {
                sink.lock().push(s.price_of("ETH"));
            }
        });
        shared.listeners.write().push((ListenerId(1), listener));

        let generation = shared.gate.advance();
        shared.apply_batch(batch(generation, AssetType::Crypto, "ETH", dec!(3400)));
        shared.apply_batch(batch(generation, AssetType::Crypto, "ETH", dec!(3410)));

        assert_eq!(*seen.lock(), vec![Some(dec!(3400)), Some(dec!(3410))]);
    }

    #[test]
    fn test_price_history_for_known_and_unknown_symbols() {
        let settings = PulseSettings {
            catalog: Catalog::new(default_stocks(), default_crypto()),
            ..PulseSettings::default()
        };
        struct NoFeeds;
        impl FeedRegistry for NoFeeds {
            fn feed_for(
                &self,
                provider: ApiProvider,
            ) -> PulseResult<Arc<dyn crate::feed::QuoteFeed>> {
                Err(PulseError::config(format!("no feed for {}", provider)))
            }
        }
        let hub = MarketDataHub::new(settings, Arc::new(NoFeeds));

        let series = hub.price_history("aapl", 20).unwrap();
        assert_eq!(series.len(), 20);
        assert_eq!(series[0], dec!(189.50));
        assert!(hub.price_history("NOPE", 20).is_none());
    }
}
