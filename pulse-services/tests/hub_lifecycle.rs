//! Hub lifecycle tests against scripted provider feeds

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pulse_core::{
    ApiProvider, AssetType, Catalog, ConnectionMethod, ConnectionState, Configuration,
    PulseError, PulseResult, RawTick,
};
use pulse_services::{
    Backoff, FeedRegistry, HubEvent, MarketDataHub, PulseSettings, QuoteFeed, TransportSettings,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Feed that answers every fetch with one fixed tick after `delay`
struct ScriptedFeed {
    provider: ApiProvider,
    symbol: &'static str,
    price: Decimal,
    delay: Duration,
    fetches: AtomicUsize,
}

impl ScriptedFeed {
    fn new(provider: ApiProvider, symbol: &'static str, price: Decimal, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            provider,
            symbol,
            price,
            delay,
            fetches: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl QuoteFeed for ScriptedFeed {
    fn provider(&self) -> ApiProvider {
        self.provider
    }

    fn asset_type(&self) -> AssetType {
        self.provider.asset_type().unwrap_or(AssetType::Stock)
    }

    async fn fetch_once(&self) -> PulseResult<Vec<RawTick>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(vec![RawTick::new(
            self.symbol,
            self.symbol,
            self.asset_type(),
            self.price,
        )])
    }
}

/// Registry that counts every adapter lookup
#[derive(Default)]
struct CountingRegistry {
    feeds: HashMap<ApiProvider, Arc<dyn QuoteFeed>>,
    lookups: AtomicUsize,
}

impl CountingRegistry {
    fn with(mut self, feed: Arc<dyn QuoteFeed>) -> Self {
        self.feeds.insert(feed.provider(), feed);
        self
    }
}

impl FeedRegistry for CountingRegistry {
    fn feed_for(&self, provider: ApiProvider) -> PulseResult<Arc<dyn QuoteFeed>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.feeds
            .get(&provider)
            .cloned()
            .ok_or_else(|| PulseError::config(format!("{} is not configured", provider)))
    }
}

fn settings(initial: Configuration) -> PulseSettings {
    PulseSettings {
        initial,
        transport: TransportSettings {
            poll_interval: Duration::from_secs(1),
            stream_tick_interval: Duration::from_millis(200),
            request_timeout: Duration::from_secs(10),
            backoff: Backoff::exponential(Duration::from_millis(500), Duration::from_secs(4), false),
            max_retries: 3,
            fallback_to_synthetic: true,
            volatility: 0.02,
        },
        catalog: Catalog::default(),
        ..PulseSettings::default()
    }
}

fn live(provider: ApiProvider) -> Configuration {
    Configuration {
        api_provider: provider,
        connection_method: ConnectionMethod::Rest,
        use_dummy_data: false,
    }
}

fn record_events(hub: &MarketDataHub) -> Arc<Mutex<Vec<HubEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    hub.add_listener(move |event| sink.lock().push(event.clone()));
    events
}

#[tokio::test(start_paused = true)]
async fn test_slow_previous_provider_never_reaches_snapshot() {
    let slow = ScriptedFeed::new(ApiProvider::Finnhub, "AAPL", dec!(111), Duration::from_secs(2));
    let fast = ScriptedFeed::new(ApiProvider::AlphaVantage, "AAPL", dec!(222), Duration::ZERO);
    let registry = Arc::new(
        CountingRegistry::default()
            .with(slow.clone())
            .with(fast.clone()),
    );

    let hub = MarketDataHub::new(settings(live(ApiProvider::Finnhub)), registry);
    let events = record_events(&hub);
    hub.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(slow.fetches.load(Ordering::SeqCst), 1);

    hub.set_api_provider(ApiProvider::AlphaVantage).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(hub.snapshot().price_of("AAPL"), Some(dec!(222)));
    let leaked = events.lock().iter().any(|event| match event {
        HubEvent::Snapshot(snapshot) => snapshot.price_of("AAPL") == Some(dec!(111)),
        _ => false,
    });
    assert!(!leaked, "a retired generation published into the snapshot");

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_dummy_mode_never_touches_providers() {
    let registry = Arc::new(CountingRegistry::default());
    let hub = MarketDataHub::new(settings(Configuration::default()), registry.clone());
    hub.start().await.unwrap();

    hub.set_api_provider(ApiProvider::Binance).await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(registry.lookups.load(Ordering::SeqCst), 0);
    assert_eq!(hub.connection_status().state, ConnectionState::Idle);
    assert_eq!(hub.configuration().api_provider, ApiProvider::Binance);

    let snapshot = hub.snapshot();
    assert!(!snapshot.is_loading);
    assert_eq!(snapshot.stocks_data.len(), Catalog::default().stocks.len());
    assert_eq!(snapshot.crypto_data.len(), Catalog::default().crypto.len());
    assert!(snapshot
        .stocks_data
        .iter()
        .chain(snapshot.crypto_data.iter())
        .all(|asset| asset.price > Decimal::ZERO));

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_conflicting_setter_is_rejected_without_side_effects() {
    let registry = Arc::new(CountingRegistry::default());
    let hub = MarketDataHub::new(settings(Configuration::default()), registry);
    hub.start().await.unwrap();

    hub.set_api_provider(ApiProvider::CoinGecko).await.unwrap();
    let before = hub.configuration();

    let result = hub.set_connection_method(ConnectionMethod::WebSocket).await;

    assert!(matches!(result, Err(PulseError::Config(_))));
    assert_eq!(hub.configuration(), before);
    assert_eq!(hub.connection_status().state, ConnectionState::Error);

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_setting_same_value_does_not_restart() {
    let hub = MarketDataHub::new(
        settings(Configuration::default()),
        Arc::new(CountingRegistry::default()),
    );
    hub.start().await.unwrap();
    let events = record_events(&hub);

    hub.set_use_dummy_data(true).await.unwrap();
    hub.set_connection_method(ConnectionMethod::Rest).await.unwrap();

    let reconfigured = events
        .lock()
        .iter()
        .any(|event| matches!(event, HubEvent::Configuration(_)));
    assert!(!reconfigured);

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_restart_reenters_loading_and_keeps_data() {
    let hub = MarketDataHub::new(
        settings(Configuration::default()),
        Arc::new(CountingRegistry::default()),
    );
    hub.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!hub.snapshot().is_loading);

    let events = record_events(&hub);
    hub.set_api_provider(ApiProvider::Finnhub).await.unwrap();

    let first_snapshot = events
        .lock()
        .iter()
        .skip_while(|event| !matches!(event, HubEvent::Configuration(_)))
        .find_map(|event| match event {
            HubEvent::Snapshot(snapshot) => Some(Arc::clone(snapshot)),
            _ => None,
        });
    let first_snapshot = first_snapshot.expect("restart publishes a loading snapshot");
    assert!(first_snapshot.is_loading);
    assert!(!first_snapshot.stocks_data.is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!hub.snapshot().is_loading);

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unusable_initial_provider_starts_in_dummy_mode() {
    let registry = Arc::new(CountingRegistry::default());
    let hub = MarketDataHub::new(settings(live(ApiProvider::Finnhub)), registry);
    hub.start().await.unwrap();

    let configuration = hub.configuration();
    assert!(configuration.use_dummy_data);
    assert_eq!(configuration.api_provider, ApiProvider::Finnhub);
    assert_eq!(hub.connection_status().state, ConnectionState::Error);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!hub.snapshot().crypto_data.is_empty());

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_live_class_reports_connected_and_other_class_is_synthetic() {
    let feed = ScriptedFeed::new(ApiProvider::Binance, "BTC", dec!(64000), Duration::ZERO);
    let hub = MarketDataHub::new(
        settings(live(ApiProvider::Binance)),
        Arc::new(CountingRegistry::default().with(feed.clone())),
    );
    hub.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert_eq!(hub.connection_status().state, ConnectionState::Connected);
    let snapshot = hub.snapshot();
    assert_eq!(snapshot.price_of("BTC"), Some(dec!(64000)));
    assert!(!snapshot.stocks_data.is_empty());
    assert_eq!(feed.fetches.load(Ordering::SeqCst), 2);

    hub.refresh_data().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(feed.fetches.load(Ordering::SeqCst), 3);

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_updates() {
    let hub = MarketDataHub::new(
        settings(Configuration::default()),
        Arc::new(CountingRegistry::default()),
    );
    hub.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    hub.shutdown().await;
    let frozen = hub.snapshot();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(hub.snapshot().timestamp, frozen.timestamp);
    assert!(matches!(hub.start().await, Err(PulseError::Internal(_))));
}
