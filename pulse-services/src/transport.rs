//! Transport Manager
//!
//! Owns the single active transport generation: one task per asset class,
//! each polling a provider, reading its stream, or driving the synthetic
//! generator. Every batch and status write is tagged with the generation
//! that produced it, and [`TransportManager::stop`] retires the generation
//! before tearing its tasks down, so nothing from a torn-down transport
//! survives the teardown.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::{RwLock, RwLockReadGuard};
use pulse_core::{
    ApiProvider, AssetSpec, AssetType, Catalog, ConnectionMethod, ConnectionStatus, Configuration,
    PulseError, PulseResult, RawTick, Snapshot,
};
use serde::Serialize;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::feed::{FeedRegistry, QuoteFeed, TickStream};
use crate::settings::TransportSettings;
use crate::synthetic::SyntheticGenerator;

// ============================================================================
// Generations
// ============================================================================

/// Identifies one start..stop lifetime of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Generation(u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Shared record of the live generation.
///
/// Readers hold the read guard across check-and-publish so a concurrent
/// [`GenerationGate::advance`] waits for them to finish.
#[derive(Debug)]
pub struct GenerationGate {
    current: RwLock<Generation>,
}

impl GenerationGate {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Generation(0)),
        }
    }

    pub fn current(&self) -> Generation {
        *self.current.read()
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        *self.current.read() == generation
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Generation> {
        self.current.read()
    }

    /// Retire the current generation, returning the new one
    pub fn advance(&self) -> Generation {
        let mut current = self.current.write();
        current.0 += 1;
        *current
    }
}

impl Default for GenerationGate {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tick batches
// ============================================================================

/// Where a batch came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "provider")]
pub enum TickSource {
    Live(ApiProvider),
    Synthetic,
}

/// Ticks for one asset class, tagged with the producing generation
#[derive(Debug, Clone)]
pub struct TickBatch {
    pub generation: Generation,
    pub asset_type: AssetType,
    pub source: TickSource,
    pub ticks: Vec<RawTick>,
}

// ============================================================================
// Plans
// ============================================================================

/// How one asset class is served
#[derive(Clone)]
pub enum ClassPlan {
    Poll(Arc<dyn QuoteFeed>),
    Stream(Arc<dyn QuoteFeed>),
    Synthetic { cadence: Duration },
}

impl ClassPlan {
    fn describe(&self) -> String {
        match self {
            ClassPlan::Poll(feed) => format!("polling {}", feed.provider()),
            ClassPlan::Stream(feed) => format!("streaming {}", feed.provider()),
            ClassPlan::Synthetic { cadence } => format!("synthetic every {:?}", cadence),
        }
    }

    fn is_live(&self) -> bool {
        !matches!(self, ClassPlan::Synthetic { .. })
    }
}

/// A validated configuration, ready to start
#[derive(Clone)]
pub struct TransportPlan {
    pub configuration: Configuration,
    pub stocks: ClassPlan,
    pub crypto: ClassPlan,
}

impl TransportPlan {
    pub fn class(&self, asset_type: AssetType) -> &ClassPlan {
        match asset_type {
            AssetType::Stock => &self.stocks,
            AssetType::Crypto => &self.crypto,
        }
    }

    pub fn is_synthetic_only(&self) -> bool {
        !self.stocks.is_live() && !self.crypto.is_live()
    }
}

// ============================================================================
// Health metrics
// ============================================================================

/// Per-class counters (atomic for lock-free reads from the API)
#[derive(Debug, Default)]
pub struct ClassMetrics {
    batch_count: AtomicU64,
    last_batch_epoch_ms: AtomicU64,
    consecutive_failures: AtomicU32,
    synthetic: AtomicBool,
}

impl ClassMetrics {
    fn reset(&self, synthetic: bool) {
        self.batch_count.store(0, Ordering::SeqCst);
        self.last_batch_epoch_ms.store(0, Ordering::SeqCst);
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.synthetic.store(synthetic, Ordering::SeqCst);
    }

    fn record_batch(&self, source: TickSource) {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        self.last_batch_epoch_ms.store(now, Ordering::SeqCst);
        self.batch_count.fetch_add(1, Ordering::SeqCst);
        self.synthetic
            .store(source == TickSource::Synthetic, Ordering::SeqCst);
    }

    fn record_failures(&self, failures: u32) {
        self.consecutive_failures.store(failures, Ordering::SeqCst);
    }

    fn health(&self, asset_type: AssetType, stale_after: Duration) -> ClassHealth {
        let last_ms = self.last_batch_epoch_ms.load(Ordering::SeqCst);
        let last_batch_time = (last_ms > 0)
            .then(|| DateTime::from_timestamp_millis(last_ms as i64))
            .flatten();
        let is_stale = match last_batch_time {
            Some(t) => (Utc::now() - t).to_std().unwrap_or_default() > stale_after,
            None => true,
        };

        ClassHealth {
            asset_type,
            batch_count: self.batch_count.load(Ordering::SeqCst),
            last_batch_time,
            consecutive_failures: self.consecutive_failures.load(Ordering::SeqCst),
            synthetic: self.synthetic.load(Ordering::SeqCst),
            is_stale,
        }
    }
}

/// Metrics for both asset classes
#[derive(Debug, Default)]
pub struct TransportMetrics {
    stocks: ClassMetrics,
    crypto: ClassMetrics,
}

impl TransportMetrics {
    pub fn class(&self, asset_type: AssetType) -> &ClassMetrics {
        match asset_type {
            AssetType::Stock => &self.stocks,
            AssetType::Crypto => &self.crypto,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassHealth {
    pub asset_type: AssetType,
    pub batch_count: u64,
    pub last_batch_time: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub synthetic: bool,
    pub is_stale: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransportHealth {
    pub generation: Generation,
    pub running: bool,
    pub stocks: ClassHealth,
    pub crypto: ClassHealth,
}

// ============================================================================
// Class task context
// ============================================================================

/// Writes status only while its generation is live
#[derive(Clone)]
struct StatusReporter {
    generation: Generation,
    gate: Arc<GenerationGate>,
    tx: Arc<watch::Sender<ConnectionStatus>>,
}

impl StatusReporter {
    fn report(&self, status: ConnectionStatus) {
        let current = self.gate.read();
        if *current == self.generation {
            debug!("[Transport] {} status -> {}", self.generation, status);
            self.tx.send_replace(status);
        }
    }
}

enum Wake {
    Elapsed,
    Refresh,
    Cancelled,
}

enum StreamEnd {
    Cancelled,
    Closed,
    Failed(PulseError),
}

/// Everything a class task needs
struct ClassContext {
    asset_type: AssetType,
    generation: Generation,
    cancel: CancellationToken,
    refresh: Arc<Notify>,
    batches: mpsc::Sender<TickBatch>,
    status: StatusReporter,
    settings: TransportSettings,
    assets: Vec<AssetSpec>,
    snapshot: watch::Receiver<Arc<Snapshot>>,
    metrics: Arc<TransportMetrics>,
    /// Cadence of synthetic ticks for this class
    cadence: Duration,
}

impl ClassContext {
    /// Send a batch; `false` once the generation is torn down
    async fn emit(&self, ticks: Vec<RawTick>, source: TickSource) -> bool {
        let batch = TickBatch {
            generation: self.generation,
            asset_type: self.asset_type,
            source,
            ticks,
        };

        let sent = tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.batches.send(batch) => sent.is_ok(),
        };
        if sent {
            self.metrics.class(self.asset_type).record_batch(source);
        }
        sent
    }

    fn synthetic(&self) -> SyntheticGenerator {
        let snapshot = self.snapshot.borrow().clone();
        SyntheticGenerator::new(self.assets.clone(), self.settings.volatility).resume_from(&snapshot)
    }

    fn fallback_due(&self, failures: u32) -> bool {
        self.settings.fallback_to_synthetic && failures > self.settings.max_retries
    }

    /// Backoff before the next attempt. Errors that a retry cannot fix
    /// (bad key, unsupported method) wait the full capped delay.
    fn retry_delay(&self, failures: u32, error: Option<&PulseError>) -> Duration {
        match error {
            Some(e) if !e.is_transient() => self.settings.backoff.max_delay(),
            _ => self.settings.backoff.delay(failures.saturating_sub(1)),
        }
    }

    /// Count one more failed attempt, starting the synthetic fallback once
    /// the retry budget is spent
    fn record_failure(
        &self,
        failures: &mut u32,
        fallback: &mut Option<SyntheticGenerator>,
        provider: ApiProvider,
    ) {
        *failures = failures.saturating_add(1);
        self.metrics.class(self.asset_type).record_failures(*failures);
        if self.fallback_due(*failures) && fallback.is_none() {
            warn!("[Transport] {} unavailable, falling back to synthetic data", provider);
            *fallback = Some(self.synthetic());
        }
    }

    /// Clear the failure streak after live data arrived
    fn record_recovery(
        &self,
        failures: &mut u32,
        fallback: &mut Option<SyntheticGenerator>,
        provider: ApiProvider,
    ) {
        if *failures > 0 {
            info!("[Transport] {} recovered after {} failures", provider, failures);
        }
        *failures = 0;
        *fallback = None;
        self.metrics.class(self.asset_type).record_failures(0);
    }

    /// Wait `wait`, emitting synthetic ticks at the class cadence when a
    /// fallback generator is active. Returns early on refresh or teardown.
    async fn pause(&self, wait: Duration, mut fallback: Option<&mut SyntheticGenerator>) -> Wake {
        let deadline = Instant::now() + wait;
        loop {
            let next = match fallback.as_mut() {
                Some(generator) => {
                    if !self.emit(generator.tick(), TickSource::Synthetic).await {
                        return Wake::Cancelled;
                    }
                    (Instant::now() + self.cadence).min(deadline)
                }
                None => deadline,
            };

            tokio::select! {
                _ = self.cancel.cancelled() => return Wake::Cancelled,
                _ = self.refresh.notified() => return Wake::Refresh,
                _ = sleep_until(next) => {
                    if next >= deadline {
                        return Wake::Elapsed;
                    }
                }
            }
        }
    }

    /// Run `fut` bounded by the request timeout; `None` on teardown
    async fn bounded<T, F>(&self, what: &str, fut: F) -> Option<PulseResult<T>>
    where
        F: std::future::Future<Output = PulseResult<T>>,
    {
        let limit = self.settings.request_timeout;
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            outcome = timeout(limit, fut) => Some(match outcome {
                Ok(result) => result,
                Err(_) => Err(PulseError::timeout(format!("{} exceeded {:?}", what, limit))),
            }),
        }
    }

    fn failure_reason(&self, provider: ApiProvider, error: &PulseError, failures: u32, fallback: bool) -> String {
        let mut reason = format!("{}: {}", provider, error);
        if fallback {
            reason.push_str(&format!(
                "; showing synthetic {} data after {} failed attempts",
                self.asset_type, failures
            ));
        }
        reason
    }
}

// ============================================================================
// Class loops
// ============================================================================

/// Next poll deadline after a fetch started at `started`, skipping every
/// tick that came due while the fetch was outstanding.
fn next_poll_deadline(started: Instant, interval: Duration, now: Instant) -> (Instant, u32) {
    let mut deadline = started + interval;
    let mut skipped = 0;
    while deadline <= now {
        deadline += interval;
        skipped += 1;
    }
    (deadline, skipped)
}

async fn run_polling(ctx: ClassContext, feed: Arc<dyn QuoteFeed>) {
    let provider = feed.provider();
    let interval = ctx.settings.poll_interval;
    let mut failures: u32 = 0;
    let mut fallback: Option<SyntheticGenerator> = None;

    info!(
        "[Transport] {} polling {} every {:?}",
        ctx.generation, provider, interval
    );

    loop {
        let started = Instant::now();
        let Some(result) = ctx.bounded("fetch", feed.fetch_once()).await else {
            return;
        };

        let wait = match result {
            Ok(ticks) => {
                ctx.record_recovery(&mut failures, &mut fallback, provider);

                ctx.status.report(ConnectionStatus::connected(format!(
                    "Polling {} every {:?}",
                    provider, interval
                )));
                if !ctx.emit(ticks, TickSource::Live(provider)).await {
                    return;
                }

                let (deadline, skipped) = next_poll_deadline(started, interval, Instant::now());
                if skipped > 0 {
                    debug!("[Transport] {} skipped {} due poll ticks", provider, skipped);
                }
                deadline.saturating_duration_since(Instant::now())
            }
            Err(e) => {
                ctx.record_failure(&mut failures, &mut fallback, provider);

                let delay = ctx.retry_delay(failures, Some(&e));
                warn!(
                    "[Transport] {} fetch failed (attempt {}): {}; retrying in {:?}",
                    provider, failures, e, delay
                );
                ctx.status.report(ConnectionStatus::error(ctx.failure_reason(
                    provider,
                    &e,
                    failures,
                    fallback.is_some(),
                )));
                delay
            }
        };

        if let Wake::Cancelled = ctx.pause(wait, fallback.as_mut()).await {
            return;
        }
    }
}

/// Pump `stream` until it ends. The failure streak is cleared only once
/// the subscription delivers data, so a stream that closes right after the
/// handshake keeps backing off.
async fn read_stream(
    ctx: &ClassContext,
    feed: &Arc<dyn QuoteFeed>,
    stream: &mut TickStream,
    failures: &mut u32,
    fallback: &mut Option<SyntheticGenerator>,
) -> StreamEnd {
    let provider = feed.provider();
    loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => return StreamEnd::Cancelled,
            _ = ctx.refresh.notified() => {
                match ctx.bounded("refresh fetch", feed.fetch_once()).await {
                    None => return StreamEnd::Cancelled,
                    Some(Ok(ticks)) => {
                        if !ctx.emit(ticks, TickSource::Live(provider)).await {
                            return StreamEnd::Cancelled;
                        }
                    }
                    Some(Err(e)) => warn!("[Transport] {} refresh fetch failed: {}", provider, e),
                }
            }
            item = stream.next() => match item {
                Some(Ok(ticks)) => {
                    if ticks.is_empty() {
                        continue;
                    }
                    if *failures > 0 || fallback.is_some() {
                        ctx.record_recovery(failures, fallback, provider);
                    }
                    if !ctx.emit(ticks, TickSource::Live(provider)).await {
                        return StreamEnd::Cancelled;
                    }
                }
                Some(Err(e)) => return StreamEnd::Failed(e),
                None => return StreamEnd::Closed,
            }
        }
    }
}

async fn run_streaming(ctx: ClassContext, feed: Arc<dyn QuoteFeed>) {
    let provider = feed.provider();
    let mut failures: u32 = 0;
    let mut fallback: Option<SyntheticGenerator> = None;

    loop {
        ctx.status.report(ConnectionStatus::connecting(format!(
            "Subscribing to {} stream",
            provider
        )));

        let Some(subscribed) = ctx.bounded("subscribe", feed.subscribe()).await else {
            return;
        };

        let failure = match subscribed {
            Ok(mut stream) => {
                info!("[Transport] {} {} stream subscribed", ctx.generation, provider);
                ctx.status.report(ConnectionStatus::connected(format!(
                    "Streaming from {}",
                    provider
                )));

                match read_stream(&ctx, &feed, &mut stream, &mut failures, &mut fallback).await {
                    StreamEnd::Cancelled => return,
                    StreamEnd::Closed => None,
                    StreamEnd::Failed(e) => Some(e),
                }
            }
            Err(e) => Some(e),
        };

        ctx.record_failure(&mut failures, &mut fallback, provider);
        let delay = ctx.retry_delay(failures, failure.as_ref());

        match failure {
            None => {
                info!("[Transport] {} stream closed by remote; reconnecting in {:?}", provider, delay);
                ctx.status.report(ConnectionStatus::disconnected(format!(
                    "{} closed the stream; reconnecting in {:?}",
                    provider, delay
                )));
            }
            Some(e) => {
                warn!(
                    "[Transport] {} stream failed (attempt {}): {}; retrying in {:?}",
                    provider, failures, e, delay
                );
                ctx.status.report(ConnectionStatus::error(ctx.failure_reason(
                    provider,
                    &e,
                    failures,
                    fallback.is_some(),
                )));
            }
        }

        if let Wake::Cancelled = ctx.pause(delay, fallback.as_mut()).await {
            return;
        }
    }
}

async fn run_synthetic(ctx: ClassContext) {
    let mut generator = ctx.synthetic();
    debug!(
        "[Transport] {} synthetic {} every {:?}",
        ctx.generation, ctx.asset_type, ctx.cadence
    );

    loop {
        if !ctx.emit(generator.tick(), TickSource::Synthetic).await {
            return;
        }
        if let Wake::Cancelled = ctx.pause(ctx.cadence, None).await {
            return;
        }
    }
}

// ============================================================================
// Transport Manager
// ============================================================================

struct ActiveTransport {
    generation: Generation,
    cancel: CancellationToken,
    refresh: Vec<Arc<Notify>>,
    tasks: Vec<JoinHandle<()>>,
}

/// Starts, stops and supervises the per-class transport tasks
pub struct TransportManager {
    registry: Arc<dyn FeedRegistry>,
    settings: TransportSettings,
    catalog: Catalog,
    gate: Arc<GenerationGate>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    batches: mpsc::Sender<TickBatch>,
    snapshot: watch::Receiver<Arc<Snapshot>>,
    metrics: Arc<TransportMetrics>,
    active: Option<ActiveTransport>,
}

impl TransportManager {
    pub fn new(
        registry: Arc<dyn FeedRegistry>,
        settings: TransportSettings,
        catalog: Catalog,
        batches: mpsc::Sender<TickBatch>,
        snapshot: watch::Receiver<Arc<Snapshot>>,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());

        Self {
            registry,
            settings,
            catalog,
            gate: Arc::new(GenerationGate::new()),
            status: Arc::new(status),
            batches,
            snapshot,
            metrics: Arc::new(TransportMetrics::default()),
            active: None,
        }
    }

    pub fn gate(&self) -> Arc<GenerationGate> {
        Arc::clone(&self.gate)
    }

    pub fn metrics(&self) -> Arc<TransportMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn health(&self) -> TransportHealth {
        let stale_after = self.settings.poll_interval.max(self.settings.stream_tick_interval) * 3
            + self.settings.backoff.max_delay();

        TransportHealth {
            generation: self.gate.current(),
            running: self.is_running(),
            stocks: self.metrics.stocks.health(AssetType::Stock, stale_after),
            crypto: self.metrics.crypto.health(AssetType::Crypto, stale_after),
        }
    }

    /// Validate `configuration` and resolve its adapters without starting
    /// anything. Never touches the network.
    pub fn prepare(&self, configuration: &Configuration) -> PulseResult<TransportPlan> {
        configuration.validate()?;

        let cadence = match configuration.connection_method {
            ConnectionMethod::Rest => self.settings.poll_interval,
            ConnectionMethod::WebSocket => self.settings.stream_tick_interval,
        };
        let synthetic = ClassPlan::Synthetic { cadence };

        let live_type = match configuration.api_provider.asset_type() {
            Some(t) if !configuration.is_synthetic_only() => t,
            _ => {
                return Ok(TransportPlan {
                    configuration: *configuration,
                    stocks: synthetic.clone(),
                    crypto: synthetic,
                })
            }
        };

        let feed = self.registry.feed_for(configuration.api_provider)?;
        let live = match configuration.connection_method {
            ConnectionMethod::Rest => ClassPlan::Poll(feed),
            ConnectionMethod::WebSocket if feed.supports_streaming() => ClassPlan::Stream(feed),
            ConnectionMethod::WebSocket => {
                return Err(PulseError::config(format!(
                    "{} does not offer a streaming API; use REST polling instead",
                    configuration.api_provider
                )))
            }
        };

        let (stocks, crypto) = match live_type {
            AssetType::Stock => (live, synthetic),
            AssetType::Crypto => (synthetic, live),
        };

        Ok(TransportPlan {
            configuration: *configuration,
            stocks,
            crypto,
        })
    }

    /// Report a rejected configuration
    pub fn reject(&self, error: &PulseError) {
        warn!("[Transport] Configuration rejected: {}", error);
        self.status
            .send_replace(ConnectionStatus::error(error.to_string()));
    }

    /// Tear down the running generation (if any) and start `plan`
    pub async fn start(&mut self, plan: TransportPlan) -> Generation {
        self.stop().await;

        let generation = self.gate.current();
        let cancel = CancellationToken::new();

        info!(
            "[Transport] Starting {}: stocks {}, crypto {}",
            generation,
            plan.stocks.describe(),
            plan.crypto.describe()
        );

        if plan.is_synthetic_only() {
            self.status
                .send_replace(ConnectionStatus::idle("Serving synthetic data"));
        } else {
            self.status.send_replace(ConnectionStatus::connecting(format!(
                "Connecting to {} via {}",
                plan.configuration.api_provider, plan.configuration.connection_method
            )));
        }

        let mut refresh = Vec::with_capacity(2);
        let mut tasks = Vec::with_capacity(2);
        for asset_type in AssetType::ALL {
            let class_plan = plan.class(asset_type).clone();
            let notify = Arc::new(Notify::new());
            self.metrics
                .class(asset_type)
                .reset(!class_plan.is_live());

            let ctx = ClassContext {
                asset_type,
                generation,
                cancel: cancel.child_token(),
                refresh: Arc::clone(&notify),
                batches: self.batches.clone(),
                status: StatusReporter {
                    generation,
                    gate: Arc::clone(&self.gate),
                    tx: Arc::clone(&self.status),
                },
                settings: self.settings.clone(),
                assets: self.catalog.assets(asset_type).to_vec(),
                snapshot: self.snapshot.clone(),
                metrics: Arc::clone(&self.metrics),
                cadence: match &class_plan {
                    ClassPlan::Synthetic { cadence } => *cadence,
                    ClassPlan::Poll(_) => self.settings.poll_interval,
                    ClassPlan::Stream(_) => self.settings.stream_tick_interval,
                },
            };

            let handle = match class_plan {
                ClassPlan::Poll(feed) => tokio::spawn(run_polling(ctx, feed)),
                ClassPlan::Stream(feed) => tokio::spawn(run_streaming(ctx, feed)),
                ClassPlan::Synthetic { .. } => tokio::spawn(run_synthetic(ctx)),
            };

            refresh.push(notify);
            tasks.push(handle);
        }

        self.active = Some(ActiveTransport {
            generation,
            cancel,
            refresh,
            tasks,
        });

        generation
    }

    /// Retire the current generation, cancel its tasks and wait for them.
    /// Status is `idle` once this returns.
    pub async fn stop(&mut self) {
        let retired = self.gate.current();
        let next = self.gate.advance();

        if let Some(active) = self.active.take() {
            debug!("[Transport] Stopping {} (next {})", active.generation, next);
            active.cancel.cancel();
            for task in active.tasks {
                if let Err(e) = task.await {
                    if e.is_panic() {
                        error!("[Transport] {} task panicked: {}", active.generation, e);
                    }
                }
            }
            info!("[Transport] Stopped {}", retired);
        }

        self.status
            .send_replace(ConnectionStatus::idle("Transport stopped"));
    }

    /// Wake every class task for an immediate out-of-cycle fetch
    pub fn refresh(&self) {
        match &self.active {
            Some(active) => {
                debug!("[Transport] Refresh requested for {}", active.generation);
                for notify in &active.refresh {
                    notify.notify_one();
                }
            }
            None => debug!("[Transport] Refresh ignored, transport not running"),
        }
    }
}
