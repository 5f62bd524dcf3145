//! Periodic score recomputation with single-flight protection.
//!
//! A [`Scheduler`] owns one `running` flag. Each tick of its [`Ticker`]
//! starts a batch pass over every active route unless a previous pass is
//! still in flight, in which case the tick is logged and dropped. Manual
//! passes through [`Scheduler::recompute`] take the same flag, so an
//! [`crate::Engine`] shares one scheduler across all of its entry points.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{Instrument, error, info, warn};

use crate::error::{AnalyticsError, Result};
use crate::models::ScoreRecord;
use crate::scoring::ScoreAggregator;

/// Source of scheduler ticks. Returns `false` once no more ticks will come.
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self) -> bool;
}

/// Fires immediately, then once per `period`. Late ticks are skipped rather
/// than bunched up.
pub struct IntervalTicker(Interval);

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self(interval)
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.0.tick().await;
        true
    }
}

/// Ticks whenever the paired [`mpsc::Sender`] sends; ends when it is dropped.
pub struct ManualTicker(mpsc::Receiver<()>);

impl ManualTicker {
    pub fn channel() -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel(16);
        (tx, Self(rx))
    }
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) -> bool {
        self.0.recv().await.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass ran; `updated` routes were written.
    Completed { updated: usize },
    /// Another pass held the running flag.
    Skipped,
}

/// Clears the running flag when the pass ends, including on error or panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
struct PassRunner {
    aggregator: ScoreAggregator,
    running: Arc<AtomicBool>,
}

impl PassRunner {
    fn try_begin(&self) -> Option<RunningGuard> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunningGuard(self.running.clone()))
    }

    async fn run(&self, _guard: RunningGuard) -> Result<Vec<ScoreRecord>> {
        self.aggregator.recompute_all().await
    }
}

struct LoopHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct Scheduler {
    runner: PassRunner,
    handle: Mutex<Option<LoopHandle>>,
}

impl Scheduler {
    pub fn new(aggregator: ScoreAggregator) -> Self {
        Self {
            runner: PassRunner {
                aggregator,
                running: Arc::new(AtomicBool::new(false)),
            },
            handle: Mutex::new(None),
        }
    }

    /// Whether a batch pass currently holds the running flag.
    pub fn is_running(&self) -> bool {
        self.runner.running.load(Ordering::SeqCst)
    }

    /// Runs one batch pass inline and returns the written records.
    ///
    /// Fails with [`AnalyticsError::PassInProgress`] while another pass,
    /// scheduled or manual, holds the running flag.
    pub async fn recompute(&self) -> Result<Vec<ScoreRecord>> {
        let guard = self
            .runner
            .try_begin()
            .ok_or(AnalyticsError::PassInProgress)?;
        self.runner.run(guard).await
    }

    /// Runs one batch pass inline, or skips if another pass is in flight.
    pub async fn run_pass(&self) -> Result<PassOutcome> {
        match self.recompute().await {
            Ok(updated) => Ok(PassOutcome::Completed {
                updated: updated.len(),
            }),
            Err(AnalyticsError::PassInProgress) => {
                info!("Score recomputation already running, skipping");
                Ok(PassOutcome::Skipped)
            }
            Err(e) => Err(e),
        }
    }

    /// Spawns the tick loop. Each accepted tick runs its pass on a separate
    /// task so a slow pass never delays the next tick's skip decision. When
    /// the loop ends it waits for its last pass to finish.
    ///
    /// Calling `start` on a started scheduler does nothing.
    pub async fn start<T: Ticker + 'static>(&self, mut ticker: T) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            warn!("Scheduler already started");
            return;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let runner = self.runner.clone();

        let task = tokio::spawn(async move {
            let mut tick_count = 0u64;
            let mut in_flight: Option<JoinHandle<()>> = None;
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    more = ticker.tick() => {
                        if !more {
                            break;
                        }
                        tick_count += 1;

                        let Some(guard) = runner.try_begin() else {
                            info!(tick = tick_count, "Score recomputation already running, skipping tick");
                            continue;
                        };

                        let runner = runner.clone();
                        let span = tracing::info_span!("score_pass", tick = tick_count);
                        in_flight = Some(tokio::spawn(
                            async move {
                                match runner.run(guard).await {
                                    Ok(updated) => info!(updated = updated.len(), "Score pass finished"),
                                    Err(e) => error!(error = %e, "Score pass failed"),
                                }
                            }
                            .instrument(span),
                        ));
                    }
                }
            }
            if let Some(pass) = in_flight {
                if let Err(e) = pass.await {
                    error!(error = %e, "Score pass panicked");
                }
            }
            info!(ticks = tick_count, "Scheduler loop stopped");
        });

        info!("Scheduler started");
        *handle = Some(LoopHandle { shutdown, task });
    }

    /// Stops the tick loop and waits for it to exit, including any pass the
    /// loop started that is still in flight.
    pub async fn stop(&self) {
        let Some(LoopHandle { shutdown, task }) = self.handle.lock().await.take() else {
            return;
        };
        let _ = shutdown.send(true);
        if let Err(e) = task.await {
            error!(error = %e, "Scheduler loop panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::models::{OperatingHours, Route, ScoreRecord, parse_hh_mm};
    use crate::store::{MemoryStore, RouteSource, ScoreStore};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Route source whose `list_active_routes` parks until released.
    struct GatedRoutes {
        inner: Arc<MemoryStore>,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl RouteSource for GatedRoutes {
        async fn get_route(&self, route_id: &str) -> Result<Route> {
            self.inner.get_route(route_id).await
        }

        async fn list_active_routes(&self) -> Result<Vec<Route>> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.list_active_routes().await
        }
    }

    /// Score store that counts writes.
    #[derive(Default)]
    struct CountingScores {
        inner: MemoryStore,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl ScoreStore for CountingScores {
        async fn upsert_score(&self, record: ScoreRecord) -> Result<ScoreRecord> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.upsert_score(record).await
        }

        async fn get_score(&self, route_id: &str) -> Result<Option<ScoreRecord>> {
            self.inner.get_score(route_id).await
        }

        async fn list_scores(&self) -> Result<Vec<ScoreRecord>> {
            self.inner.list_scores().await
        }
    }

    fn route(id: &str) -> Route {
        Route {
            id: id.to_string(),
            name: id.to_uppercase(),
            fare: 30.0,
            stops: vec![],
            operating_hours: OperatingHours {
                start: parse_hh_mm("06:00").unwrap(),
                end: parse_hh_mm("22:00").unwrap(),
            },
            is_active: true,
        }
    }

    async fn store_with_routes(ids: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for id in ids {
            store.insert_route(route(id)).await;
        }
        store
    }

    #[tokio::test]
    async fn test_run_pass_scores_every_active_route() {
        let store = store_with_routes(&["a", "b"]).await;
        let aggregator = ScoreAggregator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(SystemClock),
        );
        let scheduler = Scheduler::new(aggregator);

        let outcome = scheduler.run_pass().await.unwrap();
        assert_eq!(outcome, PassOutcome::Completed { updated: 2 });
        assert!(!scheduler.is_running());
        assert_eq!(store.list_scores().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_pass_is_skipped() {
        let store = store_with_routes(&["a", "b", "c"]).await;
        let gated = Arc::new(GatedRoutes {
            inner: store.clone(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let scores = Arc::new(CountingScores::default());
        let aggregator =
            ScoreAggregator::new(store.clone(), gated.clone(), scores.clone(), Arc::new(SystemClock));
        let scheduler = Arc::new(Scheduler::new(aggregator));

        let first = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_pass().await })
        };

        gated.entered.notified().await;
        assert!(scheduler.is_running());

        let second = scheduler.run_pass().await.unwrap();
        assert_eq!(second, PassOutcome::Skipped);
        assert_eq!(scores.writes.load(Ordering::SeqCst), 0);

        gated.release.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first, PassOutcome::Completed { updated: 3 });
        assert_eq!(scores.writes.load(Ordering::SeqCst), 3);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_flag_cleared_after_failed_pass() {
        struct FailingRoutes;

        #[async_trait]
        impl RouteSource for FailingRoutes {
            async fn get_route(&self, route_id: &str) -> Result<Route> {
                Err(crate::error::AnalyticsError::route_not_found(route_id))
            }

            async fn list_active_routes(&self) -> Result<Vec<Route>> {
                Err(anyhow::anyhow!("route listing unavailable").into())
            }
        }

        let store = Arc::new(MemoryStore::new());
        let aggregator = ScoreAggregator::new(
            store.clone(),
            Arc::new(FailingRoutes),
            store.clone(),
            Arc::new(SystemClock),
        );
        let scheduler = Scheduler::new(aggregator);

        assert!(scheduler.run_pass().await.is_err());
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_ticks_drive_passes_until_stopped() {
        let store = store_with_routes(&["a"]).await;
        let scores = Arc::new(CountingScores::default());
        let aggregator =
            ScoreAggregator::new(store.clone(), store.clone(), scores.clone(), Arc::new(SystemClock));
        let scheduler = Scheduler::new(aggregator);

        let (tx, ticker) = ManualTicker::channel();
        scheduler.start(ticker).await;

        tx.send(()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while scores.writes.load(Ordering::SeqCst) < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("first tick should trigger a pass");

        scheduler.stop().await;
        let writes_after_stop = scores.writes.load(Ordering::SeqCst);

        // the loop is gone, so further ticks cannot be delivered
        assert!(tx.send(()).await.is_err());
        assert_eq!(scores.writes.load(Ordering::SeqCst), writes_after_stop);
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_pass() {
        let store = store_with_routes(&["a", "b"]).await;
        let gated = Arc::new(GatedRoutes {
            inner: store.clone(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let scores = Arc::new(CountingScores::default());
        let aggregator =
            ScoreAggregator::new(store.clone(), gated.clone(), scores.clone(), Arc::new(SystemClock));
        let scheduler = Arc::new(Scheduler::new(aggregator));

        let (tx, ticker) = ManualTicker::channel();
        scheduler.start(ticker).await;
        tx.send(()).await.unwrap();
        gated.entered.notified().await;

        let stopping = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.stop().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!stopping.is_finished());
        assert_eq!(scores.writes.load(Ordering::SeqCst), 0);

        gated.release.notify_one();
        tokio::time::timeout(Duration::from_secs(5), stopping)
            .await
            .expect("stop should return once the pass ends")
            .unwrap();
        assert_eq!(scores.writes.load(Ordering::SeqCst), 2);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_manual_recompute_fails_while_pass_runs() {
        let store = store_with_routes(&["a"]).await;
        let gated = Arc::new(GatedRoutes {
            inner: store.clone(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let aggregator =
            ScoreAggregator::new(store.clone(), gated.clone(), store.clone(), Arc::new(SystemClock));
        let scheduler = Arc::new(Scheduler::new(aggregator));

        let first = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.recompute().await })
        };
        gated.entered.notified().await;

        let err = scheduler.recompute().await.unwrap_err();
        assert!(matches!(err, AnalyticsError::PassInProgress));

        gated.release.notify_one();
        assert_eq!(first.await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_interval_ticker_fires_immediately() {
        let mut ticker = IntervalTicker::new(Duration::from_secs(3600));
        let fired = tokio::time::timeout(Duration::from_secs(1), ticker.tick()).await;
        assert_eq!(fired.ok(), Some(true));
    }
}
