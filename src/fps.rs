use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Frame rate measured over one sample period
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameRate {
    /// Frames since the previous report divided by the time since it
    pub instant: u32,
    /// Frames since observation started divided by the time since then
    pub average: f32,
}

/// Frame counters for one observation
#[derive(Debug, Clone)]
struct RateWindow {
    started_at: Instant,
    last_tick: Instant,
    since_tick: u64,
    total: u64,
}

impl RateWindow {
    fn new(now: Instant) -> Self {
        Self {
            started_at: now,
            last_tick: now,
            since_tick: 0,
            total: 0,
        }
    }

    fn mark(&mut self) {
        self.since_tick += 1;
        self.total += 1;
    }

    fn sample(&mut self, now: Instant) -> FrameRate {
        let tick_secs = now.saturating_duration_since(self.last_tick).as_secs_f64();
        let total_secs = now.saturating_duration_since(self.started_at).as_secs_f64();

        let instant = if tick_secs > 0.0 {
            (self.since_tick as f64 / tick_secs).round() as u32
        } else {
            0
        };
        let average = if total_secs > 0.0 {
            (self.total as f64 / total_secs) as f32
        } else {
            0.0
        };

        self.since_tick = 0;
        self.last_tick = now;
        FrameRate { instant, average }
    }
}

type RateReport = Arc<dyn Fn(FrameRate) + Send + Sync>;

/// Periodic frame-rate sampler.
///
/// [`FrameRateObserver::start`] resets the counters and spawns a ticker on the
/// runtime; every period the ticker hands a [`FrameRate`] to the report
/// callback. [`FrameRateObserver::mark`] is called once per delivered frame.
pub struct FrameRateObserver {
    period: Duration,
    runtime: Handle,
    window: Arc<Mutex<Option<RateWindow>>>,
    ticker: Mutex<Option<CancellationToken>>,
}

impl FrameRateObserver {
    pub fn new(period: Duration, runtime: Handle) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            runtime,
            window: Arc::new(Mutex::new(None)),
            ticker: Mutex::new(None),
        }
    }

    /// Begin a new observation, replacing any running one
    pub fn start<F>(&self, report: F)
    where
        F: Fn(FrameRate) + Send + Sync + 'static,
    {
        let now = Instant::now();
        self.begin(now);

        let cancel = CancellationToken::new();
        if let Some(previous) = self.ticker.lock().replace(cancel.clone()) {
            previous.cancel();
        }

        let report: RateReport = Arc::new(report);
        let window = Arc::clone(&self.window);
        let period = self.period;
        self.runtime.spawn(async move {
            let mut ticks = interval_at(tokio::time::Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticks.tick() => {
                        let rate = window.lock().as_mut().map(|w| w.sample(Instant::now()));
                        if let Some(rate) = rate {
                            trace!("Frame rate sample: {:?}", rate);
                            report(rate);
                        }
                    }
                }
            }
            debug!("Frame rate ticker stopped");
        });
        debug!("Frame rate observer started ({:?} period)", period);
    }

    /// End the observation and stop the ticker
    pub fn stop(&self) {
        if let Some(cancel) = self.ticker.lock().take() {
            cancel.cancel();
            debug!("Frame rate observer stopped");
        }
        *self.window.lock() = None;
    }

    pub fn is_observing(&self) -> bool {
        self.window.lock().is_some()
    }

    /// Count one delivered frame. Ignored while not observing.
    pub fn mark(&self) {
        if let Some(window) = self.window.lock().as_mut() {
            window.mark();
        }
    }

    fn begin(&self, now: Instant) {
        *self.window.lock() = Some(RateWindow::new(now));
    }

    #[cfg(test)]
    fn sample_at(&self, now: Instant) -> Option<FrameRate> {
        self.window.lock().as_mut().map(|window| window.sample(now))
    }
}

impl Drop for FrameRateObserver {
    fn drop(&mut self) {
        if let Some(cancel) = self.ticker.get_mut().take() {
            cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[test]
    fn test_window_rates() {
        let start = Instant::now();
        let mut window = RateWindow::new(start);
        for _ in 0..30 {
            window.mark();
        }

        let rate = window.sample(start + Duration::from_secs(1));
        assert_eq!(rate.instant, 30);
        assert!((rate.average - 30.0).abs() < 0.01);

        for _ in 0..10 {
            window.mark();
        }
        let rate = window.sample(start + Duration::from_secs(2));
        assert_eq!(rate.instant, 10);
        assert!((rate.average - 20.0).abs() < 0.01);
    }

    #[test]
    fn test_instant_rate_rounds() {
        let start = Instant::now();
        let mut window = RateWindow::new(start);
        for _ in 0..29 {
            window.mark();
        }
        // 29 frames over 0.95s is just over 30.5 fps
        let rate = window.sample(start + Duration::from_millis(950));
        assert_eq!(rate.instant, 31);
    }

    #[test]
    fn test_zero_elapsed_reports_zero() {
        let start = Instant::now();
        let mut window = RateWindow::new(start);
        window.mark();
        let rate = window.sample(start);
        assert_eq!(rate.instant, 0);
        assert_eq!(rate.average, 0.0);
    }

    #[tokio::test]
    async fn test_marks_ignored_while_stopped() {
        let observer = FrameRateObserver::new(Duration::from_secs(1), Handle::current());
        observer.mark();
        assert!(!observer.is_observing());
        assert!(observer.sample_at(Instant::now()).is_none());

        let start = Instant::now();
        observer.begin(start);
        observer.mark();
        observer.mark();
        let rate = observer.sample_at(start + Duration::from_secs(1)).unwrap();
        assert_eq!(rate.instant, 2);
    }

    #[tokio::test]
    async fn test_ticker_reports_and_stops() {
        let observer = FrameRateObserver::new(Duration::from_millis(20), Handle::current());
        let (tx, mut rx) = mpsc::unbounded_channel();
        observer.start(move |rate| {
            let _ = tx.send(rate);
        });
        assert!(observer.is_observing());
        for _ in 0..5 {
            observer.mark();
        }

        let rate = timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(rate.instant > 0);

        observer.stop();
        assert!(!observer.is_observing());
        // Drain anything reported before the stop, then expect silence
        tokio::time::sleep(Duration::from_millis(30)).await;
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(rx.try_recv().is_err());
    }
}
