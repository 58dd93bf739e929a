//! Time sources for a workout session.
//!
//! Elapsed session time is counted in ticks rather than read from the wall
//! clock, so tests can drive a session deterministically. Wall-clock time is
//! only used to stamp completed sets and the start of accrual periods.

use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Wall-clock source.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, seconds: i64) {
        if let Ok(mut now) = self.now.lock() {
            *now += Duration::seconds(seconds);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Elapsed-time accounting for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionClock {
    elapsed_seconds: u64,
    running_since: Option<DateTime<Utc>>,
}

impl SessionClock {
    /// Create a stopped clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin (or resume) accrual.
    pub fn run(&mut self, now: DateTime<Utc>) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    /// Stop accrual.
    pub fn halt(&mut self) {
        self.running_since = None;
    }

    /// Count one second if running.
    pub fn tick(&mut self) -> bool {
        if self.is_running() {
            self.elapsed_seconds += 1;
            true
        } else {
            false
        }
    }

    /// Seconds accrued so far.
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    /// Start of the current accrual period.
    pub fn running_since(&self) -> Option<DateTime<Utc>> {
        self.running_since
    }

    /// Whether ticks currently accrue.
    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }
}

/// Periodic source of one-second tick events.
pub trait Ticker: Send {
    /// Wait for the next tick.
    fn tick(&mut self) -> impl Future<Output = ()> + Send;

    /// Restart the period from now.
    fn reset(&mut self);
}

/// Ticker backed by a tokio interval.
///
/// Must be created inside a tokio runtime.
#[derive(Debug)]
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    /// Create a ticker firing every `period`; the first tick comes one period from now.
    pub fn new(period: std::time::Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }

    fn reset(&mut self) {
        self.interval.reset();
    }
}

/// Ticker fired by hand through a [`ManualTickSource`].
#[derive(Debug)]
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Sending half of a [`ManualTicker`].
#[derive(Debug, Clone)]
pub struct ManualTickSource {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTicker {
    /// Create a ticker and the handle that fires it.
    pub fn new() -> (Self, ManualTickSource) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ManualTickSource { tx })
    }
}

impl ManualTickSource {
    /// Fire `count` ticks. Returns false if the ticker is gone.
    pub fn fire(&self, count: usize) -> bool {
        (0..count).all(|_| self.tx.send(()).is_ok())
    }
}

impl Ticker for ManualTicker {
    async fn tick(&mut self) {
        if self.rx.recv().await.is_none() {
            // Source dropped: never tick again
            std::future::pending::<()>().await;
        }
    }

    /// Drop ticks fired while nothing was counting.
    fn reset(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }
}
