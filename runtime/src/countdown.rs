//! Remaining time until the next status.
//!
//! A [`Countdown`] is anchored at the history entry of the current status and
//! computed once per status change. Ticking it forward is local arithmetic;
//! the travel-time source is never queried per tick.

use crate::timing::DwellPlanner;
use chrono::{DateTime, Utc};
use order_lifecycle_core::environment::Clock;
use order_lifecycle_core::{Order, OrderStatus};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Human-readable form of a wait, rounded up to whole minutes.
#[must_use]
pub fn describe(duration: Duration) -> String {
    match duration.as_secs().div_ceil(60) {
        0 => "Less than a minute".to_string(),
        1 => "About 1 minute".to_string(),
        minutes => format!("About {minutes} minutes"),
    }
}

/// Minutes and seconds left, shown as `mm:ss`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining {
    /// Whole minutes
    pub minutes: u64,
    /// Seconds past the whole minutes
    pub seconds: u64,
}

impl Remaining {
    /// Total seconds left.
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.minutes * 60 + self.seconds
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes, self.seconds)
    }
}

/// Countdown for one status of one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    status: OrderStatus,
    started_at: DateTime<Utc>,
    total: Duration,
}

impl Countdown {
    /// Countdown of `total` starting at `started_at`.
    #[must_use]
    pub const fn new(status: OrderStatus, started_at: DateTime<Utc>, total: Duration) -> Self {
        Self {
            status,
            started_at,
            total,
        }
    }

    /// Status being counted down.
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    /// Full length of the countdown.
    #[must_use]
    pub const fn total(&self) -> Duration {
        self.total
    }

    /// Time left at `now`, `None` once it reached zero.
    ///
    /// A `now` before the start counts as no time elapsed.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Remaining> {
        let elapsed = (now - self.started_at).to_std().unwrap_or(Duration::ZERO);
        let secs = self.total.saturating_sub(elapsed).as_secs();
        (secs > 0).then_some(Remaining {
            minutes: secs / 60,
            seconds: secs % 60,
        })
    }
}

/// Derives countdowns and estimate strings for the tracking view.
#[derive(Clone)]
pub struct EstimateProjector {
    planner: DwellPlanner,
    clock: Arc<dyn Clock>,
}

impl EstimateProjector {
    /// Create a projector.
    #[must_use]
    pub fn new(planner: DwellPlanner, clock: Arc<dyn Clock>) -> Self {
        Self { planner, clock }
    }

    /// Dwell of the order's current status, `None` when terminal.
    pub async fn next_status_duration(&self, order: &Order) -> Option<Duration> {
        self.planner.dwell(order.status, order).await
    }

    /// Human-readable time until the status after `status`, `None` when terminal.
    pub async fn time_estimate(&self, status: OrderStatus, order: &Order) -> Option<String> {
        self.planner.dwell(status, order).await.map(describe)
    }

    /// Countdown for the order's current status.
    ///
    /// `None` for terminal orders.
    pub async fn countdown(&self, order: &Order) -> Option<Countdown> {
        if order.is_terminal() {
            return None;
        }
        let entry = order.current_entry()?;
        let total = self.next_status_duration(order).await?;
        Some(Countdown::new(order.status, entry.timestamp, total))
    }

    /// Start a once-per-second ticker for the order's current status.
    ///
    /// The ticker stops at zero, and when dropped.
    pub async fn start_ticker(&self, order: &Order) -> CountdownTicker {
        let Some(countdown) = self.countdown(order).await else {
            let (_, receiver) = watch::channel(None);
            return CountdownTicker {
                countdown: None,
                receiver,
                task: None,
            };
        };

        let (sender, receiver) = watch::channel(countdown.remaining(self.clock.now()));
        let clock = Arc::clone(&self.clock);
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let remaining = countdown.remaining(clock.now());
                if sender.send(remaining).is_err() || remaining.is_none() {
                    break;
                }
            }
        });

        CountdownTicker {
            countdown: Some(countdown),
            receiver,
            task: Some(task),
        }
    }
}

impl fmt::Debug for EstimateProjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstimateProjector")
            .field("planner", &self.planner)
            .finish_non_exhaustive()
    }
}

/// Live countdown for one status. Dropping it stops the tick task.
#[derive(Debug)]
pub struct CountdownTicker {
    countdown: Option<Countdown>,
    receiver: watch::Receiver<Option<Remaining>>,
    task: Option<JoinHandle<()>>,
}

impl CountdownTicker {
    /// The countdown being ticked, `None` for terminal orders.
    #[must_use]
    pub const fn countdown(&self) -> Option<&Countdown> {
        self.countdown.as_ref()
    }

    /// Latest remaining time.
    #[must_use]
    pub fn current(&self) -> Option<Remaining> {
        *self.receiver.borrow()
    }

    /// A receiver of every tick.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Remaining>> {
        self.receiver.clone()
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
