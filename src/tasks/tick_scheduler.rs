//! Local tick scheduler
//!
//! Every instance runs one of these. While the shared timer is running it
//! owns a single 1 s interval and applies a tick on each firing; any bus
//! signal makes it re-read the store and start, keep, realign or cancel
//! that interval.

use std::{sync::Arc, time::Duration};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::state::{TickOutcome, TimerInstance, TimerRecord, TimerState};

/// Countdown resolution
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// The local interval and what this instance last knew about it.
#[derive(Debug, Default)]
pub struct TickScheduler {
    interval: Option<Interval>,
    /// Remaining seconds as of the last resync or own tick
    last_remaining: Option<u64>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_scheduled(&self) -> bool {
        self.interval.is_some()
    }

    /// Bring the local interval in line with a freshly read record.
    ///
    /// A running record whose remaining time differs from what this instance
    /// last saw was written by someone else; the interval is re-phased to
    /// fire one period after that write so the two don't both decrement.
    pub fn reconcile(&mut self, record: &TimerRecord) {
        match TimerState::of(record) {
            TimerState::Running { remaining, .. } => {
                match self.interval.as_mut() {
                    None => {
                        debug!("Timer running at {}s, scheduling local ticks", remaining);
                        self.interval = Some(new_interval());
                    }
                    Some(interval) if self.last_remaining != Some(remaining) => {
                        debug!("Timer moved to {}s elsewhere, realigning local ticks", remaining);
                        interval.reset();
                    }
                    Some(_) => {}
                }
                self.last_remaining = Some(remaining);
            }
            state => {
                if self.interval.is_some() {
                    debug!("Timer no longer running ({:?}), cancelling local ticks", state);
                }
                self.cancel();
            }
        }
    }

    /// Note the value this instance just wrote itself.
    pub fn record_own_tick(&mut self, remaining: u64) {
        self.last_remaining = Some(remaining);
    }

    pub fn cancel(&mut self) {
        self.interval = None;
        self.last_remaining = None;
    }

    /// Resolves at the next local firing; never while nothing is scheduled.
    pub async fn next_tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

fn new_interval() -> Interval {
    let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Background task driving one instance's countdown
pub async fn tick_scheduler_task(instance: Arc<TimerInstance>) {
    info!("Starting tick scheduler task");

    let mut signals = instance.bus().subscribe();
    let mut scheduler = TickScheduler::new();
    scheduler.reconcile(&instance.resync());

    loop {
        tokio::select! {
            // Pending signals are handled before a tick that is due at the
            // same time, so a pause elsewhere is never overwritten by it.
            biased;

            signal = signals.recv() => {
                if signal.is_none() {
                    info!("Change bus closed, stopping tick scheduler");
                    break;
                }
                let record = instance.resync();
                scheduler.reconcile(&record);
            }

            _ = scheduler.next_tick() => {
                match instance.tick() {
                    TickOutcome::Advanced { remaining } => {
                        debug!("Tick: {}s remaining", remaining);
                        scheduler.record_own_tick(remaining);
                    }
                    TickOutcome::Completed { total } => {
                        info!("Rest timer finished, rewound to {}s", total);
                        scheduler.cancel();
                    }
                    TickOutcome::Idle => {
                        debug!("Tick found nothing running, cancelling local ticks");
                        scheduler.cancel();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TimerPatch;

    fn running(remaining: u64) -> TimerRecord {
        TimerRecord::new().merged(&TimerPatch::armed_running(90, remaining))
    }

    #[tokio::test(start_paused = true)]
    async fn running_record_schedules_exactly_one_interval() {
        let mut scheduler = TickScheduler::new();
        scheduler.reconcile(&running(90));
        assert!(scheduler.is_scheduled());

        scheduler.reconcile(&running(90));
        let started = Instant::now();
        scheduler.next_tick().await;
        assert_eq!(started.elapsed(), TICK_PERIOD);
    }

    #[tokio::test(start_paused = true)]
    async fn non_running_record_cancels() {
        let mut scheduler = TickScheduler::new();
        scheduler.reconcile(&running(40));
        scheduler.reconcile(&TimerRecord::new().merged(&TimerPatch::armed_paused(90, 40)));
        assert!(!scheduler.is_scheduled());

        let fired = tokio::time::timeout(Duration::from_secs(5), scheduler.next_tick()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_progress_realigns_the_interval() {
        let mut scheduler = TickScheduler::new();
        scheduler.reconcile(&running(90));

        tokio::time::advance(Duration::from_millis(600)).await;
        scheduler.reconcile(&running(89));

        let realigned = Instant::now();
        scheduler.next_tick().await;
        assert_eq!(realigned.elapsed(), TICK_PERIOD);
    }

    #[tokio::test(start_paused = true)]
    async fn own_tick_does_not_realign() {
        let mut scheduler = TickScheduler::new();
        scheduler.reconcile(&running(90));
        let started = Instant::now();

        scheduler.next_tick().await;
        scheduler.record_own_tick(89);
        scheduler.reconcile(&running(89));

        scheduler.next_tick().await;
        assert_eq!(started.elapsed(), TICK_PERIOD * 2);
    }
}
