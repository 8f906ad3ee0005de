//! Periodic resync background task

use std::{sync::Arc, time::Duration};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::state::TimerInstance;

/// Background task that pokes the instance's own bus on a fixed period, so a
/// change whose notification never arrived is still picked up.
pub async fn periodic_resync_task(instance: Arc<TimerInstance>, period: Duration) {
    info!("Starting periodic resync task every {:?}", period);

    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; the scheduler already read the
    // store on startup.
    interval.tick().await;

    loop {
        interval.tick().await;
        debug!("Periodic resync");
        instance.bus().publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryBackend, TimerStore};

    #[tokio::test(start_paused = true)]
    async fn pokes_the_bus_each_period() {
        let instance = Arc::new(TimerInstance::new(TimerStore::new(Arc::new(
            MemoryBackend::new().open(),
        ))));
        let mut sub = instance.bus().subscribe();

        let task = tokio::spawn(periodic_resync_task(Arc::clone(&instance), Duration::from_secs(5)));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!sub.try_drain());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(sub.try_drain());

        task.abort();
    }
}
