use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use crate::services::center::NotificationCenter;
use crate::NotificationSet;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Owns the interval task of one dashboard. Dropping the handle stops it.
pub struct PollerHandle {
    task: JoinHandle<()>,
    receiver: watch::Receiver<NotificationSet>,
}

impl PollerHandle {
    pub fn subscribe(&self) -> watch::Receiver<NotificationSet> {
        self.receiver.clone()
    }

    pub fn latest(&self) -> NotificationSet {
        self.receiver.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Refreshes `center` immediately and then every `every`. Ticks are
/// independent; a slow tick delays the next one instead of bunching up.
pub fn spawn_poller(center: Arc<NotificationCenter>, every: Duration) -> PollerHandle {
    let receiver = center.subscribe();
    info!("Starting notification poller for {} every {:?}", center.viewer(), every);

    let task = tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_seen = 0;
        loop {
            ticker.tick().await;
            let set = center.refresh().await;

            if set.len() != last_seen {
                info!(
                    "{} now has {} new request(s) and {} appointment(s) today",
                    center.viewer(),
                    set.new_requests.len(),
                    set.today.len()
                );
                last_seen = set.len();
            } else {
                debug!("Poll tick for {}: unchanged", center.viewer());
            }
        }
    });

    PollerHandle { task, receiver }
}
