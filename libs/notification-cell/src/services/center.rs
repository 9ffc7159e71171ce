use std::sync::Arc;

use chrono::FixedOffset;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use appointment_cell::services::Clock;

use crate::services::{feed::AppointmentFeed, projection::project, read_state::ReadStateTracker};
use crate::{NotificationError, NotificationKey, NotificationKind, NotificationSet, Viewer};

/// Notification state of one dashboard. Every refresh recomputes the whole
/// set from the feed and the read-state; the latest set is published on a
/// watch channel so subscribers never see a partial or stale merge.
pub struct NotificationCenter {
    viewer: Viewer,
    feed: Arc<dyn AppointmentFeed>,
    tracker: ReadStateTracker,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
    state: Mutex<NotificationSet>,
    publisher: watch::Sender<NotificationSet>,
}

impl NotificationCenter {
    pub fn new(
        viewer: Viewer,
        feed: Arc<dyn AppointmentFeed>,
        tracker: ReadStateTracker,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
    ) -> Self {
        let (publisher, _) = watch::channel(NotificationSet::default());
        Self {
            viewer,
            feed,
            tracker,
            clock,
            offset,
            state: Mutex::new(NotificationSet::default()),
            publisher,
        }
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn tracker(&self) -> &ReadStateTracker {
        &self.tracker
    }

    pub fn subscribe(&self) -> watch::Receiver<NotificationSet> {
        self.publisher.subscribe()
    }

    pub async fn current(&self) -> NotificationSet {
        self.state.lock().await.clone()
    }

    /// Fetches and recomputes, surfacing failures to the caller.
    pub async fn try_refresh(&self) -> Result<NotificationSet, NotificationError> {
        // Acknowledgements wait for an in-flight recomputation.
        let mut state = self.state.lock().await;

        let appointments = self.feed.fetch(&self.viewer).await?;
        let read = self.tracker.snapshot().await?;
        let set = project(&appointments, &read, self.clock.now(), self.offset);

        *state = set.clone();
        self.publisher.send_replace(set.clone());

        debug!(
            "{}: {} new request(s), {} today",
            self.viewer,
            set.new_requests.len(),
            set.today.len()
        );
        Ok(set)
    }

    /// One poll tick. A failed fetch keeps the previous set; the next tick
    /// tries again.
    #[instrument(skip(self), fields(viewer = %self.viewer))]
    pub async fn refresh(&self) -> NotificationSet {
        match self.try_refresh().await {
            Ok(set) => set,
            Err(e) => {
                warn!("Notification refresh failed, keeping previous state: {}", e);
                self.current().await
            }
        }
    }

    pub async fn mark_as_read(&self, appointment_id: Uuid, kind: NotificationKind) -> Result<(), NotificationError> {
        let key = NotificationKey::new(appointment_id, kind);
        let mut state = self.state.lock().await;
        self.tracker.add(key).await?;

        if state.remove(&key) {
            self.publisher.send_replace(state.clone());
        }
        debug!("{} acknowledged {}", self.viewer, key);
        Ok(())
    }

    /// Acknowledges everything currently visible in one write. Returns how
    /// many entries were cleared.
    pub async fn mark_all_as_read(&self) -> Result<usize, NotificationError> {
        let mut state = self.state.lock().await;
        let keys = state.keys();
        if keys.is_empty() {
            return Ok(0);
        }

        self.tracker.add_all(keys.iter().copied()).await?;
        *state = NotificationSet::default();
        self.publisher.send_replace(NotificationSet::default());

        info!("{} marked {} notification(s) read", self.viewer, keys.len());
        Ok(keys.len())
    }

    /// Logout: forget acknowledgements and drop the visible set.
    pub async fn clear(&self) -> Result<(), NotificationError> {
        let mut state = self.state.lock().await;
        self.tracker.clear().await?;
        *state = NotificationSet::default();
        self.publisher.send_replace(NotificationSet::default());
        Ok(())
    }
}
