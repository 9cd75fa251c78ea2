// =============================================================================
// Snapshot Cache — single-slot, atomically swapped
// =============================================================================
//
// The latest snapshot lives in a `watch` channel as `Option<Arc<_>>`.
// Publishing replaces the slot in one step; readers clone the `Arc` and never
// wait on a compute cycle.  The channel doubles as the feed for WebSocket
// subscribers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::info;

use crate::error::EngineError;
use crate::snapshot::IntelligenceSnapshot;
use crate::types::{LifecycleState, SnapshotQuality};

pub type SnapshotSlot = Option<Arc<IntelligenceSnapshot>>;

pub struct SnapshotCache {
    slot: watch::Sender<SnapshotSlot>,
    staleness: Duration,
    computing: AtomicBool,
}

impl SnapshotCache {
    pub fn new(staleness: Duration) -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            slot,
            staleness,
            computing: AtomicBool::new(false),
        }
    }

    /// Publish `snapshot`, superseding the previous one.  Its timestamp is
    /// bumped to strictly exceed the previous snapshot's if the clock has not
    /// advanced.
    pub fn publish(&self, snapshot: IntelligenceSnapshot) -> Arc<IntelligenceSnapshot> {
        let mut published = Arc::new(snapshot);
        self.slot.send_modify(|slot| {
            if let Some(prev) = slot.as_ref() {
                if published.timestamp <= prev.timestamp {
                    // Sole owner here, so this mutates in place.
                    Arc::make_mut(&mut published).timestamp =
                        prev.timestamp + chrono::Duration::milliseconds(1);
                }
            }
            *slot = Some(published.clone());
        });
        info!(
            cycle = %published.cycle_id,
            timestamp = %published.timestamp,
            quality = %published.quality,
            "snapshot published"
        );
        published
    }

    /// Published snapshot exactly as stored, ignoring staleness.
    pub fn latest(&self) -> SnapshotSlot {
        self.slot.borrow().clone()
    }

    /// Snapshot for readers.  Past the staleness threshold this is a copy
    /// flagged `Stale`; the stored snapshot is never modified.
    pub fn current(&self) -> SnapshotSlot {
        let snap = self.latest()?;
        if self.is_stale(&snap) {
            Some(Arc::new(snap.with_quality(SnapshotQuality::Stale)))
        } else {
            Some(snap)
        }
    }

    pub fn age(&self) -> Option<Duration> {
        let snap = self.latest()?;
        Some(snap.age(Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }

    fn is_stale(&self, snap: &IntelligenceSnapshot) -> bool {
        snap.age(Utc::now())
            .to_std()
            .map_or(false, |age| age > self.staleness)
    }

    /// Why the published snapshot should no longer be trusted, if it is
    /// past the staleness threshold.
    pub fn stale_error(&self) -> Option<EngineError> {
        let snap = self.latest()?;
        if !self.is_stale(&snap) {
            return None;
        }
        let age = snap.age(Utc::now()).to_std().unwrap_or(Duration::ZERO);
        Some(EngineError::StaleSnapshot {
            age_secs: age.as_secs(),
            threshold_secs: self.staleness.as_secs(),
        })
    }

    pub fn set_computing(&self, computing: bool) {
        self.computing.store(computing, Ordering::SeqCst);
    }

    pub fn state(&self) -> LifecycleState {
        if self.computing.load(Ordering::SeqCst) {
            return LifecycleState::Computing;
        }
        match self.latest() {
            None => LifecycleState::Pending,
            Some(snap) if self.is_stale(&snap) => LifecycleState::Stale,
            Some(_) => LifecycleState::Ready,
        }
    }

    /// Receiver that wakes on every publication.
    pub fn subscribe(&self) -> watch::Receiver<SnapshotSlot> {
        self.slot.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assembler::tests::snapshot_at;

    #[test]
    fn starts_pending_and_empty() {
        let cache = SnapshotCache::new(Duration::from_secs(120));
        assert_eq!(cache.state(), LifecycleState::Pending);
        assert!(cache.current().is_none());
        assert!(cache.age().is_none());
    }

    #[test]
    fn computing_flag_shows_in_state() {
        let cache = SnapshotCache::new(Duration::from_secs(120));
        cache.set_computing(true);
        assert_eq!(cache.state(), LifecycleState::Computing);
        cache.set_computing(false);
        assert_eq!(cache.state(), LifecycleState::Pending);
    }

    #[test]
    fn repeated_reads_return_the_same_snapshot() {
        let cache = SnapshotCache::new(Duration::from_secs(120));
        cache.publish(snapshot_at(Utc::now()));
        let a = cache.current().unwrap();
        let b = cache.current().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.timestamp, b.timestamp);
        assert_eq!(cache.state(), LifecycleState::Ready);
    }

    #[test]
    fn timestamps_strictly_increase_even_if_clock_stalls() {
        let cache = SnapshotCache::new(Duration::from_secs(120));
        let now = Utc::now();
        let first = cache.publish(snapshot_at(now));
        let second = cache.publish(snapshot_at(now));
        let third = cache.publish(snapshot_at(now - chrono::Duration::seconds(5)));
        assert!(second.timestamp > first.timestamp);
        assert!(third.timestamp > second.timestamp);
    }

    #[test]
    fn stale_read_is_a_flagged_copy() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        let old = Utc::now() - chrono::Duration::seconds(300);
        cache.publish(snapshot_at(old));

        let read = cache.current().unwrap();
        assert_eq!(read.quality, SnapshotQuality::Stale);
        assert_eq!(cache.state(), LifecycleState::Stale);

        let stored = cache.latest().unwrap();
        assert_ne!(stored.quality, SnapshotQuality::Stale);
        assert_eq!(stored.cycle_id, read.cycle_id);
    }

    #[test]
    fn stale_error_reports_age_against_threshold() {
        let cache = SnapshotCache::new(Duration::from_secs(60));
        assert!(cache.stale_error().is_none());

        cache.publish(snapshot_at(Utc::now()));
        assert!(cache.stale_error().is_none());

        let cache = SnapshotCache::new(Duration::from_secs(60));
        cache.publish(snapshot_at(Utc::now() - chrono::Duration::seconds(300)));
        match cache.stale_error() {
            Some(EngineError::StaleSnapshot {
                age_secs,
                threshold_secs,
            }) => {
                assert!(age_secs >= 300);
                assert_eq!(threshold_secs, 60);
            }
            other => panic!("expected stale snapshot error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn subscribers_see_each_publication() {
        let cache = SnapshotCache::new(Duration::from_secs(120));
        let mut rx = cache.subscribe();
        let published = cache.publish(snapshot_at(Utc::now()));
        rx.changed().await.unwrap();
        let seen = rx.borrow_and_update().clone().unwrap();
        assert!(Arc::ptr_eq(&seen, &published));
    }
}
