use std::time::{Duration, SystemTime};

use vlr_core::ClusterId;

/// Default minimum age before a pending cluster is re-checked.
pub const DEFAULT_MIN_AGE: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingEntry {
    pub cluster_id: ClusterId,
    pub enqueued_at: SystemTime,
    /// Re-checks already spent on a cluster the management service did not
    /// know. Zero for ordinary transient entries.
    pub not_found_attempts: u32,
}

/// Durable "re-check after a minimum delay" set of clusters.
///
/// At most one entry exists per cluster: marking again replaces the entry and
/// refreshes its enqueue time.
pub trait PendingSet: Send + Sync {
    fn mark_pending_at(&self, cluster_id: &ClusterId, at: SystemTime) -> anyhow::Result<()>;

    fn mark_pending(&self, cluster_id: &ClusterId) -> anyhow::Result<()> {
        self.mark_pending_at(cluster_id, SystemTime::now())
    }

    /// Enqueue a cluster that was unknown to the management service,
    /// remembering how many such re-checks it has had.
    fn mark_not_found(&self, cluster_id: &ClusterId, attempts: u32, at: SystemTime) -> anyhow::Result<()>;

    /// Remove and return every entry older than `min_age` at `now`. Each entry
    /// is removed from the backing store before it is returned. Younger
    /// entries stay put.
    fn drain_due(&self, min_age: Duration, now: SystemTime) -> anyhow::Result<Vec<PendingEntry>>;

    /// All entries ordered by cluster id, without removing anything.
    fn list(&self) -> anyhow::Result<Vec<PendingEntry>>;
}

/// Strictly older than `min_age`. Entries stamped in the future are never due.
pub fn is_due(enqueued_at: SystemTime, min_age: Duration, now: SystemTime) -> bool {
    match now.duration_since(enqueued_at) {
        Ok(age) => age > min_age,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn due_only_when_strictly_older() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        assert!(!is_due(t0, DEFAULT_MIN_AGE, t0));
        assert!(!is_due(t0, DEFAULT_MIN_AGE, t0 + DEFAULT_MIN_AGE));
        assert!(is_due(t0, DEFAULT_MIN_AGE, t0 + DEFAULT_MIN_AGE + Duration::from_secs(1)));
    }

    #[test]
    fn future_entries_are_not_due() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        assert!(!is_due(t0 + Duration::from_secs(3600), Duration::ZERO, t0));
    }
}
