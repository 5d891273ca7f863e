use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use anyhow::anyhow;
use vlr_core::ClusterId;

use crate::traits::{is_due, PendingEntry, PendingSet};

/// In-memory pending set for tests and fixture scenarios. Not durable.
#[derive(Default)]
pub struct InMemoryPendingSet {
    inner: Mutex<BTreeMap<ClusterId, (SystemTime, u32)>>,
}

impl InMemoryPendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, BTreeMap<ClusterId, (SystemTime, u32)>>> {
        self.inner.lock().map_err(|_| anyhow!("pending set lock poisoned"))
    }
}

impl PendingSet for InMemoryPendingSet {
    fn mark_pending_at(&self, cluster_id: &ClusterId, at: SystemTime) -> anyhow::Result<()> {
        self.lock()?.insert(cluster_id.clone(), (at, 0));
        Ok(())
    }

    fn mark_not_found(&self, cluster_id: &ClusterId, attempts: u32, at: SystemTime) -> anyhow::Result<()> {
        self.lock()?.insert(cluster_id.clone(), (at, attempts));
        Ok(())
    }

    fn drain_due(&self, min_age: Duration, now: SystemTime) -> anyhow::Result<Vec<PendingEntry>> {
        let mut inner = self.lock()?;
        let due: Vec<ClusterId> = inner
            .iter()
            .filter(|(_, (at, _))| is_due(*at, min_age, now))
            .map(|(id, _)| id.clone())
            .collect();
        let mut drained = Vec::with_capacity(due.len());
        for cluster_id in due {
            if let Some((enqueued_at, not_found_attempts)) = inner.remove(&cluster_id) {
                drained.push(PendingEntry { cluster_id, enqueued_at, not_found_attempts });
            }
        }
        Ok(drained)
    }

    fn list(&self) -> anyhow::Result<Vec<PendingEntry>> {
        Ok(self
            .lock()?
            .iter()
            .map(|(id, (at, attempts))| PendingEntry {
                cluster_id: id.clone(),
                enqueued_at: *at,
                not_found_attempts: *attempts,
            })
            .collect())
    }
}
