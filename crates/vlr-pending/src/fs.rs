use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::{debug, warn};
use uuid::Uuid;
use vlr_core::ClusterId;

use crate::traits::{is_due, PendingEntry, PendingSet};

/// Pending set backed by a directory of marker files.
///
/// One file per cluster, named by the cluster id; its mtime is the enqueue
/// time. Ordinary markers are empty. A not-found marker holds its attempt
/// count as decimal text. Dot-files are scratch space and never markers.
#[derive(Clone, Debug)]
pub struct FsPendingSet {
    dir: PathBuf,
}

impl FsPendingSet {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("create pending dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn marker_path(&self, cluster_id: &ClusterId) -> PathBuf {
        self.dir.join(cluster_id.as_str())
    }

    /// Write to a scratch file, stamp it, then rename over the marker so a
    /// reader never sees a half-written body.
    fn write_marker(&self, cluster_id: &ClusterId, body: &[u8], at: SystemTime) -> Result<()> {
        let tmp = self.dir.join(format!(".{}.{}.tmp", cluster_id.as_str(), Uuid::new_v4()));
        {
            let mut f = File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
            f.write_all(body)?;
            f.set_modified(at).with_context(|| format!("set mtime on {}", tmp.display()))?;
            f.sync_all()?;
        }
        let path = self.marker_path(cluster_id);
        fs::rename(&tmp, &path).with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
        Ok(())
    }

    /// Markers sorted by cluster id. Entries that cannot be inspected are
    /// skipped with a warning; only an unreadable directory is an error.
    fn scan(&self) -> Result<Vec<(ClusterId, PathBuf, SystemTime)>> {
        let mut markers = Vec::new();
        let entries = fs::read_dir(&self.dir).with_context(|| format!("read pending dir {}", self.dir.display()))?;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(dir = %self.dir.display(), %err, "skipping unreadable pending dir entry");
                    continue;
                }
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!(path = %entry.path().display(), "skipping non-utf8 pending marker");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let modified = match entry.metadata().and_then(|meta| {
                if meta.is_file() {
                    meta.modified().map(Some)
                } else {
                    Ok(None)
                }
            }) {
                Ok(Some(modified)) => modified,
                Ok(None) => continue,
                Err(err) => {
                    warn!(path = %entry.path().display(), %err, "skipping pending marker without usable mtime");
                    continue;
                }
            };
            let cluster_id = match ClusterId::parse(name) {
                Ok(id) => id,
                Err(err) => {
                    warn!(%err, "skipping unrecognised pending marker");
                    continue;
                }
            };
            markers.push((cluster_id, entry.path(), modified));
        }
        markers.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(markers)
    }
}

/// Not-found attempt count stored in a marker. Unreadable or garbled bodies
/// count as 0 so one bad marker cannot block the rest of the set.
fn read_attempts(path: &Path) -> u32 {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(path = %path.display(), %err, "unreadable pending marker body; treating as 0");
            return 0;
        }
    };
    let body = String::from_utf8_lossy(&bytes);
    let body = body.trim();
    if body.is_empty() {
        return 0;
    }
    body.parse().unwrap_or_else(|_| {
        warn!(path = %path.display(), "pending marker body is not a count; treating as 0");
        0
    })
}

impl PendingSet for FsPendingSet {
    fn mark_pending_at(&self, cluster_id: &ClusterId, at: SystemTime) -> Result<()> {
        self.write_marker(cluster_id, b"", at)
    }

    fn mark_not_found(&self, cluster_id: &ClusterId, attempts: u32, at: SystemTime) -> Result<()> {
        self.write_marker(cluster_id, attempts.to_string().as_bytes(), at)
    }

    fn drain_due(&self, min_age: Duration, now: SystemTime) -> Result<Vec<PendingEntry>> {
        let mut drained = Vec::new();
        for (cluster_id, path, enqueued_at) in self.scan()? {
            if !is_due(enqueued_at, min_age, now) {
                continue;
            }
            let not_found_attempts = read_attempts(&path);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(cluster_id = %cluster_id, "pending marker vanished during drain");
                    continue;
                }
                Err(e) => {
                    warn!(cluster_id = %cluster_id, path = %path.display(), error = %e, "could not remove pending marker; leaving it for a later run");
                    continue;
                }
            }
            drained.push(PendingEntry { cluster_id, enqueued_at, not_found_attempts });
        }
        Ok(drained)
    }

    fn list(&self) -> Result<Vec<PendingEntry>> {
        Ok(self
            .scan()?
            .into_iter()
            .map(|(cluster_id, path, enqueued_at)| PendingEntry {
                not_found_attempts: read_attempts(&path),
                cluster_id,
                enqueued_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_MIN_AGE;
    use tempfile::tempdir;

    fn id(s: &str) -> ClusterId {
        ClusterId::parse(s).unwrap()
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempdir().unwrap();
        let set = FsPendingSet::open(dir.path().join("a").join("pending")).unwrap();
        assert!(set.dir().is_dir());
    }

    #[test]
    fn marker_is_zero_byte_file_named_by_cluster() {
        let dir = tempdir().unwrap();
        let set = FsPendingSet::open(dir.path()).unwrap();
        set.mark_pending(&id("c2")).unwrap();
        let marker = dir.path().join("c2");
        assert!(marker.is_file());
        assert_eq!(fs::metadata(&marker).unwrap().len(), 0);
    }

    #[test]
    fn fresh_marker_is_not_due() {
        let dir = tempdir().unwrap();
        let set = FsPendingSet::open(dir.path()).unwrap();
        set.mark_pending(&id("c1")).unwrap();
        assert!(set.drain_due(DEFAULT_MIN_AGE, SystemTime::now()).unwrap().is_empty());
        assert_eq!(set.list().unwrap().len(), 1);
    }

    #[test]
    fn old_marker_drains_exactly_once() {
        let dir = tempdir().unwrap();
        let set = FsPendingSet::open(dir.path()).unwrap();
        let t0 = SystemTime::now() - Duration::from_secs(3600);
        set.mark_pending_at(&id("c1"), t0).unwrap();
        set.mark_pending(&id("young")).unwrap();

        let drained = set.drain_due(DEFAULT_MIN_AGE, SystemTime::now()).unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].cluster_id, id("c1"));
        assert_eq!(drained[0].not_found_attempts, 0);
        assert!(!dir.path().join("c1").exists());
        assert!(dir.path().join("young").exists());

        assert!(set.drain_due(DEFAULT_MIN_AGE, SystemTime::now()).unwrap().is_empty());
    }

    #[test]
    fn remark_refreshes_timestamp() {
        let dir = tempdir().unwrap();
        let set = FsPendingSet::open(dir.path()).unwrap();
        let old = SystemTime::now() - Duration::from_secs(3600);
        set.mark_pending_at(&id("c1"), old).unwrap();
        set.mark_pending(&id("c1")).unwrap();
        assert!(set.drain_due(DEFAULT_MIN_AGE, SystemTime::now()).unwrap().is_empty());
        assert_eq!(set.list().unwrap().len(), 1);
    }

    #[test]
    fn not_found_attempts_survive_on_disk() {
        let dir = tempdir().unwrap();
        let set = FsPendingSet::open(dir.path()).unwrap();
        let old = SystemTime::now() - Duration::from_secs(3600);
        set.mark_not_found(&id("ghost"), 4, old).unwrap();

        let reopened = FsPendingSet::open(dir.path()).unwrap();
        let drained = reopened.drain_due(DEFAULT_MIN_AGE, SystemTime::now()).unwrap();
        assert_eq!(drained[0].not_found_attempts, 4);
    }

    #[test]
    fn ignores_scratch_files_and_directories() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".c1.tmp"), b"").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        let set = FsPendingSet::open(dir.path()).unwrap();
        let far_future = SystemTime::now() + Duration::from_secs(86_400);
        assert!(set.drain_due(Duration::ZERO, far_future).unwrap().is_empty());
        assert!(dir.path().join(".c1.tmp").exists());
    }

    #[test]
    fn garbage_body_counts_as_zero() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("c7"), b"not-a-number").unwrap();
        let set = FsPendingSet::open(dir.path()).unwrap();
        assert_eq!(set.list().unwrap()[0].not_found_attempts, 0);
    }

    #[test]
    fn unreadable_body_does_not_block_other_markers() {
        let dir = tempdir().unwrap();
        let set = FsPendingSet::open(dir.path()).unwrap();
        let old = SystemTime::now() - Duration::from_secs(3600);
        set.mark_pending_at(&id("a1"), old).unwrap();
        set.mark_pending_at(&id("b2"), old).unwrap();
        fs::write(dir.path().join("b2"), b"\xff\xfe").unwrap();
        fs::File::options().write(true).open(dir.path().join("b2")).unwrap().set_modified(old).unwrap();

        let drained = set.drain_due(DEFAULT_MIN_AGE, SystemTime::now()).unwrap();
        let ids: Vec<_> = drained.iter().map(|e| e.cluster_id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b2"]);
        assert_eq!(drained[1].not_found_attempts, 0);
        assert!(!dir.path().join("a1").exists());
        assert!(!dir.path().join("b2").exists());
        assert!(set.drain_due(DEFAULT_MIN_AGE, SystemTime::now()).unwrap().is_empty());
    }

    #[test]
    fn dot_prefixed_names_are_never_cluster_markers() {
        assert!(ClusterId::parse(".c9").is_err());
        let dir = tempdir().unwrap();
        let set = FsPendingSet::open(dir.path()).unwrap();
        set.mark_pending_at(&id("c9"), SystemTime::now() - Duration::from_secs(3600)).unwrap();
        assert_eq!(set.list().unwrap()[0].cluster_id, id("c9"));
    }
}
