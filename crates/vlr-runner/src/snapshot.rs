use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, warn};
use uuid::Uuid;
use vlr_core::ListingSnapshot;

/// The pair of listing files a run reads and rotates.
#[derive(Clone, Debug)]
pub struct SnapshotStore {
    pub previous: PathBuf,
    pub current: PathBuf,
}

impl SnapshotStore {
    pub fn new(previous: impl Into<PathBuf>, current: impl Into<PathBuf>) -> Self {
        Self { previous: previous.into(), current: current.into() }
    }

    /// Move current over previous when current holds at least one key.
    /// An absent, empty or unreadable current leaves previous untouched.
    pub fn rotate(&self) -> Result<bool> {
        let Some(current) = read_snapshot(&self.current) else {
            return Ok(false);
        };
        if current.is_empty() {
            debug!(path = %self.current.display(), "current listing empty; keeping previous");
            return Ok(false);
        }
        ensure_parent(&self.previous)?;
        fs::rename(&self.current, &self.previous).with_context(|| {
            format!("rotate {} -> {}", self.current.display(), self.previous.display())
        })?;
        Ok(true)
    }

    /// Missing or malformed previous listings count as empty.
    pub fn load_previous(&self) -> ListingSnapshot {
        if !self.previous.exists() {
            warn!(path = %self.previous.display(), "previous listing missing; treating as empty");
            return ListingSnapshot::new();
        }
        read_snapshot(&self.previous).unwrap_or_default()
    }

    /// The current listing is always written by this run, so its absence is
    /// an error rather than an empty listing.
    pub fn load_current(&self) -> Result<ListingSnapshot> {
        let bytes = fs::read(&self.current).with_context(|| format!("read {}", self.current.display()))?;
        ListingSnapshot::from_json_slice(&bytes).with_context(|| format!("decode {}", self.current.display()))
    }

    pub fn save_current(&self, snapshot: &ListingSnapshot) -> Result<()> {
        let bytes = snapshot.to_json_vec_pretty().context("encode listing")?;
        write_atomic(&self.current, &bytes)
    }

    pub fn ensure_previous_exists(&self) -> Result<()> {
        if self.previous.exists() {
            return Ok(());
        }
        write_atomic(&self.previous, b"{}\n")
    }
}

fn read_snapshot(path: &Path) -> Option<ListingSnapshot> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable listing; treating as empty");
            return None;
        }
    };
    match ListingSnapshot::from_json_slice(&bytes) {
        Ok(snap) => Some(snap),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed listing; treating as empty");
            None
        }
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))
        }
        _ => Ok(()),
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("listing path has no file name: {}", path.display()))?;
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));
    {
        let mut f = fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        f.write_all(bytes).with_context(|| format!("write {}", tmp.display()))?;
        f.sync_all().with_context(|| format!("sync {}", tmp.display()))?;
    }
    fs::rename(&tmp, path).with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
