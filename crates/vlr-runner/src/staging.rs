use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;
use vlr_core::ClusterId;

/// Local directory tree where each cluster's logs are downloaded for
/// classification and later inspection.
#[derive(Clone, Debug)]
pub struct StagingArea {
    root: PathBuf,
    url_base: Option<String>,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>, url_base: Option<String>) -> Self {
        Self { root: root.into(), url_base }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir_for(&self, cluster_id: &ClusterId) -> PathBuf {
        self.root.join(cluster_id.as_str())
    }

    /// Empty directory for one cluster; whatever an earlier run left there is
    /// discarded.
    pub fn prepare(&self, cluster_id: &ClusterId) -> Result<PathBuf> {
        let dir = self.dir_for(cluster_id);
        if dir.exists() {
            fs::remove_dir_all(&dir).with_context(|| format!("clear {}", dir.display()))?;
        }
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        Ok(dir)
    }

    pub fn location_of(&self, cluster_id: &ClusterId) -> String {
        match &self.url_base {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), cluster_id),
            None => self.dir_for(cluster_id).to_string_lossy().into_owned(),
        }
    }

    /// Make downloaded logs readable by whoever serves the staging tree.
    /// Failures are logged, not returned.
    pub fn relax_permissions(&self, dir: &Path) {
        if let Err(e) = relax(dir) {
            warn!(dir = %dir.display(), error = %e, "could not relax staging permissions");
        }
    }
}

#[cfg(unix)]
fn relax(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(dir, fs::Permissions::from_mode(0o755))?;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            relax(&path)?;
        } else {
            fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn relax(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Log bodies as text; invalid UTF-8 is replaced rather than rejected.
pub fn read_logs(files: &[PathBuf]) -> Result<Vec<String>> {
    files
        .iter()
        .map(|path| {
            let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn id(s: &str) -> ClusterId {
        ClusterId::parse(s).unwrap()
    }

    #[test]
    fn prepare_discards_previous_contents() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path(), None);
        let d = staging.prepare(&id("c1")).unwrap();
        fs::write(d.join("old.log"), "stale").unwrap();
        let d = staging.prepare(&id("c1")).unwrap();
        assert_eq!(fs::read_dir(&d).unwrap().count(), 0);
    }

    #[test]
    fn location_is_path_or_url() {
        let staging = StagingArea::new("/srv/logs", None);
        assert_eq!(staging.location_of(&id("c9")), "/srv/logs/c9");
        let staging = StagingArea::new("/srv/logs", Some("https://logs.example.com/verifier/".into()));
        assert_eq!(staging.location_of(&id("c9")), "https://logs.example.com/verifier/c9");
    }

    #[test]
    fn reads_invalid_utf8_lossily() {
        let dir = tempdir().unwrap();
        let p = dir.path().join("v.log");
        fs::write(&p, b"All tests passed!\xff").unwrap();
        let bodies = read_logs(&[p]).unwrap();
        assert!(bodies[0].starts_with("All tests passed!"));
    }

    #[cfg(unix)]
    #[test]
    fn relaxes_permissions_recursively() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path(), None);
        let d = staging.prepare(&id("c1")).unwrap();
        fs::create_dir(d.join("nested")).unwrap();
        let f = d.join("nested").join("verifier.log");
        fs::write(&f, "x").unwrap();
        fs::set_permissions(&f, fs::Permissions::from_mode(0o600)).unwrap();
        staging.relax_permissions(&d);
        assert_eq!(fs::metadata(&f).unwrap().permissions().mode() & 0o777, 0o644);
        assert_eq!(fs::metadata(d.join("nested")).unwrap().permissions().mode() & 0o777, 0o755);
    }
}
