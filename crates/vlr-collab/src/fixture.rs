use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;
use vlr_core::{glob_matches, ClusterId, ListingSnapshot};
use walkdir::WalkDir;

use crate::types::{
    ClusterDescription, CollabError, CredentialProvider, Credentials, InflightCheck, LogBucket, ManagementService,
    RunContext,
};

/// Bucket mirrored in a local directory: the object key is the path relative
/// to `root`, with `/` separators.
#[derive(Clone, Debug)]
pub struct LocalDirBucket {
    pub root: PathBuf,
}

impl LocalDirBucket {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn objects(&self) -> Result<Vec<(String, PathBuf, u64)>, CollabError> {
        if !self.root.is_dir() {
            return Err(CollabError::Unavailable {
                service: "local bucket",
                detail: format!("{} is not a directory", self.root.display()),
            });
        }
        let mut out = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| CollabError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else { continue };
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let size = entry.metadata().map_err(|e| CollabError::Io(e.into()))?.len();
            out.push((key, entry.into_path(), size));
        }
        Ok(out)
    }
}

impl LogBucket for LocalDirBucket {
    fn list_objects(&self, _ctx: &RunContext) -> Result<ListingSnapshot, CollabError> {
        Ok(self
            .objects()?
            .into_iter()
            .map(|(key, _, size)| (key, json!({ "Size": size })))
            .collect())
    }

    fn download_matching(
        &self,
        _ctx: &RunContext,
        prefix: &str,
        pattern: &str,
        dest: &Path,
    ) -> Result<Vec<PathBuf>, CollabError> {
        let mut written = Vec::new();
        for (key, src, _) in self.objects()? {
            let Some(rel) = key.strip_prefix(prefix) else { continue };
            if rel.is_empty() || !glob_matches(pattern, rel) {
                continue;
            }
            let target = dest.join(rel);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&src, &target)?;
            written.push(target);
        }
        Ok(written)
    }
}

/// One cluster as the fixture management service reports it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FixtureCluster {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// `None` makes the in-flight check query report not-found.
    #[serde(default)]
    pub inflight_checks: Option<Vec<InflightCheck>>,
    /// Every query for this cluster fails as if the service were down.
    #[serde(default)]
    pub outage: bool,
}

/// Management service answering from a JSON map of cluster id -> cluster.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixtureManagement {
    pub clusters: BTreeMap<String, FixtureCluster>,
}

impl FixtureManagement {
    pub fn from_path(path: &Path) -> Result<Self, CollabError> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| CollabError::Malformed {
            service: "fixture management",
            detail: format!("{}: {e}", path.display()),
        })
    }

    pub fn with_cluster(mut self, cluster_id: &str, cluster: FixtureCluster) -> Self {
        self.clusters.insert(cluster_id.to_string(), cluster);
        self
    }

    fn lookup(&self, cluster_id: &ClusterId) -> Result<&FixtureCluster, CollabError> {
        let cluster = self
            .clusters
            .get(cluster_id.as_str())
            .ok_or_else(|| CollabError::NotFound(format!("cluster {cluster_id}")))?;
        if cluster.outage {
            return Err(CollabError::Unavailable {
                service: "fixture management",
                detail: format!("outage while querying {cluster_id}"),
            });
        }
        Ok(cluster)
    }
}

impl ManagementService for FixtureManagement {
    fn describe_cluster(&self, _ctx: &RunContext, cluster_id: &ClusterId) -> Result<ClusterDescription, CollabError> {
        let cluster = self.lookup(cluster_id)?;
        Ok(ClusterDescription {
            id: Some(cluster_id.to_string()),
            name: cluster.name.clone(),
            state: cluster.state.clone(),
        })
    }

    fn inflight_checks(&self, _ctx: &RunContext, cluster_id: &ClusterId) -> Result<Vec<InflightCheck>, CollabError> {
        self.lookup(cluster_id)?
            .inflight_checks
            .clone()
            .ok_or_else(|| CollabError::NotFound(format!("inflight checks for {cluster_id}")))
    }
}

/// Hands out the same credential set every run.
#[derive(Clone, Debug, Default)]
pub struct StaticCredentials(pub Credentials);

impl CredentialProvider for StaticCredentials {
    fn credentials(&self) -> Result<Credentials, CollabError> {
        Ok(self.0.clone())
    }
}
