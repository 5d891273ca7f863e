use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vlr_core::{ClusterId, ListingSnapshot, RunId};

#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    /// The collaborator does not know the requested object. Never fatal.
    #[error("{0} not found")]
    NotFound(String),

    #[error("{service} unavailable: {detail}")]
    Unavailable { service: &'static str, detail: String },

    #[error("credential failure: {0}")]
    Credentials(String),

    #[error("malformed response from {service}: {detail}")]
    Malformed { service: &'static str, detail: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollabError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CollabError::NotFound(_))
    }

    /// Errors that must abort the whole run rather than degrade one cluster.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, CollabError::Unavailable { .. } | CollabError::Credentials(_))
    }
}

/// Short-lived credential set for one run, exposed to collaborators as
/// environment pairs for the child processes they spawn.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    env: BTreeMap<String, String>,
    pub expires_at: Option<String>,
}

impl Credentials {
    /// No injected credentials; children inherit the process environment.
    pub fn ambient() -> Self {
        Self::default()
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn env(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_ambient(&self) -> bool {
        self.env.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.env.keys().collect::<Vec<_>>())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Everything a collaborator call needs from the current run.
#[derive(Clone, Debug)]
pub struct RunContext {
    pub run_id: RunId,
    pub credentials: Credentials,
}

impl RunContext {
    pub fn new(credentials: Credentials) -> Self {
        Self { run_id: RunId::new(), credentials }
    }
}

/// Descriptive record of a cluster in the management service. Unknown
/// fields are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDescription {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// One background check the management service runs against a cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InflightCheck {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

pub fn parse_cluster_description(service: &'static str, bytes: &[u8]) -> Result<ClusterDescription, CollabError> {
    serde_json::from_slice(bytes).map_err(|e| CollabError::Malformed { service, detail: e.to_string() })
}

/// Accepts a bare JSON array or a list envelope `{"items": [...]}`. An
/// envelope without `items` is an empty list.
pub fn parse_inflight_checks(service: &'static str, bytes: &[u8]) -> Result<Vec<InflightCheck>, CollabError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        List(Vec<InflightCheck>),
        Envelope {
            #[serde(default)]
            items: Vec<InflightCheck>,
        },
    }
    match serde_json::from_slice(bytes) {
        Ok(Repr::List(items)) | Ok(Repr::Envelope { items }) => Ok(items),
        Err(e) => Err(CollabError::Malformed { service, detail: e.to_string() }),
    }
}

/// Blob store holding verifier log uploads, keyed `<cluster_id>/...`.
pub trait LogBucket: Send + Sync {
    fn list_objects(&self, ctx: &RunContext) -> Result<ListingSnapshot, CollabError>;

    /// Copy every object under `prefix` whose key, relative to `prefix`,
    /// matches the glob `pattern` into `dest`. Returns the local paths written.
    fn download_matching(
        &self,
        ctx: &RunContext,
        prefix: &str,
        pattern: &str,
        dest: &Path,
    ) -> Result<Vec<PathBuf>, CollabError>;
}

/// Cluster lifecycle authority.
pub trait ManagementService: Send + Sync {
    /// `CollabError::NotFound` when the cluster is unknown.
    fn describe_cluster(&self, ctx: &RunContext, cluster_id: &ClusterId) -> Result<ClusterDescription, CollabError>;

    fn inflight_checks(&self, ctx: &RunContext, cluster_id: &ClusterId) -> Result<Vec<InflightCheck>, CollabError>;
}

/// Mints the time-boxed credentials used by every collaborator call in a run.
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self) -> Result<Credentials, CollabError>;
}
