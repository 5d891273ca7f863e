use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use vlr_core::{DEFAULT_MAX_NOT_FOUND_RETRIES, DEFAULT_TERMINAL_STATES};
use vlr_pending::DEFAULT_MIN_AGE;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub bucket: BucketConfig,
    pub management: ManagementConfig,
    pub credentials: CredentialsConfig,
    pub pending: PendingConfig,
    pub staging: StagingConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BucketConfig {
    pub name: String,
    pub region: Option<String>,
    /// Program plus leading arguments used to invoke the aws CLI.
    pub aws_command: Vec<String>,
    /// Glob matched against object keys below `<cluster_id>/`.
    pub log_pattern: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ManagementConfig {
    pub ocm_command: Vec<String>,
    pub clusters_api: String,
    /// Exported as OCM_CONFIG to the ocm CLI.
    pub ocm_config: Option<String>,
    pub terminal_states: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Command printing short-lived AWS credentials as JSON. Unset means the
    /// process environment is used as-is.
    pub command: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PendingConfig {
    pub dir: String,
    pub min_age_secs: u64,
    pub max_not_found_retries: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StagingConfig {
    pub root: String,
    /// When set, records carry `<url_base>/<cluster_id>` instead of the
    /// local staging path.
    pub url_base: Option<String>,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            region: None,
            aws_command: vec!["aws".to_string()],
            log_pattern: "*verifier*".to_string(),
        }
    }
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            ocm_command: vec!["ocm".to_string()],
            clusters_api: vlr_collab_cli::DEFAULT_CLUSTERS_API.to_string(),
            ocm_config: None,
            terminal_states: DEFAULT_TERMINAL_STATES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            dir: "~/.vlr/pending".to_string(),
            min_age_secs: DEFAULT_MIN_AGE.as_secs(),
            max_not_found_retries: DEFAULT_MAX_NOT_FOUND_RETRIES,
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self { root: "~/.vlr/staging".to_string(), url_base: None }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// An explicit path must exist; the default path falls back to built-in
    /// defaults when absent.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("vlr.toml")
    }

    /// Checks that only matter once real collaborators are built.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.name.trim().is_empty() {
            return Err(anyhow!("bucket.name must be set"));
        }
        if self.bucket.aws_command.is_empty() {
            return Err(anyhow!("bucket.aws_command must name a program"));
        }
        if self.management.ocm_command.is_empty() {
            return Err(anyhow!("management.ocm_command must name a program"));
        }
        if matches!(&self.credentials.command, Some(cmd) if cmd.is_empty()) {
            return Err(anyhow!("credentials.command must name a program when set"));
        }
        Ok(())
    }

    pub fn pending_dir(&self) -> PathBuf {
        expand(&self.pending.dir)
    }

    pub fn staging_root(&self) -> PathBuf {
        expand(&self.staging.root)
    }

    pub fn ocm_config_path(&self) -> Option<PathBuf> {
        self.management.ocm_config.as_deref().map(expand)
    }

    pub fn min_age(&self) -> Duration {
        Duration::from_secs(self.pending.min_age_secs)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}
