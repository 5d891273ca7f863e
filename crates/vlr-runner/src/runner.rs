use std::io::Write;
use std::time::SystemTime;

use anyhow::Result;
use tracing::debug;
use vlr_collab::CredentialProvider;
use vlr_collab_cli::{AmbientCredentials, AwsCliBucket, CommandCredentialProvider, OcmCli};
use vlr_pending::FsPendingSet;

use crate::emitter::RecordEmitter;
use crate::reconcile::{ReconcileSettings, Reconciler, RunSummary};
use crate::snapshot::SnapshotStore;
use crate::staging::StagingArea;
use crate::Config;

/// A reconciler wired to the real command line collaborators.
pub struct Runner {
    pub cfg: Config,
    pub reconciler: Reconciler,
}

impl Runner {
    pub fn open(cfg: Config) -> Result<Self> {
        cfg.validate()?;

        let bucket = AwsCliBucket::new(cfg.bucket.aws_command.clone(), cfg.bucket.name.clone(), cfg.bucket.region.clone());
        let management = OcmCli::new(
            cfg.management.ocm_command.clone(),
            cfg.management.clusters_api.clone(),
            cfg.ocm_config_path(),
        );
        let credentials: Box<dyn CredentialProvider> = match &cfg.credentials.command {
            Some(command) => Box::new(CommandCredentialProvider::new(command.clone())),
            None => Box::new(AmbientCredentials),
        };
        let pending = FsPendingSet::open(cfg.pending_dir())?;
        let staging = StagingArea::new(cfg.staging_root(), cfg.staging.url_base.clone());
        debug!(pending = %pending.dir().display(), staging = %staging.root().display(), "runner opened");

        let reconciler = Reconciler {
            bucket: Box::new(bucket),
            management: Box::new(management),
            credentials,
            pending: Box::new(pending),
            staging,
            settings: ReconcileSettings::from_config(&cfg),
        };
        Ok(Self { cfg, reconciler })
    }

    pub fn run_once<W: Write>(&self, store: &SnapshotStore, emitter: &mut RecordEmitter<W>) -> Result<RunSummary> {
        self.reconciler.run_once(store, emitter, SystemTime::now())
    }
}
