use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};
use vlr_collab::{CollabError, CredentialProvider, LogBucket, ManagementService, RunContext};
use vlr_core::{
    classify_logs, decide_requeue, new_cluster_ids, new_object_keys, ClusterId, ClusterRecord, ClusterState, LogOutcome,
    RequeueDecision, RunId, DEFAULT_MAX_NOT_FOUND_RETRIES, DEFAULT_TERMINAL_STATES,
};
use vlr_pending::{PendingSet, DEFAULT_MIN_AGE};

use crate::emitter::RecordEmitter;
use crate::snapshot::SnapshotStore;
use crate::staging::{read_logs, StagingArea};
use crate::Config;

#[derive(Clone, Debug)]
pub struct ReconcileSettings {
    pub log_pattern: String,
    pub terminal_states: Vec<String>,
    pub min_age: Duration,
    pub max_not_found_retries: u32,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            log_pattern: "*verifier*".to_string(),
            terminal_states: DEFAULT_TERMINAL_STATES.iter().map(|s| s.to_string()).collect(),
            min_age: DEFAULT_MIN_AGE,
            max_not_found_retries: DEFAULT_MAX_NOT_FOUND_RETRIES,
        }
    }
}

impl ReconcileSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            log_pattern: cfg.bucket.log_pattern.clone(),
            terminal_states: cfg.management.terminal_states.clone(),
            min_age: cfg.min_age(),
            max_not_found_retries: cfg.pending.max_not_found_retries,
        }
    }
}

/// Counters for one run, logged at the end and returned to the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub rotated: bool,
    pub new_clusters: usize,
    pub due_clusters: usize,
    pub emitted: usize,
    pub requeued: usize,
    pub dropped: usize,
}

pub struct Reconciler {
    pub bucket: Box<dyn LogBucket>,
    pub management: Box<dyn ManagementService>,
    pub credentials: Box<dyn CredentialProvider>,
    pub pending: Box<dyn PendingSet>,
    pub staging: StagingArea,
    pub settings: ReconcileSettings,
}

impl Reconciler {
    /// One reconciliation pass. `now` is the run's reference instant; pending
    /// ages and record timestamps are measured from it.
    ///
    /// Rows are flushed as clusters are processed, so a fatal error part way
    /// through leaves the earlier rows in `emitter`.
    pub fn run_once<W: Write>(
        &self,
        store: &SnapshotStore,
        emitter: &mut RecordEmitter<W>,
        now: SystemTime,
    ) -> Result<RunSummary> {
        let started = Instant::now();
        let run_id = RunId::new();
        let span = info_span!("run", run_id = %run_id);
        let _guard = span.enter();

        let credentials = self.credentials.credentials().context("obtain run credentials")?;
        let ctx = RunContext { run_id: run_id.clone(), credentials };

        let fresh = self.bucket.list_objects(&ctx).context("list log bucket")?;
        // Drained before the snapshots move, so a pending-dir failure leaves
        // both listing files as they were.
        let due = self.pending.drain_due(self.settings.min_age, now).context("drain pending set")?;
        let rotated = store.rotate()?;
        let previous = store.load_previous();
        store.save_current(&fresh)?;
        store.ensure_previous_exists()?;
        let current = store.load_current()?;

        let new_ids = new_cluster_ids(&previous, &current);
        let unscoped = new_object_keys(&previous, &current)
            .filter(|key| ClusterId::from_object_key(key).is_none())
            .count();
        if unscoped > 0 {
            debug!(unscoped, "skipped new keys without a cluster prefix");
        }
        debug!(listed = current.len(), new = new_ids.len(), due = due.len(), "candidates collected");

        let mut summary = RunSummary {
            run_id: run_id.to_string(),
            rotated,
            new_clusters: new_ids.len(),
            due_clusters: due.len(),
            ..RunSummary::default()
        };

        let mut prior_attempts: BTreeMap<ClusterId, u32> = BTreeMap::new();
        let mut candidates: BTreeSet<ClusterId> = new_ids;
        for entry in due {
            prior_attempts.insert(entry.cluster_id.clone(), entry.not_found_attempts);
            candidates.insert(entry.cluster_id);
        }

        for cluster_id in &candidates {
            let at = now + started.elapsed();
            let prior = prior_attempts.get(cluster_id).copied().unwrap_or(0);
            self.process_cluster(&ctx, cluster_id, prior, at, emitter, &mut summary)
                .with_context(|| format!("process cluster {cluster_id}"))?;
        }

        info!(
            rotated = summary.rotated,
            new_clusters = summary.new_clusters,
            due_clusters = summary.due_clusters,
            emitted = summary.emitted,
            requeued = summary.requeued,
            dropped = summary.dropped,
            "run complete"
        );
        Ok(summary)
    }

    fn process_cluster<W: Write>(
        &self,
        ctx: &RunContext,
        cluster_id: &ClusterId,
        prior_not_found_attempts: u32,
        at: SystemTime,
        emitter: &mut RecordEmitter<W>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let state = self.fetch_state(ctx, cluster_id)?;
        let (logs, location) = self.fetch_logs(ctx, cluster_id)?;
        debug!(%cluster_id, found = state.found, state = ?state.management_state, logs_found = logs.logs_found(), "cluster processed");

        let record = ClusterRecord::new(DateTime::<Utc>::from(at), cluster_id.clone(), &state, logs, location);
        emitter.emit(&record)?;
        summary.emitted += 1;

        match decide_requeue(
            &state,
            &self.settings.terminal_states,
            prior_not_found_attempts,
            self.settings.max_not_found_retries,
        ) {
            RequeueDecision::Settled => {}
            RequeueDecision::Requeue => {
                self.pending.mark_pending_at(cluster_id, at)?;
                summary.requeued += 1;
            }
            RequeueDecision::RequeueNotFound { attempts } => {
                self.pending.mark_not_found(cluster_id, attempts, at)?;
                summary.requeued += 1;
            }
            RequeueDecision::GiveUp { attempts } => {
                warn!(%cluster_id, attempts, "cluster still unknown to management service; dropping");
                summary.dropped += 1;
            }
        }
        Ok(())
    }

    /// Management-plane state for one cluster. Only run-fatal errors are
    /// returned; anything else degrades to absent fields.
    pub fn fetch_state(&self, ctx: &RunContext, cluster_id: &ClusterId) -> Result<ClusterState, CollabError> {
        let description = match self.management.describe_cluster(ctx, cluster_id) {
            Ok(d) => d,
            Err(e) if e.is_not_found() => {
                debug!(%cluster_id, "cluster not found in management service");
                return Ok(ClusterState::not_found());
            }
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) => {
                warn!(%cluster_id, error = %e, "cluster description unusable");
                return Ok(ClusterState::not_found());
            }
        };

        let inflight_states = match self.management.inflight_checks(ctx, cluster_id) {
            Ok(checks) => Some(checks.into_iter().filter_map(|c| c.state).collect()),
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                warn!(%cluster_id, error = %e, "inflight checks unusable");
                None
            }
        };

        Ok(ClusterState {
            found: true,
            name: description.name.filter(|s| !s.is_empty()),
            management_state: description.state.filter(|s| !s.is_empty()),
            inflight_states,
        })
    }

    /// Download and classify one cluster's verifier logs. Returns the verdict
    /// and where the downloaded logs can be found.
    pub fn fetch_logs(&self, ctx: &RunContext, cluster_id: &ClusterId) -> Result<(LogOutcome, String)> {
        let dir = self.staging.prepare(cluster_id)?;
        let location = self.staging.location_of(cluster_id);
        let prefix = format!("{cluster_id}/");

        let files = match self.bucket.download_matching(ctx, &prefix, &self.settings.log_pattern, &dir) {
            Ok(files) => files,
            Err(e) if e.is_run_fatal() => return Err(e).context("download verifier logs"),
            Err(e) => {
                warn!(%cluster_id, error = %e, "log download failed; treating as no logs");
                Vec::new()
            }
        };
        self.staging.relax_permissions(&dir);

        let bodies = read_logs(&files)?;
        Ok((classify_logs(&bodies), location))
    }
}
