use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use vlr_collab::{Credentials, FixtureManagement, LocalDirBucket, StaticCredentials};
use vlr_pending::{FsPendingSet, PendingSet};

use crate::emitter::RecordEmitter;
use crate::reconcile::{ReconcileSettings, Reconciler, RunSummary};
use crate::snapshot::SnapshotStore;
use crate::staging::StagingArea;

/// Base URL substituted for the staging root so expected rows stay stable.
pub const SCENARIO_URL_BASE: &str = "https://logs.example.com/verifier";

/// Reference instant for run 0; later runs add `at_offset_secs`.
const SCENARIO_EPOCH_SECS: u64 = 1_792_324_800;

#[derive(Debug, Deserialize)]
pub struct ScenarioExpected {
    pub scenario_id: String,
    pub runs: Vec<ScenarioRun>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioRun {
    #[serde(default)]
    pub at_offset_secs: u64,
    /// Bucket directory for this run, relative to the scenario directory.
    pub bucket: String,
    /// Management fixture for this run; defaults to `management.json`.
    #[serde(default)]
    pub management: Option<String>,
    /// Expected rows without the leading timestamp cell.
    #[serde(default)]
    pub expect_rows: Vec<String>,
    #[serde(default)]
    pub expect_pending: Vec<String>,
}

#[derive(Debug)]
pub struct RunOutcome {
    /// Emitted rows with the timestamp cell removed.
    pub rows: Vec<String>,
    pub timestamps: Vec<String>,
    pub pending: Vec<String>,
    pub summary: RunSummary,
}

#[derive(Debug)]
pub struct ScenarioResult {
    pub runs: Vec<RunOutcome>,
}

pub fn load_expected(dir: &Path) -> Result<ScenarioExpected> {
    let p = dir.join("expected.yaml");
    let s = fs::read_to_string(&p).with_context(|| format!("read expected.yaml: {}", p.display()))?;
    let exp: ScenarioExpected = serde_yaml::from_str(&s).with_context(|| "parse expected.yaml")?;
    Ok(exp)
}

/// Replay a fixture scenario against local collaborators:
/// - `previous.json`, when present, seeds the previous listing
/// - each run lists its own bucket directory and answers state queries from
///   the management fixture
/// - pending markers live in a scratch directory shared by all runs
pub fn simulate(dir: &Path) -> Result<ScenarioResult> {
    let exp = load_expected(dir)?;
    let scratch = std::env::temp_dir().join(format!("vlr-scenario-{}", uuid::Uuid::new_v4()));
    let result = simulate_in(dir, &exp, &scratch);
    let _ = fs::remove_dir_all(&scratch);
    result
}

fn simulate_in(dir: &Path, exp: &ScenarioExpected, scratch: &Path) -> Result<ScenarioResult> {
    fs::create_dir_all(scratch).with_context(|| format!("create {}", scratch.display()))?;
    let store = SnapshotStore::new(scratch.join("previous.json"), scratch.join("current.json"));
    let seed = dir.join("previous.json");
    if seed.exists() {
        fs::copy(&seed, &store.previous).with_context(|| format!("seed {}", seed.display()))?;
    }
    let pending_dir = scratch.join("pending");
    let epoch = UNIX_EPOCH + Duration::from_secs(SCENARIO_EPOCH_SECS);

    let mut runs = Vec::new();
    for (i, run) in exp.runs.iter().enumerate() {
        let management_file = run.management.as_deref().unwrap_or("management.json");
        let management = FixtureManagement::from_path(&dir.join(management_file))
            .with_context(|| format!("{} run {i}: load {management_file}", exp.scenario_id))?;
        let reconciler = Reconciler {
            bucket: Box::new(LocalDirBucket::new(dir.join(&run.bucket))),
            management: Box::new(management),
            credentials: Box::new(StaticCredentials(Credentials::ambient())),
            pending: Box::new(FsPendingSet::open(&pending_dir)?),
            staging: StagingArea::new(scratch.join("staging"), Some(SCENARIO_URL_BASE.to_string())),
            settings: ReconcileSettings::default(),
        };

        let mut emitter = RecordEmitter::new(Vec::<u8>::new());
        let now: SystemTime = epoch + Duration::from_secs(run.at_offset_secs);
        let summary = reconciler
            .run_once(&store, &mut emitter, now)
            .with_context(|| format!("{} run {i}", exp.scenario_id))?;

        let out = String::from_utf8(emitter.into_inner())?;
        let mut rows = Vec::new();
        let mut timestamps = Vec::new();
        for line in out.lines() {
            let (ts, rest) = line.split_once(',').ok_or_else(|| anyhow!("row without cells: {line}"))?;
            timestamps.push(ts.to_string());
            rows.push(rest.to_string());
        }
        let pending = reconciler
            .pending
            .list()?
            .into_iter()
            .map(|e| e.cluster_id.to_string())
            .collect();
        runs.push(RunOutcome { rows, timestamps, pending, summary });
    }
    Ok(ScenarioResult { runs })
}

/// Differences between a simulated scenario and its expectations, one line
/// per mismatch.
pub fn mismatches(exp: &ScenarioExpected, res: &ScenarioResult) -> Vec<String> {
    let mut out = Vec::new();
    if exp.runs.len() != res.runs.len() {
        out.push(format!("expected {} runs, simulated {}", exp.runs.len(), res.runs.len()));
    }
    for (i, (want, got)) in exp.runs.iter().zip(&res.runs).enumerate() {
        if want.expect_rows != got.rows {
            out.push(format!("run {i}: rows {:?} != expected {:?}", got.rows, want.expect_rows));
        }
        if want.expect_pending != got.pending {
            out.push(format!("run {i}: pending {:?} != expected {:?}", got.pending, want.expect_pending));
        }
    }
    out
}

pub fn scenario_dir(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/scenarios").join(name)
}
