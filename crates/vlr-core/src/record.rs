use std::borrow::Cow;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{ClusterId, ClusterState, LogOutcome};

/// Column order consumed by the downstream analyzer. Do not reorder.
pub const CSV_HEADER: &str = "timestamp,cid,cname,ocm_state,ocm_inflight_states,found_verifier_s3_logs,found_all_tests_passed,found_egress_failures,log_download_url";

/// Cell text for an absent optional value.
pub const NULL_CELL: &str = "NULL";

const FIELD_SEPARATOR: char = ',';
const QUOTE: char = '"';

/// One audit row: a cluster's management state joined with its log verdict.
/// Built once per cluster per run and serialized immediately.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterRecord {
    pub timestamp: DateTime<Utc>,
    pub cluster_id: ClusterId,
    pub cluster_name: Option<String>,
    pub management_state: Option<String>,
    pub inflight_states: Option<Vec<String>>,
    pub logs: LogOutcome,
    pub log_location: String,
}

impl ClusterRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        cluster_id: ClusterId,
        state: &ClusterState,
        logs: LogOutcome,
        log_location: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            cluster_id,
            cluster_name: state.name.clone(),
            management_state: state.management_state.clone(),
            inflight_states: state.inflight_states.clone(),
            logs,
            log_location: log_location.into(),
        }
    }

    pub fn logs_found(&self) -> bool {
        self.logs.logs_found()
    }

    pub fn all_tests_passed(&self) -> Option<bool> {
        self.logs.verdict().map(|v| v.all_tests_passed)
    }

    pub fn egress_failures_found(&self) -> Option<bool> {
        self.logs.verdict().map(|v| v.egress_failures_found)
    }

    pub fn timestamp_cell(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Cells in `CSV_HEADER` order, unescaped.
    pub fn cells(&self) -> [String; 9] {
        [
            self.timestamp_cell(),
            self.cluster_id.to_string(),
            opt_cell(self.cluster_name.as_deref()),
            opt_cell(self.management_state.as_deref()),
            self.inflight_states
                .as_ref()
                .map(|states| states.join(" "))
                .unwrap_or_else(|| NULL_CELL.to_string()),
            bool_cell(self.logs_found()).to_string(),
            opt_bool_cell(self.all_tests_passed()).to_string(),
            opt_bool_cell(self.egress_failures_found()).to_string(),
            self.log_location.clone(),
        ]
    }

    /// One CSV row without the line terminator. Rows end with a trailing
    /// separator, as the existing output files do.
    pub fn to_csv_row(&self) -> String {
        let mut row = String::new();
        for cell in self.cells() {
            row.push_str(&escape_csv(&cell));
            row.push(FIELD_SEPARATOR);
        }
        row
    }
}

fn opt_cell(value: Option<&str>) -> String {
    value.unwrap_or(NULL_CELL).to_string()
}

fn bool_cell(value: bool) -> &'static str {
    if value {
        "TRUE"
    } else {
        "FALSE"
    }
}

fn opt_bool_cell(value: Option<bool>) -> &'static str {
    value.map(bool_cell).unwrap_or(NULL_CELL)
}

/// Quote a cell if it contains the separator, a quote or a line break;
/// embedded quotes are doubled.
pub fn escape_csv(value: &str) -> Cow<'_, str> {
    let needs_quoting = value.chars().any(|c| c == FIELD_SEPARATOR || c == QUOTE || c == '\n' || c == '\r');
    if !needs_quoting {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push(QUOTE);
    for c in value.chars() {
        if c == QUOTE {
            out.push(QUOTE);
        }
        out.push(c);
    }
    out.push(QUOTE);
    Cow::Owned(out)
}
