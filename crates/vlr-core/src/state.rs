use serde::{Deserialize, Serialize};

/// Lifecycle states after which a cluster no longer needs re-checking.
pub const DEFAULT_TERMINAL_STATES: &[&str] = &["ready", "error"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    Terminal,
    Transient,
}

/// Management-plane view of one cluster at processing time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterState {
    /// False when the management service does not know the cluster.
    pub found: bool,
    pub name: Option<String>,
    pub management_state: Option<String>,
    pub inflight_states: Option<Vec<String>>,
}

impl ClusterState {
    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn lifecycle<S: AsRef<str>>(&self, terminal_states: &[S]) -> Lifecycle {
        lifecycle_of(self.management_state.as_deref(), terminal_states)
    }
}

/// Absent or empty states are transient.
pub fn lifecycle_of<S: AsRef<str>>(state: Option<&str>, terminal_states: &[S]) -> Lifecycle {
    match state {
        Some(s) if terminal_states.iter().any(|t| t.as_ref() == s) => Lifecycle::Terminal,
        _ => Lifecycle::Transient,
    }
}
