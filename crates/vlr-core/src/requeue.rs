use crate::{ClusterState, Lifecycle};

/// Default cap on re-checks of a cluster the management service does not
/// know: twelve 5-minute cycles.
pub const DEFAULT_MAX_NOT_FOUND_RETRIES: u32 = 12;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequeueDecision {
    /// Terminal state; nothing to remember.
    Settled,
    /// Known cluster in a transient state.
    Requeue,
    /// Unknown cluster, re-check again; carries the new attempt count.
    RequeueNotFound { attempts: u32 },
    /// Unknown cluster that exhausted its re-checks.
    GiveUp { attempts: u32 },
}

/// Pure requeue policy applied by the driver after a cluster is processed.
///
/// `prior_not_found_attempts` is the count carried by the pending entry the
/// cluster was drained from (0 when it came from the listing diff).
pub fn decide_requeue<S: AsRef<str>>(
    state: &ClusterState,
    terminal_states: &[S],
    prior_not_found_attempts: u32,
    max_not_found_retries: u32,
) -> RequeueDecision {
    if !state.found {
        let attempts = prior_not_found_attempts.saturating_add(1);
        return if attempts <= max_not_found_retries {
            RequeueDecision::RequeueNotFound { attempts }
        } else {
            RequeueDecision::GiveUp { attempts }
        };
    }
    match state.lifecycle(terminal_states) {
        Lifecycle::Terminal => RequeueDecision::Settled,
        Lifecycle::Transient => RequeueDecision::Requeue,
    }
}
