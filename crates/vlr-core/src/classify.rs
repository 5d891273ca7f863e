/// Printed by the verifier when every egress probe succeeded.
pub const ALL_TESTS_PASSED_MARKER: &str = "All tests passed!";
/// Printed by the verifier when at least one egress endpoint was blocked.
pub const EGRESS_FAILURES_MARKER: &str = "egress failures found";

/// Pass/fail signal extracted from verifier log text.
///
/// The two flags are independent: a log may carry neither, either or both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogVerdict {
    pub all_tests_passed: bool,
    pub egress_failures_found: bool,
}

/// Result of fetching a cluster's verifier logs. A verdict only exists when
/// at least one log was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogOutcome {
    NotFound,
    Found(LogVerdict),
}

impl LogOutcome {
    pub fn logs_found(&self) -> bool {
        matches!(self, LogOutcome::Found(_))
    }

    pub fn verdict(&self) -> Option<LogVerdict> {
        match self {
            LogOutcome::NotFound => None,
            LogOutcome::Found(v) => Some(*v),
        }
    }
}

/// Case-sensitive substring scan; deliberately not a log parser.
pub fn classify(text: &str) -> LogVerdict {
    LogVerdict {
        all_tests_passed: text.contains(ALL_TESTS_PASSED_MARKER),
        egress_failures_found: text.contains(EGRESS_FAILURES_MARKER),
    }
}

/// Classify the concatenation of several log bodies. Bodies are joined with a
/// newline so a marker cannot be assembled across two files.
pub fn classify_logs<S: AsRef<str>>(bodies: &[S]) -> LogOutcome {
    if bodies.is_empty() {
        return LogOutcome::NotFound;
    }
    let joined = bodies.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n");
    LogOutcome::Found(classify(&joined))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neither_marker() {
        assert_eq!(classify("probe curl ok\n"), LogVerdict { all_tests_passed: false, egress_failures_found: false });
    }

    #[test]
    fn both_markers() {
        let text = "egress failures found: 1\n...\nAll tests passed!\n";
        assert_eq!(classify(text), LogVerdict { all_tests_passed: true, egress_failures_found: true });
    }

    #[test]
    fn markers_are_case_sensitive() {
        assert_eq!(classify("all tests passed!\nEGRESS FAILURES FOUND"), LogVerdict::default());
    }

    #[test]
    fn no_bodies_means_no_logs() {
        let none: [&str; 0] = [];
        assert_eq!(classify_logs(&none), LogOutcome::NotFound);
        assert!(classify_logs(&none).verdict().is_none());
    }

    #[test]
    fn markers_found_in_any_body() {
        let outcome = classify_logs(&["first run\n", "second run\nAll tests passed!"]);
        assert_eq!(outcome.verdict(), Some(LogVerdict { all_tests_passed: true, egress_failures_found: false }));
    }

    #[test]
    fn markers_do_not_span_bodies() {
        let outcome = classify_logs(&["egress failures", " found"]);
        assert_eq!(outcome, LogOutcome::Found(LogVerdict::default()));
    }
}
