pub mod config;
pub mod emitter;
pub mod reconcile;
pub mod runner;
pub mod scenario;
pub mod snapshot;
pub mod staging;

pub use config::*;
pub use emitter::*;
pub use reconcile::*;
pub use runner::*;
pub use snapshot::*;
pub use staging::*;

#[cfg(test)]
mod scenario_tests {
    use super::scenario::*;

    fn run(name: &str) -> (ScenarioExpected, ScenarioResult) {
        let dir = scenario_dir(name);
        let exp = load_expected(&dir).unwrap();
        let res = simulate(&dir).unwrap();
        let diffs = mismatches(&exp, &res);
        assert!(diffs.is_empty(), "{}: {diffs:#?}", exp.scenario_id);
        (exp, res)
    }

    #[test]
    fn scenario_a_ready_cluster_without_verifier_logs() {
        let (_, res) = run("SC-A-ready-no-logs");
        assert_eq!(res.runs[0].summary.new_clusters, 1);
        assert_eq!(res.runs[0].summary.requeued, 0);
    }

    #[test]
    fn scenario_b_installing_cluster_is_revisited() {
        let (exp, res) = run("SC-B-installing-requeue");
        assert_eq!(exp.runs.len(), 3);
        // second run finds nothing new; the row comes from the pending drain
        assert_eq!(res.runs[1].summary.new_clusters, 0);
        assert_eq!(res.runs[1].summary.due_clusters, 1);
        assert_eq!(res.runs[2].summary.requeued, 0);
    }

    #[test]
    fn scenario_b_timestamps_follow_the_run_clock() {
        let (_, res) = run("SC-B-installing-requeue");
        let first = chrono::DateTime::parse_from_rfc3339(&res.runs[0].timestamps[0]).unwrap();
        let second = chrono::DateTime::parse_from_rfc3339(&res.runs[1].timestamps[0]).unwrap();
        let gap = (second - first).num_seconds();
        assert!((599..=601).contains(&gap), "gap {gap}");
        assert!(res.runs[0].timestamps[0].ends_with('Z'));
    }

    #[test]
    fn scenario_c_all_tests_passed() {
        let (_, res) = run("SC-C-all-tests-passed");
        // c0 was already in the previous listing; manifest.json has no cluster prefix
        assert_eq!(res.runs[0].summary.new_clusters, 1);
    }
}
