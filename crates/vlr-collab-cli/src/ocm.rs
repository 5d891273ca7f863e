use std::path::PathBuf;

use vlr_collab::{
    parse_cluster_description, parse_inflight_checks, ClusterDescription, CollabError, InflightCheck,
    ManagementService, RunContext,
};
use vlr_core::ClusterId;

use crate::exec::{describe_failure, run};

const SERVICE: &str = "ocm";

pub const DEFAULT_CLUSTERS_API: &str = "/api/clusters_mgmt/v1/clusters";

/// Cluster management service reached through the `ocm` command line tool.
#[derive(Clone, Debug)]
pub struct OcmCli {
    pub command: Vec<String>,
    pub clusters_api: String,
    /// Exported to the child as `OCM_CONFIG` when set.
    pub ocm_config: Option<PathBuf>,
}

impl OcmCli {
    pub fn new(command: Vec<String>, clusters_api: impl Into<String>, ocm_config: Option<PathBuf>) -> Self {
        Self { command, clusters_api: clusters_api.into(), ocm_config }
    }

    fn get(&self, ctx: &RunContext, path: &str, what: String) -> Result<Vec<u8>, CollabError> {
        let args = ["get", path];
        let config = self.ocm_config.as_ref().map(|p| p.to_string_lossy().into_owned());
        let extra: Vec<(&str, &str)> = config.iter().map(|c| ("OCM_CONFIG", c.as_str())).collect();
        let out = run(SERVICE, &self.command, &args, &ctx.credentials, &extra)?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(classify_ocm_failure(&stderr, what, describe_failure(&self.command, &args, &out)));
        }
        Ok(out.stdout)
    }
}

/// `ocm get` reports HTTP errors on stderr, e.g.
/// `Error: Can't retrieve ...: status is 404, identifier is '404', code is 'CLUSTERS-MGMT-404'`.
///
/// Authentication problems are checked first: a missing or expired token can
/// also be phrased as "not found".
pub fn classify_ocm_failure(stderr: &str, what: String, detail: String) -> CollabError {
    const CREDENTIAL_MARKERS: &[&str] = &[
        "status is 401",
        "status is 403",
        "not logged in",
        "access token",
        "refresh token",
        "token is expired",
        "token has expired",
        "invalid_grant",
    ];
    const UNAVAILABLE_MARKERS: &[&str] = &["status is 5", "connection refused", "timeout", "no such host"];

    let lower = stderr.to_ascii_lowercase();
    if CREDENTIAL_MARKERS.iter().any(|m| lower.contains(m)) {
        CollabError::Credentials(detail)
    } else if lower.contains("status is 404") || lower.contains("not found") {
        CollabError::NotFound(what)
    } else if UNAVAILABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        CollabError::Unavailable { service: SERVICE, detail }
    } else {
        CollabError::Malformed { service: SERVICE, detail }
    }
}

impl ManagementService for OcmCli {
    fn describe_cluster(&self, ctx: &RunContext, cluster_id: &ClusterId) -> Result<ClusterDescription, CollabError> {
        let path = format!("{}/{}", self.clusters_api, cluster_id);
        let body = self.get(ctx, &path, format!("cluster {cluster_id}"))?;
        parse_cluster_description(SERVICE, &body)
    }

    fn inflight_checks(&self, ctx: &RunContext, cluster_id: &ClusterId) -> Result<Vec<InflightCheck>, CollabError> {
        let path = format!("{}/{}/inflight_checks", self.clusters_api, cluster_id);
        let body = self.get(ctx, &path, format!("inflight checks for {cluster_id}"))?;
        parse_inflight_checks(SERVICE, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_404_is_not_found() {
        let err = classify_ocm_failure(
            "Error: Can't retrieve page: status is 404, identifier is '404', code is 'CLUSTERS-MGMT-404'",
            "cluster c1".into(),
            "d".into(),
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn auth_failures_are_credential_errors() {
        let err = classify_ocm_failure("Not logged in, run the 'login' command", "c".into(), "d".into());
        assert!(matches!(err, CollabError::Credentials(_)));
    }

    #[test]
    fn missing_token_is_a_credential_error_not_a_missing_cluster() {
        let err = classify_ocm_failure("Error: refresh token not found in configuration", "c".into(), "d".into());
        assert!(matches!(err, CollabError::Credentials(_)));
        assert!(err.is_run_fatal());
    }

    #[test]
    fn unrelated_token_words_do_not_look_like_auth_failures() {
        let err = classify_ocm_failure("unexpected token '<' in response body", "c".into(), "d".into());
        assert!(matches!(err, CollabError::Malformed { .. }));
    }

    #[test]
    fn server_errors_are_fatal() {
        assert!(classify_ocm_failure("status is 503", "c".into(), "d".into()).is_run_fatal());
        assert!(!classify_ocm_failure("weird", "c".into(), "d".into()).is_run_fatal());
    }

    #[cfg(unix)]
    mod with_fake_cli {
        use super::*;
        use std::fs;
        use std::path::Path;
        use tempfile::tempdir;
        use vlr_collab::Credentials;

        const FAKE_OCM: &str = r#"
case "$2" in
  */c1) printf '%s' '{"id":"c1","name":"alpha","state":"installing"}' ;;
  */c1/inflight_checks) printf '%s' '{"items":[{"name":"egress","state":"running"}]}' ;;
  */cfg) printf '{"id":"cfg","name":"%s","state":"ready"}' "$OCM_CONFIG" ;;
  *) echo "Error: Can't retrieve cluster: status is 404, identifier is '404'" >&2; exit 1 ;;
esac
"#;

        fn ocm(dir: &Path, config: Option<PathBuf>) -> OcmCli {
            let script = dir.join("ocm.sh");
            fs::write(&script, FAKE_OCM).unwrap();
            OcmCli::new(vec!["sh".into(), script.to_string_lossy().into_owned()], DEFAULT_CLUSTERS_API, config)
        }

        fn ctx() -> RunContext {
            RunContext::new(Credentials::ambient())
        }

        #[test]
        fn describes_known_cluster() {
            let dir = tempdir().unwrap();
            let d = ocm(dir.path(), None).describe_cluster(&ctx(), &ClusterId::parse("c1").unwrap()).unwrap();
            assert_eq!(d.name.as_deref(), Some("alpha"));
            assert_eq!(d.state.as_deref(), Some("installing"));
        }

        #[test]
        fn lists_inflight_checks() {
            let dir = tempdir().unwrap();
            let checks = ocm(dir.path(), None).inflight_checks(&ctx(), &ClusterId::parse("c1").unwrap()).unwrap();
            assert_eq!(checks[0].state.as_deref(), Some("running"));
        }

        #[test]
        fn unknown_cluster_is_not_found() {
            let dir = tempdir().unwrap();
            let err = ocm(dir.path(), None).describe_cluster(&ctx(), &ClusterId::parse("zz").unwrap()).unwrap_err();
            assert!(err.is_not_found());
        }

        #[test]
        fn exports_ocm_config() {
            let dir = tempdir().unwrap();
            let d = ocm(dir.path(), Some(PathBuf::from("/etc/ocm.json")))
                .describe_cluster(&ctx(), &ClusterId::parse("cfg").unwrap())
                .unwrap();
            assert_eq!(d.name.as_deref(), Some("/etc/ocm.json"));
        }
    }
}
