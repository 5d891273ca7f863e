use std::path::{Path, PathBuf};

use tracing::debug;
use vlr_collab::{CollabError, LogBucket, RunContext};
use vlr_core::ListingSnapshot;
use walkdir::WalkDir;

use crate::exec::{describe_failure, run};

const SERVICE: &str = "s3";

/// Log bucket reached through the `aws` command line tool.
#[derive(Clone, Debug)]
pub struct AwsCliBucket {
    /// Program and leading arguments, e.g. `["aws"]` or `["aws", "--profile", "logs"]`.
    pub command: Vec<String>,
    pub bucket: String,
    pub region: Option<String>,
}

impl AwsCliBucket {
    pub fn new(command: Vec<String>, bucket: impl Into<String>, region: Option<String>) -> Self {
        Self { command, bucket: bucket.into(), region }
    }

    fn with_region<'a>(&'a self, mut args: Vec<&'a str>) -> Vec<&'a str> {
        if let Some(region) = &self.region {
            args.extend(["--region", region.as_str()]);
        }
        args
    }
}

/// Map a failed `aws` invocation onto the error taxonomy: auth problems and
/// connectivity problems abort the run, anything else degrades one cluster.
pub fn classify_aws_failure(stderr: &str, detail: String) -> CollabError {
    const CREDENTIAL_MARKERS: &[&str] = &[
        "ExpiredToken",
        "InvalidAccessKeyId",
        "SignatureDoesNotMatch",
        "AccessDenied",
        "Unable to locate credentials",
    ];
    const CONNECTIVITY_MARKERS: &[&str] = &["Could not connect", "EndpointConnectionError", "Connect timeout", "NoSuchBucket"];

    if CREDENTIAL_MARKERS.iter().any(|m| stderr.contains(m)) {
        CollabError::Credentials(detail)
    } else if CONNECTIVITY_MARKERS.iter().any(|m| stderr.contains(m)) {
        CollabError::Unavailable { service: SERVICE, detail }
    } else {
        CollabError::Malformed { service: SERVICE, detail }
    }
}

impl LogBucket for AwsCliBucket {
    fn list_objects(&self, ctx: &RunContext) -> Result<ListingSnapshot, CollabError> {
        let args = self.with_region(vec!["s3api", "list-objects-v2", "--bucket", self.bucket.as_str(), "--output", "json"]);
        let out = run(SERVICE, &self.command, &args, &ctx.credentials, &[])?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(match classify_aws_failure(&stderr, describe_failure(&self.command, &args, &out)) {
                CollabError::Malformed { detail, .. } => CollabError::Unavailable { service: SERVICE, detail },
                other => other,
            });
        }
        // An empty bucket produces no output at all.
        ListingSnapshot::from_json_slice(&out.stdout)
            .map_err(|e| CollabError::Malformed { service: SERVICE, detail: e.to_string() })
    }

    fn download_matching(
        &self,
        ctx: &RunContext,
        prefix: &str,
        pattern: &str,
        dest: &Path,
    ) -> Result<Vec<PathBuf>, CollabError> {
        let source = format!("s3://{}/{}", self.bucket, prefix);
        let dest_str = dest.to_string_lossy();
        let args = self.with_region(vec![
            "s3",
            "cp",
            source.as_str(),
            dest_str.as_ref(),
            "--recursive",
            "--only-show-errors",
            "--exclude",
            "*",
            "--include",
            pattern,
        ]);
        let out = run(SERVICE, &self.command, &args, &ctx.credentials, &[])?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(classify_aws_failure(&stderr, describe_failure(&self.command, &args, &out)));
        }

        let mut written = Vec::new();
        if dest.is_dir() {
            for entry in WalkDir::new(dest).sort_by_file_name() {
                let entry = entry.map_err(|e| CollabError::Io(e.into()))?;
                if entry.file_type().is_file() {
                    written.push(entry.into_path());
                }
            }
        }
        debug!(%source, files = written.len(), "downloaded verifier logs");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_are_fatal() {
        let err = classify_aws_failure("An error occurred (ExpiredToken) when calling ...", "x".into());
        assert!(matches!(err, CollabError::Credentials(_)));
    }

    #[test]
    fn connectivity_errors_are_fatal() {
        let err = classify_aws_failure("Could not connect to the endpoint URL", "x".into());
        assert!(err.is_run_fatal());
    }

    #[test]
    fn other_failures_degrade() {
        let err = classify_aws_failure("fatal error: something odd", "x".into());
        assert!(!err.is_run_fatal());
    }

    #[cfg(unix)]
    mod with_fake_cli {
        use super::*;
        use std::fs;
        use tempfile::tempdir;
        use vlr_collab::Credentials;

        const FAKE_AWS: &str = r#"
case "$1" in
  s3api)
    printf '%s' '{"Contents":[{"Key":"c1/verifier.log","Size":4},{"Key":"c2/log.txt","Size":1}]}'
    ;;
  s3)
    dest="$4"
    mkdir -p "$dest"
    printf 'All tests passed!' > "$dest/verifier.log"
    ;;
esac
"#;

        fn bucket(dir: &Path) -> AwsCliBucket {
            let script = dir.join("aws.sh");
            fs::write(&script, FAKE_AWS).unwrap();
            AwsCliBucket::new(vec!["sh".into(), script.to_string_lossy().into_owned()], "logs", None)
        }

        #[test]
        fn lists_objects_from_cli_output() {
            let dir = tempdir().unwrap();
            let snap = bucket(dir.path()).list_objects(&RunContext::new(Credentials::ambient())).unwrap();
            assert_eq!(snap.keys().collect::<Vec<_>>(), vec!["c1/verifier.log", "c2/log.txt"]);
        }

        #[test]
        fn reports_downloaded_files() {
            let dir = tempdir().unwrap();
            let dest = dir.path().join("stage");
            let written = bucket(dir.path())
                .download_matching(&RunContext::new(Credentials::ambient()), "c1/", "*verifier*", &dest)
                .unwrap();
            assert_eq!(written, vec![dest.join("verifier.log")]);
        }
    }
}
