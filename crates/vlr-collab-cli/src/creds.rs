use serde::Deserialize;
use tracing::info;
use vlr_collab::{CollabError, CredentialProvider, Credentials};

use crate::exec::{describe_failure, run};

const SERVICE: &str = "credentials";

/// Runs a command that prints short-lived AWS credentials as JSON.
///
/// Both `aws sts assume-role` output (`{"Credentials": {...}}`) and the flat
/// `credential_process` shape are accepted.
#[derive(Clone, Debug)]
pub struct CommandCredentialProvider {
    pub command: Vec<String>,
}

impl CommandCredentialProvider {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    session_token: Option<String>,
    #[serde(default)]
    expiration: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CredentialsRepr {
    Wrapped {
        #[serde(rename = "Credentials")]
        credentials: AwsCredentials,
    },
    Flat(AwsCredentials),
}

pub fn parse_credentials(bytes: &[u8]) -> Result<Credentials, CollabError> {
    let repr: CredentialsRepr = serde_json::from_slice(bytes)
        .map_err(|e| CollabError::Credentials(format!("unrecognised credential output: {e}")))?;
    let (CredentialsRepr::Wrapped { credentials: aws } | CredentialsRepr::Flat(aws)) = repr;
    let mut creds = Credentials::ambient()
        .with_env("AWS_ACCESS_KEY_ID", aws.access_key_id)
        .with_env("AWS_SECRET_ACCESS_KEY", aws.secret_access_key);
    if let Some(token) = aws.session_token {
        creds = creds.with_env("AWS_SESSION_TOKEN", token);
    }
    creds.expires_at = aws.expiration;
    Ok(creds)
}

impl CredentialProvider for CommandCredentialProvider {
    fn credentials(&self) -> Result<Credentials, CollabError> {
        let out = run(SERVICE, &self.command, &[], &Credentials::ambient(), &[])
            .map_err(|e| CollabError::Credentials(e.to_string()))?;
        if !out.status.success() {
            return Err(CollabError::Credentials(describe_failure(&self.command, &[], &out)));
        }
        let creds = parse_credentials(&out.stdout)?;
        info!(expires_at = creds.expires_at.as_deref().unwrap_or("unknown"), "obtained run credentials");
        Ok(creds)
    }
}

/// No credential command configured: collaborators use whatever the process
/// environment already provides.
#[derive(Clone, Copy, Debug, Default)]
pub struct AmbientCredentials;

impl CredentialProvider for AmbientCredentials {
    fn credentials(&self) -> Result<Credentials, CollabError> {
        Ok(Credentials::ambient())
    }
}
