use std::process::{Command, Output};

use tracing::debug;
use vlr_collab::{CollabError, Credentials};

/// Run `command` (program plus leading arguments) followed by `args`, with
/// the run's credentials layered over the inherited environment.
///
/// Only a failure to spawn is an error here; callers inspect the exit status
/// and decide what a non-zero exit means for their service.
pub fn run(
    service: &'static str,
    command: &[String],
    args: &[&str],
    credentials: &Credentials,
    extra_env: &[(&str, &str)],
) -> Result<Output, CollabError> {
    let Some((program, leading)) = command.split_first() else {
        return Err(CollabError::Unavailable { service, detail: "no command configured".into() });
    };
    let mut cmd = Command::new(program);
    cmd.args(leading).args(args).envs(credentials.env()).envs(extra_env.iter().copied());
    debug!(service, %program, ?args, "running collaborator command");
    cmd.output()
        .map_err(|e| CollabError::Unavailable { service, detail: format!("run {program} {args:?}: {e}") })
}

pub fn describe_failure(command: &[String], args: &[&str], out: &Output) -> String {
    format!(
        "command failed ({}): {:?} {:?}\nstderr:{}",
        out.status,
        command,
        args,
        String::from_utf8_lossy(&out.stderr).trim()
    )
}
