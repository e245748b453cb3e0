use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use tracing::debug;

use crate::{
    error::AppError,
    exec::{CREDENTIAL_ENV_VARS, CommandOutput, CommandRunner, EnvOverrides},
};

/// Variable pointing `gh` at a profile's credential directory
const GH_CONFIG_DIR_ENV: &str = "GH_CONFIG_DIR";
/// Response fragments `gh api` prints when an identity cannot see a repository
const NO_ACCESS_MARKERS: [&str; 6] = [
    "HTTP 404",
    "HTTP 403",
    "HTTP 401",
    "Not Found",
    "Forbidden",
    "Bad credentials",
];

/// Access one profile has to one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub profile: String,
    pub has_access: bool,
    pub can_push: bool,
}

/// Live authorization check across profiles
pub trait PermissionProbe {
    /// Probes `owner/repo` once per entry of `identities` (profile → credential dir)
    ///
    /// Results come back in profile-name order. The first infrastructure
    /// failure aborts the batch.
    fn probe_all(
        &self,
        owner: &str,
        repo: &str,
        identities: &BTreeMap<String, PathBuf>,
    ) -> Result<Vec<ProbeResult>, AppError>;
}

#[derive(Deserialize)]
struct RepoResponse {
    #[serde(default)]
    permissions: Option<Permissions>,
}

#[derive(Deserialize, Default)]
struct Permissions {
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    maintain: bool,
    #[serde(default)]
    push: bool,
}

/// Probes access with `gh api repos/<owner>/<repo>`
pub struct GhProber<'a> {
    runner: &'a dyn CommandRunner,
    hostname: String,
}

impl<'a> GhProber<'a> {
    pub fn new(runner: &'a dyn CommandRunner, hostname: &str) -> Self {
        Self {
            runner,
            hostname: hostname.to_string(),
        }
    }

    /// Environment for one probe: the profile's credential dir, no ambient tokens
    fn probe_env(gh_config_dir: &Path) -> EnvOverrides {
        let mut env: EnvOverrides = CREDENTIAL_ENV_VARS
            .into_iter()
            .map(|key| (key.to_string(), None))
            .collect();
        env.insert(
            GH_CONFIG_DIR_ENV.to_string(),
            Some(gh_config_dir.to_string_lossy().into_owned()),
        );
        env
    }

    /// Checks a single identity's access to `owner/repo`
    pub fn probe_repo(
        &self,
        profile: &str,
        gh_config_dir: &Path,
        owner: &str,
        repo: &str,
    ) -> Result<ProbeResult, AppError> {
        let endpoint = format!("repos/{owner}/{repo}");
        let env = Self::probe_env(gh_config_dir);
        let output = self
            .runner
            .run_with_env("gh", &["api", &endpoint, "--hostname", &self.hostname], &env)
            .map_err(|err| probe_error(profile, err.to_string()))?;

        let result = classify(profile, &output)?;
        debug!(
            profile,
            owner,
            repo,
            has_access = result.has_access,
            can_push = result.can_push,
            "probed repository access"
        );
        Ok(result)
    }
}

impl PermissionProbe for GhProber<'_> {
    fn probe_all(
        &self,
        owner: &str,
        repo: &str,
        identities: &BTreeMap<String, PathBuf>,
    ) -> Result<Vec<ProbeResult>, AppError> {
        identities
            .iter()
            .map(|(profile, dir)| self.probe_repo(profile, dir, owner, repo))
            .collect()
    }
}

/// Turns a `gh api` result into access flags or an infrastructure error
fn classify(profile: &str, output: &CommandOutput) -> Result<ProbeResult, AppError> {
    if !output.success() {
        let combined = output.combined();
        if NO_ACCESS_MARKERS.iter().any(|marker| combined.contains(marker)) {
            return Ok(ProbeResult {
                profile: profile.to_string(),
                has_access: false,
                can_push: false,
            });
        }
        let message = combined.trim();
        return Err(probe_error(
            profile,
            if message.is_empty() {
                format!("gh exited with {:?}", output.code)
            } else {
                message.to_string()
            },
        ));
    }

    let response: RepoResponse = serde_json::from_str(&output.stdout)
        .map_err(|err| probe_error(profile, format!("malformed gh response: {err}")))?;
    let permissions = response.permissions.unwrap_or_default();
    Ok(ProbeResult {
        profile: profile.to_string(),
        has_access: true,
        can_push: permissions.push || permissions.maintain || permissions.admin,
    })
}

fn probe_error(profile: &str, message: String) -> AppError {
    AppError::Probe {
        profile: profile.to_string(),
        message,
    }
}
