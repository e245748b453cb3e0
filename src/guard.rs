//! Push-time integrity check for ctx-managed repositories.
//!
//! A repository is bound to a profile by a marker file written after
//! resolution. The guard compares the working copy's origin host alias and
//! commit identity against that profile, collecting every violation in one
//! pass.

use std::{
    fmt, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    error::AppError,
    exec::{AmbientEnv, CommandRunner, SKIP_GUARD_ENV},
    git::{GitAdapter, ssh_host_of},
    profile::Profile,
};

/// Marker file holding the resolved profile name, relative to the repo root
pub const MARKER_PATH: &str = ".git/ctx-profile";
/// Pre-push hook path, relative to the repo root
const HOOK_PATH: &str = ".git/hooks/pre-push";
const HOOK_START: &str = "# ctx-guard-start";
const HOOK_END: &str = "# ctx-guard-end";
const HOOK_SHEBANG: &str = "#!/bin/sh";
const HOOK_BLOCK: &str = "# ctx-guard-start
# Installed by ctx. Remove with 'ctx guard uninstall'.
if ! command -v ctx >/dev/null 2>&1; then
  echo \"ctx: command not found, skipping guard check\" >&2
  exit 0
fi
ctx guard check || exit 1
# ctx-guard-end";

/// Field a violation refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    RemoteHost,
    UserEmail,
    UserName,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::RemoteHost => "remote_host",
            Field::UserEmail => "user_email",
            Field::UserName => "user_name",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}

/// One mismatch between the repository and its profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: Field,
    pub expected: String,
    pub actual: String,
    pub severity: Severity,
}

/// Result of a guard check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckResult {
    /// True iff there are no error-severity violations
    pub pass: bool,
    /// True when the check was bypassed
    pub skipped: bool,
    pub violations: Vec<Violation>,
}

impl CheckResult {
    fn skipped() -> Self {
        Self {
            pass: true,
            skipped: true,
            violations: Vec::new(),
        }
    }

    fn from_violations(violations: Vec<Violation>) -> Self {
        let pass = violations.iter().all(|v| v.severity != Severity::Error);
        Self {
            pass,
            skipped: false,
            violations,
        }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.severity == Severity::Warning)
    }
}

/// Checks `repo_dir` against `profile`
pub fn check(
    repo_dir: &Path,
    profile: &Profile,
    runner: &dyn CommandRunner,
    ambient: &AmbientEnv,
) -> Result<CheckResult, AppError> {
    if ambient.skip_guard {
        warn!(repo = %repo_dir.display(), "{SKIP_GUARD_ENV}=1, guard check bypassed");
        return Ok(CheckResult::skipped());
    }

    let git = GitAdapter::new(runner);
    let mut violations = Vec::new();

    let remote = git.remote_url(repo_dir, "origin")?;
    // HTTPS remotes carry no host alias to compare
    if let Some(actual_host) = ssh_host_of(&remote) {
        if actual_host != profile.ssh_host {
            violations.push(Violation {
                field: Field::RemoteHost,
                expected: profile.ssh_host.clone(),
                actual: actual_host.to_string(),
                severity: Severity::Error,
            });
        }
    } else {
        debug!(remote = %remote, "origin is not an SSH remote, host check skipped");
    }

    let email = git.local_config(repo_dir, "user.email")?.unwrap_or_default();
    if email != profile.git_email {
        violations.push(Violation {
            field: Field::UserEmail,
            expected: profile.git_email.clone(),
            actual: email,
            severity: Severity::Error,
        });
    }

    let name = git.local_config(repo_dir, "user.name")?.unwrap_or_default();
    if name != profile.git_name {
        violations.push(Violation {
            field: Field::UserName,
            expected: profile.git_name.clone(),
            actual: name,
            severity: Severity::Warning,
        });
    }

    let result = CheckResult::from_violations(violations);
    debug!(
        repo = %repo_dir.display(),
        profile = %profile.name,
        pass = result.pass,
        violations = result.violations.len(),
        "guard check finished"
    );
    Ok(result)
}

/// Writes the profile marker for a repository
pub fn write_marker(repo_dir: &Path, profile: &str) -> Result<(), AppError> {
    let path = repo_dir.join(MARKER_PATH);
    fs::write(&path, format!("{profile}\n"))?;
    Ok(())
}

/// Reads the profile marker, failing when the repository is not managed
pub fn read_marker(repo_dir: &Path) -> Result<String, AppError> {
    let path = repo_dir.join(MARKER_PATH);
    match fs::read_to_string(&path) {
        Ok(contents) => {
            let name = contents.trim();
            if name.is_empty() {
                return Err(AppError::Config(format!("{} is empty", path.display())));
            }
            Ok(name.to_string())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Err(AppError::NotManaged(repo_dir.to_path_buf())),
        Err(err) => Err(AppError::Io(err)),
    }
}

fn hook_path(repo_dir: &Path) -> PathBuf {
    repo_dir.join(HOOK_PATH)
}

/// Adds the guard block to the pre-push hook, keeping any existing content
///
/// Returns false when the block was already present.
pub fn install_hook(repo_dir: &Path) -> Result<bool, AppError> {
    let path = hook_path(repo_dir);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let existing = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
        Err(err) => return Err(AppError::Io(err)),
    };
    if existing.contains(HOOK_START) {
        return Ok(false);
    }

    let contents = if existing.trim().is_empty() {
        format!("{HOOK_SHEBANG}\n{HOOK_BLOCK}\n")
    } else {
        format!("{}\n{HOOK_BLOCK}\n", existing.trim_end())
    };
    fs::write(&path, contents)?;
    make_executable(&path)?;
    debug!(path = %path.display(), "installed pre-push guard");
    Ok(true)
}

/// Removes the guard block, deleting the hook if nothing else remains
///
/// Returns false when there was no block to remove.
pub fn uninstall_hook(repo_dir: &Path) -> Result<bool, AppError> {
    let path = hook_path(repo_dir);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(AppError::Io(err)),
    };

    let (Some(start), Some(end)) = (contents.find(HOOK_START), contents.find(HOOK_END)) else {
        return Ok(false);
    };
    if end < start {
        return Ok(false);
    }

    let remaining = format!("{}{}", &contents[..start], &contents[end + HOOK_END.len()..]);
    let remaining = remaining.trim();
    if remaining.is_empty() || remaining == HOOK_SHEBANG {
        fs::remove_file(&path)?;
    } else {
        fs::write(&path, format!("{remaining}\n"))?;
        make_executable(&path)?;
    }
    debug!(path = %path.display(), "removed pre-push guard");
    Ok(true)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), AppError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), AppError> {
    Ok(())
}
