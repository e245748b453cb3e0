use std::path::Path;

use crate::{error::AppError, exec::CommandRunner, resolver::split_owner_repo};

/// Parsed `owner/repo` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// Parses SSH, `ssh://`, HTTP(S) and `owner/repo` shorthand references
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::InvalidRepo(raw.to_string()));
        }

        let path = if let Some(rest) = raw.strip_prefix("ssh://") {
            // ssh://git@host[:port]/owner/repo
            rest.split_once('/').map(|(_, path)| path)
        } else if let Some(rest) = raw.strip_prefix("https://").or_else(|| raw.strip_prefix("http://")) {
            rest.split_once('/').map(|(_, path)| path)
        } else if raw.starts_with("git@") {
            raw.split_once(':').map(|(_, path)| path)
        } else {
            Some(raw)
        };

        let path = path.ok_or_else(|| AppError::InvalidRepo(raw.to_string()))?;
        let path = path.trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let (owner, repo) = split_owner_repo(path).map_err(|_| AppError::InvalidRepo(raw.to_string()))?;
        if repo.contains('/') {
            return Err(AppError::InvalidRepo(raw.to_string()));
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// Cache key and display form
    pub fn owner_repo(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// SSH remote routed through a profile's host alias
    pub fn ssh_url(&self, ssh_host: &str) -> String {
        format!("git@{}:{}/{}.git", ssh_host, self.owner, self.repo)
    }
}

/// Checks if a remote URL uses HTTP(S)
pub fn is_https_remote(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

/// Host alias of an SSH remote, `None` for other schemes
pub fn ssh_host_of(url: &str) -> Option<&str> {
    if let Some(rest) = url.strip_prefix("ssh://") {
        let authority = rest.split('/').next()?;
        let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
        let host = host.split(':').next()?;
        return (!host.is_empty()).then_some(host);
    }
    let (user_host, _) = url.split_once(':')?;
    // scp-style remotes have no path before the colon
    if url.contains("://") || user_host.contains('/') {
        return None;
    }
    let host = user_host.rsplit_once('@').map_or(user_host, |(_, host)| host);
    (!host.is_empty()).then_some(host)
}

/// Git operations run through a [`CommandRunner`]
pub struct GitAdapter<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> GitAdapter<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Runs git and returns trimmed stdout, failing on non-zero exit
    fn git(&self, args: &[&str]) -> Result<String, AppError> {
        let output = self.runner.run("git", args)?;
        if !output.success() {
            return Err(AppError::GitCommand(output.stderr.trim().to_string()));
        }
        Ok(output.stdout.trim().to_string())
    }

    /// Clones `url` into `dir`
    pub fn clone_repo(&self, url: &str, dir: &Path) -> Result<(), AppError> {
        let dir = dir.to_string_lossy();
        self.git(&["clone", url, &dir])?;
        Ok(())
    }

    /// Top-level directory of the repository containing `dir`
    pub fn toplevel(&self, dir: &Path) -> Result<String, AppError> {
        let dir = dir.to_string_lossy();
        self.git(&["-C", &dir, "rev-parse", "--show-toplevel"])
    }

    /// URL of a named remote
    pub fn remote_url(&self, repo_dir: &Path, remote: &str) -> Result<String, AppError> {
        let dir = repo_dir.to_string_lossy();
        self.git(&["-C", &dir, "remote", "get-url", remote])
    }

    pub fn set_remote_url(&self, repo_dir: &Path, remote: &str, url: &str) -> Result<(), AppError> {
        let dir = repo_dir.to_string_lossy();
        self.git(&["-C", &dir, "remote", "set-url", remote, url])?;
        Ok(())
    }

    /// Repository-local config value, `None` when the key is unset
    pub fn local_config(&self, repo_dir: &Path, key: &str) -> Result<Option<String>, AppError> {
        let dir = repo_dir.to_string_lossy();
        let output = self.runner.run("git", &["-C", &dir, "config", "--local", key])?;
        match output.code {
            Some(0) => Ok(Some(output.stdout.trim().to_string())),
            // git config exits 1 when the key is not set
            Some(1) if output.stderr.trim().is_empty() => Ok(None),
            _ => Err(AppError::GitCommand(output.stderr.trim().to_string())),
        }
    }

    /// Executes a Git config set command in the repository
    pub fn set_local_config(&self, repo_dir: &Path, key: &str, value: &str) -> Result<(), AppError> {
        let dir = repo_dir.to_string_lossy();
        self.git(&["-C", &dir, "config", "--local", key, value])?;
        Ok(())
    }
}
