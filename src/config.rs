use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{error::AppError, profile::Profile, validation::validate_profile};

/// Config directory under the user's home
const CONFIG_DIR: &[&str] = &[".config", "ctx"];
/// Config file name inside the config directory
const CONFIG_FILE: &str = "config.toml";
/// Cache file name, kept next to the config file
const CACHE_FILE: &str = "cache.json";
/// Hex characters of the SHA-256 digest kept as the fingerprint
const FINGERPRINT_LENGTH: usize = 16;

const DEFAULT_CACHE_TTL_DAYS: u32 = 90;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CLONE_TIMEOUT_SECS: u64 = 600;
const DEFAULT_GITHUB_HOST: &str = "github.com";

/// Read access to the configured profiles
pub trait ProfileStore {
    /// Looks up a profile by exact name
    fn profile(&self, name: &str) -> Option<&Profile>;
    /// Names of profiles listing `owner`, sorted by name
    fn match_owner(&self, owner: &str) -> Vec<String>;
    /// All profiles, sorted by name
    fn profiles(&self) -> Vec<&Profile>;
    /// Stable digest of every profile and field
    fn fingerprint(&self) -> String;
}

/// Top-level `config.toml`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Profile used by `status` when a repository has no marker
    #[serde(default)]
    pub default_profile: Option<String>,
    /// Offer an interactive choice when several profiles can push
    #[serde(default = "default_true")]
    pub prompt_on_ambiguous: bool,
    /// Install the pre-push guard on clone/init
    #[serde(default = "default_true")]
    pub require_push_guard: bool,
    /// Keep HTTPS origins instead of rewriting them to SSH
    #[serde(default)]
    pub allow_https_managed_repo: bool,
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: u32,
    /// Upper bound for `gh`/`git` calls other than clone
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_clone_timeout_secs")]
    pub clone_timeout_secs: u64,
    /// Host passed to `gh api --hostname`
    #[serde(default = "default_github_host")]
    pub github_host: String,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

fn default_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_days() -> u32 {
    DEFAULT_CACHE_TTL_DAYS
}

fn default_command_timeout_secs() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

fn default_clone_timeout_secs() -> u64 {
    DEFAULT_CLONE_TIMEOUT_SECS
}

fn default_github_host() -> String {
    DEFAULT_GITHUB_HOST.to_string()
}

impl Config {
    /// Loads and validates the config file
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Err(AppError::Config(format!(
                "config file {} not found",
                path.display()
            )));
        }
        warn_if_shared(path);

        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;
        debug!(path = %path.display(), profiles = config.profiles.len(), "loaded config");
        Ok(config)
    }

    /// Parses, normalizes and validates config text
    pub fn from_toml(contents: &str) -> Result<Self, AppError> {
        let mut config: Config = toml::from_str(contents)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Fills profile names from table keys and expands `~` in paths
    fn normalize(&mut self) {
        for (name, profile) in self.profiles.iter_mut() {
            profile.name = name.clone();
            profile.gh_config_dir = expand_home(&profile.gh_config_dir);
        }
        if self.cache_ttl_days == 0 {
            self.cache_ttl_days = DEFAULT_CACHE_TTL_DAYS;
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.profiles.is_empty() {
            return Err(AppError::Config("no profiles defined".to_string()));
        }
        for profile in self.profiles.values() {
            validate_profile(profile)?;
        }
        if let Some(default) = &self.default_profile {
            if !self.profiles.contains_key(default) {
                return Err(AppError::Config(format!(
                    "default_profile '{default}' is not a configured profile"
                )));
            }
        }
        Ok(())
    }

    /// Looks up a profile, failing with a config error when absent
    pub fn get_profile(&self, name: &str) -> Result<&Profile, AppError> {
        self.profiles
            .get(name)
            .ok_or_else(|| AppError::UnknownProfile(name.to_string()))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.clone_timeout_secs)
    }
}

impl ProfileStore for Config {
    fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    fn match_owner(&self, owner: &str) -> Vec<String> {
        // BTreeMap iteration is already sorted by name
        self.profiles
            .values()
            .filter(|profile| profile.owns(owner))
            .map(|profile| profile.name.clone())
            .collect()
    }

    fn profiles(&self) -> Vec<&Profile> {
        self.profiles.values().collect()
    }

    fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, profile) in &self.profiles {
            // Length-prefixed fields keep adjacent values from running together
            let owners = profile.owners.join("\u{1f}");
            let dir = profile.gh_config_dir.to_string_lossy();
            let fields: [&str; 7] = [
                name.as_str(),
                dir.as_ref(),
                profile.ssh_host.as_str(),
                profile.git_name.as_str(),
                profile.git_email.as_str(),
                profile.email_domain.as_deref().unwrap_or_default(),
                owners.as_str(),
            ];
            for field in fields {
                hasher.update((field.len() as u64).to_le_bytes());
                hasher.update(field.as_bytes());
            }
        }
        let digest = hex::encode(hasher.finalize());
        digest[..FINGERPRINT_LENGTH].to_string()
    }
}

/// Default config file path (`~/.config/ctx/config.toml`)
pub fn default_config_path() -> Result<PathBuf, AppError> {
    let home_dir: PathBuf = dirs::home_dir()
        .ok_or_else(|| AppError::Config("failed to find the home directory".to_string()))?;
    let mut path = home_dir;
    for part in CONFIG_DIR {
        path.push(part);
    }
    path.push(CONFIG_FILE);
    Ok(path)
}

/// Cache file path for a given config file
pub fn cache_path_for(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(|dir| dir.join(CACHE_FILE))
        .unwrap_or_else(|| PathBuf::from(CACHE_FILE))
}

/// Expands a leading `~` to the home directory
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(unix)]
fn warn_if_shared(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = fs::metadata(path) {
        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            warn!(path = %path.display(), mode = %format!("{mode:o}"), "config file is readable by other users, expected 0600");
        }
    }
}

#[cfg(not(unix))]
fn warn_if_shared(_path: &Path) {}
