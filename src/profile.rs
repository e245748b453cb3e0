use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A named GitHub identity read from the `[profiles.<name>]` config table
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Profile name, taken from the table key
    #[serde(skip)]
    pub name: String,
    /// `gh` config directory holding this identity's credentials
    pub gh_config_dir: PathBuf,
    /// SSH host alias from `~/.ssh/config` (e.g. `github-work`)
    pub ssh_host: String,
    /// Commit author name (user.name)
    pub git_name: String,
    /// Commit author email (user.email)
    pub git_email: String,
    /// Domain `git_email` must belong to, when set
    #[serde(default)]
    pub email_domain: Option<String>,
    /// GitHub owners (users or orgs) this profile is responsible for
    #[serde(default)]
    pub owners: Vec<String>,
}

impl Profile {
    /// Whether `owner` is listed for this profile
    pub fn owns(&self, owner: &str) -> bool {
        self.owners.iter().any(|candidate| candidate == owner)
    }
}
