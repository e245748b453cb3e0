//! Decides which profile owns a repository.
//!
//! Stages run in a fixed order and the first one that produces a profile
//! wins: explicit flag, cache, owner rule, permission probe. When the probe
//! finds several pushable profiles the pipeline stops with
//! [`AppError::Ambiguous`]; choosing between them is left to the caller.

use std::{collections::BTreeMap, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{cache::ResolutionCache, config::ProfileStore, error::AppError, probe::PermissionProbe};

/// Why a profile was chosen
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Explicit,
    Cache,
    OwnerRule,
    Probe,
    /// Picked interactively after an ambiguous probe
    UserSelect,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Reason::Explicit => "explicit",
            Reason::Cache => "cache",
            Reason::OwnerRule => "owner_rule",
            Reason::Probe => "probe",
            Reason::UserSelect => "user_select",
        };
        f.write_str(text)
    }
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub profile: String,
    pub reason: Reason,
}

impl Resolution {
    pub fn new(profile: &str, reason: Reason) -> Self {
        Self {
            profile: profile.to_string(),
            reason,
        }
    }

    /// Whether this outcome should be written back to the cache
    pub fn is_cacheable(&self) -> bool {
        self.reason != Reason::Cache
    }
}

/// Profile resolution pipeline
///
/// Holds only borrowed, read-only state; callers persist results.
pub struct Resolver<'a> {
    store: &'a dyn ProfileStore,
    cache: &'a ResolutionCache,
    prober: &'a dyn PermissionProbe,
    ttl_days: u32,
}

impl<'a> Resolver<'a> {
    pub fn new(
        store: &'a dyn ProfileStore,
        cache: &'a ResolutionCache,
        prober: &'a dyn PermissionProbe,
        ttl_days: u32,
    ) -> Self {
        Self {
            store,
            cache,
            prober,
            ttl_days,
        }
    }

    /// Resolves the profile for `owner_repo`
    ///
    /// An empty `explicit` is treated as absent.
    pub fn resolve(&self, owner_repo: &str, explicit: Option<&str>) -> Result<Resolution, AppError> {
        if let Some(name) = explicit.filter(|name| !name.is_empty()) {
            return self.resolve_explicit(name);
        }

        let fingerprint = self.store.fingerprint();
        if let Some(entry) = self.cache.lookup(owner_repo, &fingerprint, self.ttl_days) {
            debug!(owner_repo, profile = %entry.profile, "resolved from cache");
            return Ok(Resolution::new(&entry.profile, Reason::Cache));
        }

        let owner = owner_repo.split('/').next().unwrap_or_default();
        let matches = self.store.match_owner(owner);
        if let [profile] = matches.as_slice() {
            debug!(owner_repo, profile = %profile, "resolved by owner rule");
            return Ok(Resolution::new(profile, Reason::OwnerRule));
        }
        debug!(owner_repo, matches = matches.len(), "owner rule inconclusive, probing");

        self.resolve_by_probe(owner_repo)
    }

    fn resolve_explicit(&self, name: &str) -> Result<Resolution, AppError> {
        match self.store.profile(name) {
            Some(profile) => Ok(Resolution::new(&profile.name, Reason::Explicit)),
            None => Err(AppError::UnknownProfile(name.to_string())),
        }
    }

    fn resolve_by_probe(&self, owner_repo: &str) -> Result<Resolution, AppError> {
        let (owner, repo) = split_owner_repo(owner_repo)?;
        let identities: BTreeMap<String, PathBuf> = self
            .store
            .profiles()
            .into_iter()
            .map(|profile| (profile.name.clone(), profile.gh_config_dir.clone()))
            .collect();

        let results = self.prober.probe_all(owner, repo, &identities)?;
        let pushable: Vec<String> = results
            .into_iter()
            .filter(|result| result.can_push)
            .map(|result| result.profile)
            .collect();

        match pushable.as_slice() {
            [] => Err(AppError::AuthFailure(owner_repo.to_string())),
            [profile] => {
                debug!(owner_repo, profile = %profile, "resolved by probe");
                Ok(Resolution::new(profile, Reason::Probe))
            }
            _ => Err(AppError::Ambiguous {
                owner_repo: owner_repo.to_string(),
                candidates: pushable,
            }),
        }
    }
}

/// Splits `owner/repo`, rejecting empty halves
pub fn split_owner_repo(owner_repo: &str) -> Result<(&str, &str), AppError> {
    match owner_repo.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => Ok((owner, repo)),
        _ => Err(AppError::InvalidRepo(owner_repo.to_string())),
    }
}
