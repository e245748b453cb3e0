use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use colored::Colorize;
use tracing::{info, warn};

use crate::{
    cache::{CacheEntry, ResolutionCache},
    cli::{CacheCommands, Commands, GuardCommands, ResolveArgs},
    config::{Config, ProfileStore, cache_path_for},
    error::AppError,
    exec::{AmbientEnv, CommandRunner, SystemRunner},
    git::{GitAdapter, RepoRef, is_https_remote, ssh_host_of},
    guard::{self, Severity},
    menu,
    probe::GhProber,
    resolver::{Resolution, Resolver},
};

/// Timeout for git calls made before the config is loaded
const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a command needs from the outside world
pub struct App<'a> {
    pub config_path: PathBuf,
    /// Directory the command runs in
    pub cwd: PathBuf,
    pub ambient: AmbientEnv,
    /// Whether ambiguous resolutions may prompt
    pub interactive: bool,
    runner: Option<&'a dyn CommandRunner>,
}

impl<'a> App<'a> {
    /// App that spawns real processes
    pub fn new(config_path: PathBuf, cwd: PathBuf, ambient: AmbientEnv, interactive: bool) -> Self {
        Self {
            config_path,
            cwd,
            ambient,
            interactive,
            runner: None,
        }
    }

    /// App that sends every external command to `runner`
    pub fn with_runner(
        config_path: PathBuf,
        cwd: PathBuf,
        ambient: AmbientEnv,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            config_path,
            cwd,
            ambient,
            interactive: false,
            runner: Some(runner),
        }
    }

    /// Dispatches a parsed command
    pub fn run(&self, command: Commands) -> Result<(), AppError> {
        match command {
            Commands::Clone { repo, dir, resolve } => self.clone_repo(&repo, dir.as_deref(), &resolve),
            Commands::Init { resolve } => self.init_repo(&resolve),
            Commands::Status => self.show_status(),
            Commands::Profiles => self.list_profiles(),
            Commands::Guard { command } => match command {
                GuardCommands::Check => self.guard_check(),
                GuardCommands::Install => self.guard_install(),
                GuardCommands::Uninstall => self.guard_uninstall(),
            },
            Commands::Cache { command } => match command {
                CacheCommands::List => self.cache_list(),
                CacheCommands::Invalidate { profile } => self.cache_invalidate(&profile),
                CacheCommands::Clear => self.cache_clear(),
            },
        }
    }

    fn using_runner<T>(
        &self,
        timeout: Duration,
        f: impl FnOnce(&dyn CommandRunner) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        match self.runner {
            Some(runner) => f(runner),
            None => f(&SystemRunner::new(timeout)),
        }
    }

    fn load_config(&self) -> Result<Config, AppError> {
        Config::load(&self.config_path)
    }

    fn cache_path(&self) -> PathBuf {
        cache_path_for(&self.config_path)
    }

    /// Root of the repository containing the working directory
    fn repo_root(&self) -> Result<PathBuf, AppError> {
        self.using_runner(BOOTSTRAP_TIMEOUT, |runner| {
            let git = GitAdapter::new(runner);
            Ok(PathBuf::from(git.toplevel(&self.cwd)?))
        })
    }

    /// Runs the resolver, offering a choice when it is ambiguous and allowed to
    fn resolve(
        &self,
        config: &Config,
        cache: &ResolutionCache,
        runner: &dyn CommandRunner,
        owner_repo: &str,
        explicit: Option<&str>,
    ) -> Result<Resolution, AppError> {
        let prober = GhProber::new(runner, &config.github_host);
        let resolver = Resolver::new(config, cache, &prober, config.cache_ttl_days);
        match resolver.resolve(owner_repo, explicit) {
            Err(AppError::Ambiguous {
                owner_repo,
                candidates,
            }) if config.prompt_on_ambiguous && self.interactive => {
                menu::select_profile(&owner_repo, &candidates)
            }
            other => other,
        }
    }

    /// Stores a fresh resolution; cache failures never fail the command
    fn remember(&self, cache: &mut ResolutionCache, config: &Config, owner_repo: &str, resolution: &Resolution) {
        if !resolution.is_cacheable() {
            return;
        }
        cache.set(
            owner_repo,
            CacheEntry::now(&resolution.profile, resolution.reason, &config.fingerprint()),
        );
        if let Err(err) = cache.save(&self.cache_path()) {
            warn!(error = %err, "failed to save resolution cache");
        }
    }

    /// Installs the guard unless disabled; failures only warn
    fn install_guard_if_required(&self, config: &Config, repo_dir: &Path, args: &ResolveArgs) {
        if args.no_guard || !config.require_push_guard {
            return;
        }
        match guard::install_hook(repo_dir) {
            Ok(_) => info!(repo = %repo_dir.display(), "pre-push guard installed"),
            Err(err) => {
                println!("{} {}", "could not install pre-push guard:".yellow(), err);
            }
        }
    }

    /// Points a working copy at a profile's identity
    fn apply_identity(git: &GitAdapter<'_>, repo_dir: &Path, config: &Config, profile: &str) -> Result<(), AppError> {
        let profile = config.get_profile(profile)?;
        git.set_local_config(repo_dir, "user.name", &profile.git_name)?;
        git.set_local_config(repo_dir, "user.email", &profile.git_email)?;
        Ok(())
    }

    fn clone_repo(&self, raw: &str, dir: Option<&Path>, args: &ResolveArgs) -> Result<(), AppError> {
        let repo = RepoRef::parse(raw)?;
        let owner_repo = repo.owner_repo();
        let config = self.load_config()?;
        let mut cache = ResolutionCache::load(&self.cache_path());

        let resolution = self.using_runner(config.command_timeout(), |runner| {
            self.resolve(&config, &cache, runner, &owner_repo, args.profile.as_deref())
        })?;
        let profile = config.get_profile(&resolution.profile)?;
        let dest = self.cwd.join(dir.unwrap_or_else(|| Path::new(&repo.repo)));
        let url = repo.ssh_url(&profile.ssh_host);

        self.using_runner(config.clone_timeout(), |runner| {
            let git = GitAdapter::new(runner);
            git.clone_repo(&url, &dest)?;
            Self::apply_identity(&git, &dest, &config, &profile.name)
        })?;
        guard::write_marker(&dest, &profile.name)?;
        self.install_guard_if_required(&config, &dest, args);
        self.remember(&mut cache, &config, &owner_repo, &resolution);

        println!(
            "{} {} → {} ({})",
            "cloned:".green(),
            owner_repo,
            profile.name.bold(),
            resolution.reason
        );
        Ok(())
    }

    fn init_repo(&self, args: &ResolveArgs) -> Result<(), AppError> {
        let config = self.load_config()?;
        let mut cache = ResolutionCache::load(&self.cache_path());
        let root = self.repo_root()?;

        let (owner_repo, resolution) = self.using_runner(config.command_timeout(), |runner| {
            let git = GitAdapter::new(runner);
            let remote = git.remote_url(&root, "origin")?;
            let repo = RepoRef::parse(&remote)?;
            let owner_repo = repo.owner_repo();

            let resolution = self.resolve(&config, &cache, runner, &owner_repo, args.profile.as_deref())?;
            let profile = config.get_profile(&resolution.profile)?;

            let keep_https = is_https_remote(&remote) && config.allow_https_managed_repo;
            let host_matches = ssh_host_of(&remote) == Some(profile.ssh_host.as_str());
            if !keep_https && !host_matches {
                let new_remote = repo.ssh_url(&profile.ssh_host);
                git.set_remote_url(&root, "origin", &new_remote)?;
                println!("{} {} → {}", "remote updated:".yellow(), remote, new_remote);
            }

            Self::apply_identity(&git, &root, &config, &profile.name)?;
            Ok((owner_repo, resolution))
        })?;

        guard::write_marker(&root, &resolution.profile)?;
        self.install_guard_if_required(&config, &root, args);
        self.remember(&mut cache, &config, &owner_repo, &resolution);

        println!(
            "{} {} → {} ({})",
            "initialized:".green(),
            owner_repo,
            resolution.profile.bold(),
            resolution.reason
        );
        Ok(())
    }

    fn show_status(&self) -> Result<(), AppError> {
        let root = self.repo_root()?;
        let config = self.load_config()?;

        if let Some(var) = self.ambient.token_interference() {
            println!(
                "{} {} is set and overrides profile credentials for gh",
                "warning:".yellow(),
                var
            );
        }

        let name = match guard::read_marker(&root) {
            Ok(name) => name,
            Err(AppError::NotManaged(_)) => {
                println!("{}", "no ctx profile for this repository, run 'ctx init'".yellow());
                if let Some(default) = &config.default_profile {
                    println!("{} {}", "default profile:".blue(), default);
                }
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        let profile = config.get_profile(&name)?;

        println!("{} {}", "profile:".blue(), profile.name.bold());
        println!("  git name:  {}", profile.git_name);
        println!("  git email: {}", profile.git_email);
        println!("  ssh host:  {}", profile.ssh_host);
        println!("  gh config: {}", profile.gh_config_dir.display());

        let remote = self.using_runner(config.command_timeout(), |runner| {
            GitAdapter::new(runner).remote_url(&root, "origin")
        });
        match remote {
            Ok(remote) => println!("  remote:    {remote}"),
            Err(err) => println!("  remote:    {}", err.to_string().dimmed()),
        }
        Ok(())
    }

    fn list_profiles(&self) -> Result<(), AppError> {
        let config = self.load_config()?;
        for profile in config.profiles() {
            let marker = if config.default_profile.as_deref() == Some(profile.name.as_str()) {
                " (default)"
            } else {
                ""
            };
            println!(
                "{}{} <{}> via {} owners: [{}]",
                profile.name.bold(),
                marker,
                profile.git_email,
                profile.ssh_host,
                profile.owners.join(", ")
            );
        }
        Ok(())
    }

    fn guard_check(&self) -> Result<(), AppError> {
        let root = self.repo_root()?;
        let name = guard::read_marker(&root)?;
        let config = self.load_config()?;
        let profile = config.get_profile(&name)?;

        let result = self.using_runner(config.command_timeout(), |runner| {
            guard::check(&root, profile, runner, &self.ambient)
        })?;

        if result.skipped {
            println!(
                "{}",
                "warning: CTX_SKIP_GUARD=1, guard check skipped".yellow()
            );
            return Ok(());
        }

        for violation in &result.violations {
            let label = match violation.severity {
                Severity::Error => format!("[{}]", violation.severity).red(),
                Severity::Warning => format!("[{}]", violation.severity).yellow(),
            };
            println!(
                "{} {}: expected '{}', found '{}'",
                label, violation.field, violation.expected, violation.actual
            );
        }

        if !result.pass {
            return Err(AppError::GuardBlock);
        }
        println!("{} {}", "guard check passed for profile".green(), name.bold());
        Ok(())
    }

    fn guard_install(&self) -> Result<(), AppError> {
        let root = self.repo_root()?;
        if guard::install_hook(&root)? {
            println!("{}", "pre-push guard installed".green());
        } else {
            println!("{}", "pre-push guard already installed".yellow());
        }
        Ok(())
    }

    fn guard_uninstall(&self) -> Result<(), AppError> {
        let root = self.repo_root()?;
        if guard::uninstall_hook(&root)? {
            println!("{}", "pre-push guard removed".green());
        } else {
            println!("{}", "no pre-push guard to remove".yellow());
        }
        Ok(())
    }

    fn cache_list(&self) -> Result<(), AppError> {
        let cache = ResolutionCache::load(&self.cache_path());
        if cache.entries.is_empty() {
            println!("{}", "cache is empty".yellow());
            return Ok(());
        }
        for (key, entry) in &cache.entries {
            println!(
                "{} → {} ({}, {})",
                key,
                entry.profile.bold(),
                entry.reason,
                entry.resolved_at.to_rfc3339()
            );
        }
        Ok(())
    }

    fn cache_invalidate(&self, profile: &str) -> Result<(), AppError> {
        let path = self.cache_path();
        let mut cache = ResolutionCache::load(&path);
        let removed = cache.invalidate_by_profile(profile);
        cache.save(&path)?;
        println!("{} {} entries for {}", "removed".green(), removed, profile.bold());
        Ok(())
    }

    fn cache_clear(&self) -> Result<(), AppError> {
        let path = self.cache_path();
        let mut cache = ResolutionCache::load(&path);
        cache.clear();
        cache.save(&path)?;
        println!("{}", "cache cleared".green());
        Ok(())
    }
}
