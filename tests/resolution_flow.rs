use std::{fs, path::Path};

use gitctx::{
    app::App,
    cache::{CacheEntry, ResolutionCache},
    cli::{Commands, GuardCommands, ResolveArgs},
    config::{Config, ProfileStore, cache_path_for},
    error::AppError,
    exec::AmbientEnv,
    guard,
    probe::GhProber,
    resolver::{Reason, Resolution, Resolver},
    testutil::FakeRunner,
};

const CONFIG: &str = r#"
version = 1
cache_ttl_days = 90

[profiles.work]
gh_config_dir = "/gh/work"
ssh_host = "github-work"
git_name = "Dev Work"
git_email = "dev@acme.com"
owners = ["acme"]

[profiles.personal]
gh_config_dir = "/gh/personal"
ssh_host = "github-personal"
git_name = "Dev"
git_email = "dev@example.com"
owners = ["me"]
"#;

const PUSH: &str = r#"{"permissions":{"admin":false,"push":true,"pull":true}}"#;
const READ: &str = r#"{"permissions":{"admin":false,"push":false,"pull":true}}"#;

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("ctx").join("config.toml");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, CONFIG).unwrap();
    path
}

#[test]
fn owner_rule_then_cache_hit() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("cache.json");
    let config = Config::from_toml(CONFIG).unwrap();
    let runner = FakeRunner::new();
    let prober = GhProber::new(&runner, &config.github_host);

    let cache = ResolutionCache::load(&cache_path);
    let first = Resolver::new(&config, &cache, &prober, config.cache_ttl_days)
        .resolve("acme/widget", None)
        .unwrap();
    assert_eq!(first, Resolution::new("work", Reason::OwnerRule));

    let mut cache = cache;
    cache.set(
        "acme/widget",
        CacheEntry::now(&first.profile, first.reason, &config.fingerprint()),
    );
    cache.save(&cache_path).unwrap();

    let cache = ResolutionCache::load(&cache_path);
    let second = Resolver::new(&config, &cache, &prober, config.cache_ttl_days)
        .resolve("acme/widget", None)
        .unwrap();
    assert_eq!(second, Resolution::new("work", Reason::Cache));
    assert!(runner.calls().is_empty());
}

#[test]
fn config_edit_invalidates_cached_decision() {
    let config = Config::from_toml(CONFIG).unwrap();
    let mut cache = ResolutionCache::new();
    cache.set(
        "acme/widget",
        CacheEntry::now("personal", Reason::Probe, &config.fingerprint()),
    );

    let edited = Config::from_toml(&CONFIG.replace("Dev Work", "Dev At Work")).unwrap();
    let runner = FakeRunner::new();
    let prober = GhProber::new(&runner, &edited.github_host);
    let result = Resolver::new(&edited, &cache, &prober, 90)
        .resolve("acme/widget", None)
        .unwrap();
    assert_eq!(result.reason, Reason::OwnerRule);
    assert_eq!(result.profile, "work");
}

#[test]
fn probe_with_two_pushable_profiles_is_ambiguous() {
    let config = Config::from_toml(CONFIG).unwrap();
    let cache = ResolutionCache::new();
    let runner = FakeRunner::new().ok("gh api repos/shared/repo", PUSH);
    let prober = GhProber::new(&runner, &config.github_host);

    let err = Resolver::new(&config, &cache, &prober, 90)
        .resolve("shared/repo", None)
        .unwrap_err();
    assert!(matches!(err, AppError::Ambiguous { .. }));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(runner.calls().len(), 2);
}

#[test]
fn probe_without_push_is_auth_failure() {
    let config = Config::from_toml(CONFIG).unwrap();
    let cache = ResolutionCache::new();
    let runner = FakeRunner::new().ok("gh api repos/stranger/repo", READ);
    let prober = GhProber::new(&runner, &config.github_host);

    let err = Resolver::new(&config, &cache, &prober, 90)
        .resolve("stranger/repo", None)
        .unwrap_err();
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn init_binds_repository_and_caches_result() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path());
    let repo = dir.path().join("widget");
    fs::create_dir_all(repo.join(".git")).unwrap();
    let root = repo.display().to_string();

    let runner = FakeRunner::new()
        .ok(&format!("git -C {root} rev-parse --show-toplevel"), &format!("{root}\n"))
        .ok(
            &format!("git -C {root} remote get-url origin"),
            "https://github.com/acme/widget.git\n",
        )
        .ok(&format!("git -C {root} remote set-url origin"), "")
        .ok(&format!("git -C {root} config --local"), "");
    let app = App::with_runner(config_path.clone(), repo.clone(), AmbientEnv::default(), &runner);

    app.run(Commands::Init {
        resolve: ResolveArgs::default(),
    })
    .unwrap();

    let commands = runner.commands();
    assert!(commands.contains(&format!(
        "git -C {root} remote set-url origin git@github-work:acme/widget.git"
    )));
    assert!(commands.contains(&format!("git -C {root} config --local user.email dev@acme.com")));
    assert!(commands.contains(&format!("git -C {root} config --local user.name Dev Work")));

    assert_eq!(guard::read_marker(&repo).unwrap(), "work");
    assert!(repo.join(".git/hooks/pre-push").exists());

    let cache = ResolutionCache::load(&cache_path_for(&config_path));
    let entry = &cache.entries["acme/widget"];
    assert_eq!(entry.profile, "work");
    assert_eq!(entry.reason, Reason::OwnerRule);
}

#[test]
fn init_with_unknown_profile_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path());
    let repo = dir.path().join("widget");
    fs::create_dir_all(repo.join(".git")).unwrap();
    let root = repo.display().to_string();

    let runner = FakeRunner::new()
        .ok(&format!("git -C {root} rev-parse --show-toplevel"), &format!("{root}\n"))
        .ok(
            &format!("git -C {root} remote get-url origin"),
            "git@github.com:acme/widget.git\n",
        );
    let app = App::with_runner(config_path, repo.clone(), AmbientEnv::default(), &runner);

    let err = app
        .run(Commands::Init {
            resolve: ResolveArgs {
                profile: Some("ghost".to_string()),
                no_guard: true,
            },
        })
        .unwrap_err();
    assert_eq!(err.exit_code(), 5);
    assert!(matches!(guard::read_marker(&repo), Err(AppError::NotManaged(_))));
}

#[test]
fn clone_uses_profile_ssh_host() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path());
    let dest = dir.path().join("widget");
    fs::create_dir_all(dest.join(".git")).unwrap();
    let dest_str = dest.display().to_string();

    let runner = FakeRunner::new()
        .ok(
            &format!("git clone git@github-personal:acme/widget.git {dest_str}"),
            "",
        )
        .ok(&format!("git -C {dest_str} config --local"), "");
    let app = App::with_runner(config_path.clone(), dir.path().to_path_buf(), AmbientEnv::default(), &runner);

    app.run(Commands::Clone {
        repo: "https://github.com/acme/widget".to_string(),
        dir: None,
        resolve: ResolveArgs {
            profile: Some("personal".to_string()),
            no_guard: true,
        },
    })
    .unwrap();

    assert_eq!(guard::read_marker(&dest).unwrap(), "personal");
    assert!(!dest.join(".git/hooks/pre-push").exists());
    let cache = ResolutionCache::load(&cache_path_for(&config_path));
    assert_eq!(cache.entries["acme/widget"].reason, Reason::Explicit);
}

#[test]
fn guard_check_blocks_on_email_drift() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path());
    let repo = dir.path().join("widget");
    fs::create_dir_all(repo.join(".git")).unwrap();
    guard::write_marker(&repo, "work").unwrap();
    let root = repo.display().to_string();

    let runner = FakeRunner::new()
        .ok(&format!("git -C {root} rev-parse --show-toplevel"), &format!("{root}\n"))
        .ok(
            &format!("git -C {root} remote get-url origin"),
            "git@github-work:acme/widget.git\n",
        )
        .ok(
            &format!("git -C {root} config --local user.email"),
            "dev@example.com\n",
        )
        .ok(&format!("git -C {root} config --local user.name"), "Dev Work\n");
    let app = App::with_runner(config_path.clone(), repo.clone(), AmbientEnv::default(), &runner);

    let err = app
        .run(Commands::Guard {
            command: GuardCommands::Check,
        })
        .unwrap_err();
    assert!(matches!(err, AppError::GuardBlock));
    assert_eq!(err.exit_code(), 2);

    let bypass = AmbientEnv {
        skip_guard: true,
        ..AmbientEnv::default()
    };
    let app = App::with_runner(config_path, repo, bypass, &runner);
    app.run(Commands::Guard {
        command: GuardCommands::Check,
    })
    .unwrap();
}

#[test]
fn guard_check_outside_managed_repo_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path());
    let root = dir.path().display().to_string();
    let runner = FakeRunner::new().ok(
        &format!("git -C {root} rev-parse --show-toplevel"),
        &format!("{root}\n"),
    );
    let app = App::with_runner(config_path, dir.path().to_path_buf(), AmbientEnv::default(), &runner);

    let err = app
        .run(Commands::Guard {
            command: GuardCommands::Check,
        })
        .unwrap_err();
    assert!(matches!(err, AppError::NotManaged(_)));
}
