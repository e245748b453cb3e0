use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gitctx::{
    app::App,
    cli::Cli,
    config::default_config_path,
    error::{AppError, EXIT_SUCCESS},
    exec::AmbientEnv,
    mask::mask_tokens,
    menu::is_interactive,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), mask_tokens(&err.to_string()));
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let cwd = std::env::current_dir()?;
    let app = App::new(config_path, cwd, AmbientEnv::from_process(), is_interactive());
    app.run(cli.command)
}

/// Logs go to stderr; `RUST_LOG` wins over `--verbose`
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}
