use std::io::IsTerminal;

use colored::Colorize;
use inquire::Select;

use crate::{
    error::AppError,
    resolver::{Reason, Resolution},
};

/// Whether an interactive prompt can be shown
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

/// Asks the user to pick one of several pushable profiles
pub fn select_profile(owner_repo: &str, candidates: &[String]) -> Result<Resolution, AppError> {
    let prompt = format!(
        "{} {}",
        "several profiles can push to".blue(),
        owner_repo.bold()
    );
    let profile: String = Select::new(&prompt, candidates.to_vec())
        .with_help_message("pass --profile to skip this prompt")
        .prompt()?;
    Ok(Resolution::new(&profile, Reason::UserSelect))
}
