use validator::ValidateEmail;

use crate::{error::AppError, profile::Profile};

/// Maximum length for a profile name
const MAX_PROFILE_NAME_LENGTH: usize = 30;
/// Maximum length for Git email address
const MAX_EMAIL_LENGTH: usize = 100;

/// Validates every field of a profile
pub fn validate_profile(profile: &Profile) -> Result<(), AppError> {
    validate_profile_name(&profile.name)?;
    let name = &profile.name;

    if profile.gh_config_dir.as_os_str().is_empty() {
        return Err(config_error(name, "gh_config_dir is required"));
    }
    validate_ssh_host(name, &profile.ssh_host)?;
    if profile.git_name.trim().is_empty() {
        return Err(config_error(name, "git_name is required"));
    }
    validate_email(name, &profile.git_email, profile.email_domain.as_deref())?;
    for owner in &profile.owners {
        validate_owner(name, owner)?;
    }
    Ok(())
}

/// Validates a profile name
pub fn validate_profile_name(name: &str) -> Result<(), AppError> {
    if name.is_empty() {
        Err(AppError::Config("profile name cannot be empty".to_string()))
    } else if name.len() > MAX_PROFILE_NAME_LENGTH {
        Err(AppError::Config(format!(
            "profile name '{name}' too long (max {MAX_PROFILE_NAME_LENGTH} characters)"
        )))
    } else if name.chars().any(char::is_whitespace) {
        Err(AppError::Config(format!("profile name '{name}' cannot contain whitespace")))
    } else {
        Ok(())
    }
}

/// Validates an SSH host alias
fn validate_ssh_host(profile: &str, host: &str) -> Result<(), AppError> {
    if host.is_empty() {
        Err(config_error(profile, "ssh_host is required"))
    } else if host.chars().any(|c| c.is_whitespace() || c == '@' || c == ':' || c == '/') {
        Err(config_error(profile, &format!("ssh_host '{host}' must be a bare host alias")))
    } else {
        Ok(())
    }
}

/// Validates the commit email, optionally against a required domain
fn validate_email(profile: &str, email: &str, domain: Option<&str>) -> Result<(), AppError> {
    if email.is_empty() {
        return Err(config_error(profile, "git_email is required"));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(config_error(
            profile,
            &format!("git_email too long (max {MAX_EMAIL_LENGTH} characters)"),
        ));
    }
    if !email.validate_email() {
        return Err(config_error(profile, &format!("invalid git_email '{email}'")));
    }
    if let Some(domain) = domain.filter(|domain| !domain.is_empty()) {
        let actual = email.rsplit_once('@').map(|(_, d)| d).unwrap_or_default();
        if !actual.eq_ignore_ascii_case(domain.trim_start_matches('@')) {
            return Err(config_error(
                profile,
                &format!("git_email '{email}' is outside email_domain '{domain}'"),
            ));
        }
    }
    Ok(())
}

/// Validates an owner entry
fn validate_owner(profile: &str, owner: &str) -> Result<(), AppError> {
    if owner.trim().is_empty() {
        Err(config_error(profile, "owners cannot contain empty names"))
    } else if owner.contains('/') || owner.chars().any(char::is_whitespace) {
        Err(config_error(profile, &format!("owner '{owner}' must be a single user or org")))
    } else {
        Ok(())
    }
}

fn config_error(profile: &str, message: &str) -> AppError {
    AppError::Config(format!("profiles.{profile}: {message}"))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn work() -> Profile {
        Profile {
            name: "work".to_string(),
            gh_config_dir: PathBuf::from("/home/dev/.config/gh-work"),
            ssh_host: "github-work".to_string(),
            git_name: "Dev Work".to_string(),
            git_email: "dev@acme.com".to_string(),
            email_domain: Some("acme.com".to_string()),
            owners: vec!["acme".to_string()],
        }
    }

    #[test]
    fn accepts_complete_profile() {
        assert!(validate_profile(&work()).is_ok());
    }

    #[test]
    fn rejects_bad_email() {
        let mut profile = work();
        profile.git_email = "not-an-email".to_string();
        assert!(matches!(validate_profile(&profile), Err(AppError::Config(_))));
    }

    #[test]
    fn rejects_email_outside_domain() {
        let mut profile = work();
        profile.git_email = "dev@gmail.com".to_string();
        let err = validate_profile(&profile).unwrap_err();
        assert!(err.to_string().contains("email_domain"));
    }

    #[test]
    fn rejects_ssh_url_as_host() {
        let mut profile = work();
        profile.ssh_host = "git@github.com".to_string();
        assert!(validate_profile(&profile).is_err());
    }

    #[test]
    fn rejects_owner_with_slash() {
        let mut profile = work();
        profile.owners.push("acme/widget".to_string());
        assert!(validate_profile(&profile).is_err());
    }

    #[test]
    fn rejects_missing_identity_dir() {
        let mut profile = work();
        profile.gh_config_dir = PathBuf::new();
        let err = validate_profile(&profile).unwrap_err();
        assert!(err.to_string().contains("gh_config_dir"));
    }
}
