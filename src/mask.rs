use std::sync::LazyLock;

use regex::Regex;

/// GitHub token shapes: classic, OAuth, user-to-server, server-to-server and fine-grained
static TOKEN_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(ghp_|gho_|ghu_|ghs_|github_pat_)[A-Za-z0-9_]+").ok());

/// Replaces anything that looks like a GitHub token with `<prefix>****`
pub fn mask_tokens(text: &str) -> String {
    match TOKEN_PATTERN.as_ref() {
        Some(pattern) => pattern.replace_all(text, "${1}****").into_owned(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_every_token_kind() {
        let text = "ghp_abc123 gho_x ghu_y ghs_z github_pat_11AAA_bbb";
        assert_eq!(
            mask_tokens(text),
            "ghp_**** gho_**** ghu_**** ghs_**** github_pat_****"
        );
    }

    #[test]
    fn leaves_plain_text_alone() {
        let text = "gh: Not Found (HTTP 404)";
        assert_eq!(mask_tokens(text), text);
    }

    #[test]
    fn masks_inside_sentences() {
        assert_eq!(
            mask_tokens("auth failed for token=ghp_secretvalue, retry"),
            "auth failed for token=ghp_****, retry"
        );
    }
}
