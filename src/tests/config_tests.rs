use crate::config::AppSettings;
use crate::mention::MentionPolicy;
use clap::Parser;

const REQUIRED: [&str; 5] = [
    "discussbot",
    "--github-token",
    "test_github_token",
    "--openai-api-key",
    "test_openai_key",
];

fn parse(extra: &[&str]) -> Result<AppSettings, clap::Error> {
    AppSettings::try_parse_from(REQUIRED.iter().chain(extra.iter()).copied())
}

#[test]
fn test_defaults() {
    let settings = parse(&[]).unwrap();

    assert_eq!(settings.github_api_url, "https://api.github.com");
    assert_eq!(settings.listen_addr, "0.0.0.0:3000");
    assert_eq!(settings.webhook_path, "/webhook");
    assert_eq!(settings.openai_custom_url, "https://api.openai.com/v1");
    assert_eq!(settings.openai_token_mode, "max_tokens");
    assert_eq!(settings.mention_policy, MentionPolicy::Boundary);
    assert_eq!(settings.identity_cache_seconds, 300);
    assert_eq!(settings.max_context_files, 5);
    assert_eq!(settings.delivery_ttl_seconds, 3600);
    assert_eq!(settings.bot_username, None);
}

#[test]
fn test_mention_policy_parses_both_values() {
    let settings = parse(&["--mention-policy", "substring"]).unwrap();
    assert_eq!(settings.mention_policy, MentionPolicy::Substring);

    let settings = parse(&["--mention-policy", "boundary"]).unwrap();
    assert_eq!(settings.mention_policy, MentionPolicy::Boundary);

    assert!(parse(&["--mention-policy", "fuzzy"]).is_err());
}

#[test]
fn test_invalid_token_mode_is_rejected() {
    let err = parse(&["--openai-token-mode", "tokens"]).unwrap_err();
    assert!(err
        .to_string()
        .contains("must be either 'max_tokens' or 'max_completion_tokens'"));

    let settings = parse(&["--openai-token-mode", "max_completion_tokens"]).unwrap();
    assert_eq!(settings.openai_token_mode, "max_completion_tokens");
}

#[test]
fn test_tokens_are_required() {
    assert!(AppSettings::try_parse_from(["discussbot", "--github-token", "gh"]).is_err());
}

#[test]
fn test_numeric_options_reject_garbage() {
    assert!(parse(&["--max-context-size", "lots"]).is_err());
    assert!(parse(&["--identity-cache-seconds", "-1"]).is_err());
}
