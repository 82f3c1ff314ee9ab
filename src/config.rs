use crate::mention::MentionPolicy;
use clap::Parser;
use std::env;
use std::fmt::Debug;

#[derive(Debug, Clone, Parser)]
#[command(
    author,
    version,
    about = "A GitHub bot that answers discussions and welcomes new contributors using AI"
)]
pub struct AppSettings {
    /// GitHub REST API base URL (use https://<host>/api/v3 for GitHub Enterprise)
    #[arg(
        long,
        env = "DISCUSSBOT_GITHUB_API_URL",
        default_value = "https://api.github.com"
    )]
    pub github_api_url: String,

    /// GitHub API token (installation or personal access token)
    #[arg(long, env = "DISCUSSBOT_GITHUB_TOKEN")]
    pub github_token: String,

    /// Shared secret used to verify X-Hub-Signature-256 on incoming webhooks
    #[arg(long, env = "DISCUSSBOT_WEBHOOK_SECRET")]
    pub webhook_secret: Option<String>,

    /// Address the webhook server listens on
    #[arg(long, env = "DISCUSSBOT_LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen_addr: String,

    /// HTTP path that receives webhook deliveries
    #[arg(long, env = "DISCUSSBOT_WEBHOOK_PATH", default_value = "/webhook")]
    pub webhook_path: String,

    /// OpenAI API key
    #[arg(long, env = "DISCUSSBOT_OPENAI_API_KEY")]
    pub openai_api_key: String,

    /// Custom OpenAI API URL (if using a proxy or alternative endpoint)
    #[arg(
        long,
        env = "DISCUSSBOT_OPENAI_CUSTOM_URL",
        default_value = "https://api.openai.com/v1"
    )]
    pub openai_custom_url: String,

    /// OpenAI model to use
    #[arg(long, env = "DISCUSSBOT_OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub openai_model: String,

    /// Temperature parameter for OpenAI API (0.0 to 1.0)
    #[arg(long, env = "DISCUSSBOT_OPENAI_TEMPERATURE", default_value_t = 0.3)]
    pub openai_temperature: f32,

    /// Maximum number of tokens to generate in the response
    #[arg(long, env = "DISCUSSBOT_OPENAI_MAX_TOKENS", default_value_t = 1024)]
    pub openai_max_tokens: u32,

    /// Token parameter mode for OpenAI API: "max_tokens" (legacy) or "max_completion_tokens" (new)
    #[arg(long, env = "DISCUSSBOT_OPENAI_TOKEN_MODE", default_value = "max_tokens", value_parser = validate_token_mode)]
    pub openai_token_mode: String,

    /// Optional prefix to prepend to every prompt sent to the LLM
    #[arg(long, env = "DISCUSSBOT_PROMPT_PREFIX")]
    pub prompt_prefix: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DISCUSSBOT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Bot login on GitHub (without @). Resolved from the API token when unset.
    #[arg(long, env = "DISCUSSBOT_BOT_USERNAME")]
    pub bot_username: Option<String>,

    /// How long a resolved bot login is reused, in seconds (0 resolves on every turn)
    #[arg(long, env = "DISCUSSBOT_IDENTITY_CACHE_SECONDS", default_value_t = 300)]
    pub identity_cache_seconds: u64,

    /// How mentions are matched: "boundary" (whole handle only) or "substring"
    #[arg(long, env = "DISCUSSBOT_MENTION_POLICY", value_enum, default_value_t = MentionPolicy::Boundary)]
    pub mention_policy: MentionPolicy,

    /// Maximum number of bytes of repository context handed to the LLM
    #[arg(long, env = "DISCUSSBOT_MAX_CONTEXT_SIZE", default_value_t = 20000)]
    pub max_context_size: usize,

    /// Maximum number of repository files fetched per query (1 to 20)
    #[arg(long, env = "DISCUSSBOT_MAX_CONTEXT_FILES", default_value_t = 5)]
    pub max_context_files: usize,

    /// Branch to read repository files from. Uses the repository default branch when unset.
    #[arg(long, env = "DISCUSSBOT_DEFAULT_BRANCH")]
    pub default_branch: Option<String>,

    /// Timeout applied to every outbound HTTP request, in seconds
    #[arg(long, env = "DISCUSSBOT_REQUEST_TIMEOUT_SECONDS", default_value_t = 60)]
    pub request_timeout_seconds: u64,

    /// How long a webhook delivery id is remembered for redelivery suppression, in seconds
    #[arg(long, env = "DISCUSSBOT_DELIVERY_TTL_SECONDS", default_value_t = 3600)]
    pub delivery_ttl_seconds: u64,
}

/// Validate that openai_token_mode is a valid option
fn validate_token_mode(value: &str) -> Result<String, String> {
    match value {
        "max_tokens" | "max_completion_tokens" => Ok(value.to_string()),
        _ => Err(format!(
            "openai_token_mode must be either 'max_tokens' or 'max_completion_tokens', got '{}'",
            value
        )),
    }
}

/// Validate that max_context_files is within reasonable bounds
fn validate_max_context_files(value: usize) -> Result<usize, String> {
    const MIN_CONTEXT_FILES: usize = 1;
    const MAX_CONTEXT_FILES: usize = 20;

    if value < MIN_CONTEXT_FILES {
        Err(format!(
            "max_context_files must be at least {MIN_CONTEXT_FILES}, got {value}"
        ))
    } else if value > MAX_CONTEXT_FILES {
        Err(format!(
            "max_context_files must be at most {MAX_CONTEXT_FILES}, got {value}"
        ))
    } else {
        Ok(value)
    }
}

/// Validate that the webhook path is absolute
fn validate_webhook_path(value: &str) -> Result<String, String> {
    if value.starts_with('/') {
        Ok(value.to_string())
    } else {
        Err(format!("webhook_path must start with '/', got '{}'", value))
    }
}

fn finalize(mut app_settings: AppSettings) -> anyhow::Result<AppSettings> {
    // An empty env var should behave like an unset one
    app_settings.webhook_secret = app_settings
        .webhook_secret
        .filter(|secret| !secret.trim().is_empty());
    app_settings.bot_username = app_settings
        .bot_username
        .map(|name| name.trim().trim_start_matches('@').to_string())
        .filter(|name| !name.is_empty());

    app_settings.max_context_files = validate_max_context_files(app_settings.max_context_files)
        .map_err(|e| anyhow::anyhow!(e))?;
    app_settings.webhook_path =
        validate_webhook_path(&app_settings.webhook_path).map_err(|e| anyhow::anyhow!(e))?;

    Ok(app_settings)
}

pub fn load_config() -> anyhow::Result<AppSettings> {
    // Parse command line arguments and environment variables
    let mut app_settings = AppSettings::parse();

    // Validate token_mode for environment variables (CLI args are already validated by clap)
    if let Ok(token_mode) = env::var("DISCUSSBOT_OPENAI_TOKEN_MODE") {
        app_settings.openai_token_mode =
            validate_token_mode(&token_mode).map_err(|e| anyhow::anyhow!(e))?;
    }

    finalize(app_settings)
}
