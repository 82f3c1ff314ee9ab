use crate::config::load_config;
use crate::context::ContextAssembler;
use crate::delivery_cache::DeliveryCache;
use crate::generation::OpenAiAnswerGenerator;
use crate::github::GithubApiClient;
use crate::identity::{CachedIdentityResolver, IdentityResolver, StaticIdentity};
use crate::mention::MentionParser;
use crate::openai::OpenAIApiClient;
use crate::orchestrator::AnswerOrchestrator;
use crate::retrieval::RepoContextRetriever;
use crate::router::EventRouter;
use crate::webhook::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod context;
mod delivery_cache;
mod generation;
mod github;
mod identity;
mod mention;
mod models;
mod openai;
mod orchestrator;
mod reply;
mod retrieval;
mod router;
mod templates;
mod webhook;

#[cfg(test)]
mod tests;

#[tokio::main]
async fn main() -> Result<()> {
    let app_settings = load_config().with_context(|| "Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(app_settings.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting discussbot...");
    info!("Using log level: {}", app_settings.log_level);
    if app_settings.webhook_secret.is_none() {
        warn!("No webhook secret configured, webhook signatures will not be verified");
    }

    let settings = Arc::new(app_settings);

    let github_client = Arc::new(
        GithubApiClient::new(&settings).with_context(|| "Failed to create GitHub client")?,
    );
    info!("GitHub API client initialized for {}", settings.github_api_url);

    let identity: Arc<dyn IdentityResolver> = match settings.bot_username.as_deref() {
        Some(login) => {
            info!("Using configured bot username @{}", login);
            Arc::new(StaticIdentity::new(login))
        }
        None => Arc::new(CachedIdentityResolver::new(
            github_client.clone(),
            Duration::from_secs(settings.identity_cache_seconds),
        )),
    };

    let openai_client =
        OpenAIApiClient::new(&settings).with_context(|| "Failed to create OpenAI client")?;
    let generator = Arc::new(OpenAiAnswerGenerator::new(openai_client, settings.clone()));
    let retriever = Arc::new(RepoContextRetriever::new(
        github_client.clone(),
        settings.clone(),
    ));

    let mentions = MentionParser::new(settings.mention_policy);
    info!("Matching mentions with the {:?} policy", mentions.policy());

    let orchestrator = Arc::new(AnswerOrchestrator::new(
        identity,
        mentions,
        ContextAssembler::new(retriever),
        generator,
        github_client.clone(),
        github_client,
    ));

    let state = AppState {
        router: EventRouter::new(orchestrator),
        webhook_secret: settings.webhook_secret.clone(),
        deliveries: DeliveryCache::new(Duration::from_secs(settings.delivery_ttl_seconds)),
    };
    let app = webhook::build_router(state, &settings.webhook_path);

    let listener = TcpListener::bind(&settings.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.listen_addr))?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C");
                signal_token.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    webhook::serve(listener, app, shutdown).await
}
