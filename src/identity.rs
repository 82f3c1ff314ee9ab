use crate::github::{GithubApiClient, GithubError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Suffix GitHub appends to the login of App installations.
pub const APP_BOT_SUFFIX: &str = "[bot]";

/// The bot's own GitHub account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    login: String,
}

impl BotIdentity {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    /// The name users type after `@`. App logins like `helper[bot]` are mentioned as `@helper`.
    pub fn mention_handle(&self) -> &str {
        self.login
            .strip_suffix(APP_BOT_SUFFIX)
            .unwrap_or(&self.login)
    }

    pub fn is_app(&self) -> bool {
        self.login.ends_with(APP_BOT_SUFFIX)
    }

    /// Whether `actor` is this bot. GitHub logins are case-insensitive.
    pub fn is(&self, actor: &str) -> bool {
        actor.eq_ignore_ascii_case(&self.login)
    }
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Failed to look up bot identity: {0}")]
    Lookup(#[from] GithubError),
    #[error("Identity lookup returned an empty login")]
    EmptyLogin,
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self) -> Result<BotIdentity, IdentityError>;
}

/// A login fixed at startup.
#[derive(Debug, Clone)]
pub struct StaticIdentity(BotIdentity);

impl StaticIdentity {
    pub fn new(login: impl Into<String>) -> Self {
        Self(BotIdentity::new(login))
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentity {
    async fn resolve(&self) -> Result<BotIdentity, IdentityError> {
        Ok(self.0.clone())
    }
}

#[async_trait]
impl IdentityResolver for GithubApiClient {
    async fn resolve(&self) -> Result<BotIdentity, IdentityError> {
        let user = self.get_authenticated_user().await?;
        let login = user.login.trim();
        if login.is_empty() {
            return Err(IdentityError::EmptyLogin);
        }
        debug!("Resolved bot identity as @{}", login);
        Ok(BotIdentity::new(login))
    }
}

/// Reuses a resolved identity for `ttl`. Failures are never cached.
pub struct CachedIdentityResolver {
    inner: Arc<dyn IdentityResolver>,
    ttl: Duration,
    cached: RwLock<Option<(BotIdentity, Instant)>>,
}

impl CachedIdentityResolver {
    pub fn new(inner: Arc<dyn IdentityResolver>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: RwLock::new(None),
        }
    }
}

#[async_trait]
impl IdentityResolver for CachedIdentityResolver {
    async fn resolve(&self) -> Result<BotIdentity, IdentityError> {
        if !self.ttl.is_zero() {
            let cached = self.cached.read().await;
            if let Some((identity, resolved_at)) = cached.as_ref() {
                if resolved_at.elapsed() < self.ttl {
                    return Ok(identity.clone());
                }
            }
        }

        let identity = self.inner.resolve().await?;
        if !self.ttl.is_zero() {
            let mut cached = self.cached.write().await;
            if cached.is_none() {
                info!("Bot identity resolved as @{}", identity.login());
            }
            *cached = Some((identity.clone(), Instant::now()));
        }
        Ok(identity)
    }
}
