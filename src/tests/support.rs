//! Fakes and fixtures shared by the flow tests.

use crate::config::AppSettings;
use crate::context::{ContextAssembler, RetrievalSource};
use crate::generation::{AnswerGenerator, GenerationError};
use crate::github::{ContributionHistory, GithubError};
use crate::identity::{BotIdentity, IdentityError, IdentityResolver, StaticIdentity};
use crate::mention::{MentionParser, MentionPolicy};
use crate::models::{DiscussionCommentEvent, DiscussionEvent, PullRequestEvent};
use crate::orchestrator::AnswerOrchestrator;
use crate::reply::{ReplyGateway, ReplyTarget};
use crate::templates;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const BOT_LOGIN: &str = "discussbot";
pub const DISCUSSION_NODE_ID: &str = "D_kwDOAbc123";

pub fn test_settings(github_api_url: &str, openai_url: &str) -> AppSettings {
    AppSettings {
        github_api_url: github_api_url.to_string(),
        github_token: "test_github_token".to_string(),
        webhook_secret: None,
        listen_addr: "127.0.0.1:0".to_string(),
        webhook_path: "/webhook".to_string(),
        openai_api_key: "test_api_key".to_string(),
        openai_custom_url: openai_url.to_string(),
        openai_model: "gpt-4o-mini".to_string(),
        openai_temperature: 0.3,
        openai_max_tokens: 1024,
        openai_token_mode: "max_tokens".to_string(),
        prompt_prefix: None,
        log_level: "debug".to_string(),
        bot_username: Some(BOT_LOGIN.to_string()),
        identity_cache_seconds: 0,
        mention_policy: MentionPolicy::Boundary,
        max_context_size: 20000,
        max_context_files: 5,
        default_branch: None,
        request_timeout_seconds: 5,
        delivery_ttl_seconds: 3600,
    }
}

fn repository() -> serde_json::Value {
    json!({
        "id": 1,
        "name": "widgets",
        "full_name": "acme/widgets",
        "owner": { "id": 2, "login": "acme", "type": "Organization" }
    })
}

fn discussion(author: &str, title: &str, body: &str) -> serde_json::Value {
    json!({
        "id": 100,
        "node_id": DISCUSSION_NODE_ID,
        "number": 42,
        "title": title,
        "body": body,
        "user": { "id": 7, "login": author, "type": "User" },
        "html_url": "https://github.com/acme/widgets/discussions/42"
    })
}

pub fn discussion_payload(author: &str, title: &str, body: &str) -> serde_json::Value {
    json!({
        "action": "created",
        "discussion": discussion(author, title, body),
        "repository": repository(),
        "sender": { "id": 7, "login": author }
    })
}

pub fn comment_payload(author: &str, comment: &str) -> serde_json::Value {
    json!({
        "action": "created",
        "discussion": discussion("alice", "How does caching work?", "I'm confused about the cache."),
        "comment": {
            "id": 500,
            "node_id": "DC_kwDOAbc",
            "body": comment,
            "user": { "id": 8, "login": author, "type": "User" }
        },
        "repository": repository(),
        "sender": { "id": 8, "login": author }
    })
}

pub fn pull_request_payload(author: &str) -> serde_json::Value {
    json!({
        "action": "opened",
        "number": 9,
        "pull_request": {
            "id": 900,
            "number": 9,
            "title": "Fix typo",
            "body": null,
            "user": { "id": 9, "login": author, "type": "User" }
        },
        "repository": repository(),
        "sender": { "id": 9, "login": author }
    })
}

pub fn discussion_event(author: &str, title: &str, body: &str) -> DiscussionEvent {
    serde_json::from_value(discussion_payload(author, title, body)).unwrap()
}

pub fn comment_event(author: &str, comment: &str) -> DiscussionCommentEvent {
    serde_json::from_value(comment_payload(author, comment)).unwrap()
}

pub fn pull_request_event(author: &str) -> PullRequestEvent {
    serde_json::from_value(pull_request_payload(author)).unwrap()
}

pub fn discussion_target() -> ReplyTarget {
    ReplyTarget::Discussion {
        node_id: DISCUSSION_NODE_ID.to_string(),
    }
}

pub struct FailingIdentity;

#[async_trait]
impl IdentityResolver for FailingIdentity {
    async fn resolve(&self) -> Result<BotIdentity, IdentityError> {
        Err(IdentityError::EmptyLogin)
    }
}

fn post_failure() -> GithubError {
    GithubError::GraphQl("Something went wrong while executing your query".to_string())
}

/// Records every post attempt. Posts whose text contains one of `fail_on` fail.
#[derive(Default)]
pub struct RecordingGateway {
    posts: Mutex<Vec<(ReplyTarget, String)>>,
    attempts: AtomicUsize,
    fail_on: Vec<String>,
}

impl RecordingGateway {
    pub fn failing_on(needles: &[&str]) -> Self {
        Self {
            fail_on: needles.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn posts(&self) -> Vec<(ReplyTarget, String)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.posts().into_iter().map(|(_, text)| text).collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplyGateway for RecordingGateway {
    async fn post_threaded_reply(
        &self,
        target: &ReplyTarget,
        text: &str,
    ) -> Result<(), GithubError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.iter().any(|needle| text.contains(needle.as_str())) {
            return Err(post_failure());
        }
        self.posts
            .lock()
            .unwrap()
            .push((target.clone(), text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRetrieval {
    pub queries: Mutex<Vec<String>>,
    pub fail: bool,
}

impl FakeRetrieval {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl RetrievalSource for FakeRetrieval {
    async fn get_context_for_query(
        &self,
        _owner: &str,
        _repo: &str,
        search_text: &str,
    ) -> anyhow::Result<String> {
        self.queries.lock().unwrap().push(search_text.to_string());
        if self.fail {
            anyhow::bail!("code search failed: secret internal detail");
        }
        Ok("--- src/cache.rs ---\nfn evict() {}\n".to_string())
    }
}

/// What the fake generator was asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationCall {
    Answer {
        repo: String,
        title: String,
        body: String,
    },
    FollowUp {
        repo: String,
        discussion_context: String,
        query: String,
    },
}

pub struct FakeGenerator {
    calls: Mutex<Vec<GenerationCall>>,
    answer: Option<String>,
}

impl FakeGenerator {
    pub fn answering(answer: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            answer: Some(answer.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            answer: None,
        }
    }

    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self) -> Result<String, GenerationError> {
        self.answer.clone().ok_or(GenerationError::NoChoices)
    }
}

#[async_trait]
impl AnswerGenerator for FakeGenerator {
    async fn generate_answer(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        _context: &str,
    ) -> Result<String, GenerationError> {
        self.calls.lock().unwrap().push(GenerationCall::Answer {
            repo: repo.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        self.respond()
    }

    async fn generate_follow_up_answer(
        &self,
        repo: &str,
        discussion_context: &str,
        query: &str,
        _context: &str,
    ) -> Result<String, GenerationError> {
        self.calls.lock().unwrap().push(GenerationCall::FollowUp {
            repo: repo.to_string(),
            discussion_context: discussion_context.to_string(),
            query: query.to_string(),
        });
        self.respond()
    }

    fn generate_help_message(&self, user: &str) -> String {
        templates::help_message(user)
    }
}

pub struct FakeContributions {
    pub first: bool,
    pub fail: bool,
    pub lookups: AtomicUsize,
}

impl FakeContributions {
    pub fn first_time(first: bool) -> Self {
        Self {
            first,
            fail: false,
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            first: false,
            fail: true,
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ContributionHistory for FakeContributions {
    async fn is_first_contribution(
        &self,
        _owner: &str,
        _repo: &str,
        _login: &str,
    ) -> Result<bool, GithubError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(GithubError::Api {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "boom".to_string(),
            });
        }
        Ok(self.first)
    }
}

/// An orchestrator wired to fakes. Swap fields before calling `build`.
pub struct Harness {
    pub identity: Arc<dyn IdentityResolver>,
    pub policy: MentionPolicy,
    pub retrieval: Arc<FakeRetrieval>,
    pub generator: Arc<FakeGenerator>,
    pub gateway: Arc<RecordingGateway>,
    pub contributions: Arc<FakeContributions>,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            identity: Arc::new(StaticIdentity::new(BOT_LOGIN)),
            policy: MentionPolicy::Boundary,
            retrieval: Arc::new(FakeRetrieval::default()),
            generator: Arc::new(FakeGenerator::answering("Caching uses an LRU.")),
            gateway: Arc::new(RecordingGateway::default()),
            contributions: Arc::new(FakeContributions::first_time(true)),
        }
    }
}

impl Harness {
    pub fn build(&self) -> AnswerOrchestrator {
        AnswerOrchestrator::new(
            self.identity.clone(),
            MentionParser::new(self.policy),
            ContextAssembler::new(self.retrieval.clone()),
            self.generator.clone(),
            self.gateway.clone(),
            self.contributions.clone(),
        )
    }
}
