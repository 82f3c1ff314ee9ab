use crate::models::{DiscussionCommentEvent, DiscussionEvent, PullRequestEvent};
use crate::orchestrator::{AnswerOrchestrator, Turn};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A webhook delivery the bot understands.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    DiscussionCreated(Box<DiscussionEvent>),
    DiscussionCommentCreated(Box<DiscussionCommentEvent>),
    PullRequestOpened(Box<PullRequestEvent>),
    Ping,
    Unsupported {
        event: String,
        action: Option<String>,
    },
}

#[derive(Deserialize)]
struct ActionOnly {
    #[serde(default)]
    action: Option<String>,
}

impl WebhookEvent {
    /// Maps an `X-GitHub-Event` name and raw JSON body to a typed event.
    pub fn parse(event_name: &str, payload: &[u8]) -> Result<Self, serde_json::Error> {
        let ActionOnly { action } = serde_json::from_slice(payload)?;

        let event = match (event_name, action.as_deref()) {
            ("ping", _) => WebhookEvent::Ping,
            ("discussion", Some("created")) => {
                WebhookEvent::DiscussionCreated(Box::new(serde_json::from_slice(payload)?))
            }
            ("discussion_comment", Some("created")) => {
                WebhookEvent::DiscussionCommentCreated(Box::new(serde_json::from_slice(payload)?))
            }
            ("pull_request", Some("opened")) => {
                WebhookEvent::PullRequestOpened(Box::new(serde_json::from_slice(payload)?))
            }
            _ => WebhookEvent::Unsupported {
                event: event_name.to_string(),
                action,
            },
        };
        Ok(event)
    }
}

#[derive(Clone)]
pub struct EventRouter {
    orchestrator: Arc<AnswerOrchestrator>,
}

impl EventRouter {
    pub fn new(orchestrator: Arc<AnswerOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Runs the one flow `event` belongs to. Errors end here.
    /// `received_at` is when the delivery hit the webhook endpoint.
    pub async fn dispatch(&self, event: WebhookEvent, received_at: DateTime<Utc>) {
        let turn = match event {
            WebhookEvent::DiscussionCreated(event) => Turn::from_discussion(&event),
            WebhookEvent::DiscussionCommentCreated(event) => Turn::from_discussion_comment(&event),
            WebhookEvent::PullRequestOpened(event) => Turn::from_pull_request(&event),
            WebhookEvent::Ping => {
                info!("Received ping from GitHub");
                return;
            }
            WebhookEvent::Unsupported { event, action } => {
                debug!("Ignoring unsupported event {} (action {:?})", event, action);
                return;
            }
        };

        let result = self
            .orchestrator
            .run(&turn.with_received_at(received_at))
            .await;
        if let Err(e) = result {
            error!(kind = %e.kind, target_thread = %e.target, "Unhandled turn error: {}", e);
        }
    }
}
