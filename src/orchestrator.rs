use crate::context::ContextAssembler;
use crate::generation::{AnswerGenerator, GenerationError};
use crate::github::ContributionHistory;
use crate::identity::{BotIdentity, IdentityResolver};
use crate::mention::{Command, MentionParser};
use crate::models::{DiscussionCommentEvent, DiscussionEvent, PullRequestEvent};
use crate::reply::{ReplyGateway, ReplyTarget};
use crate::templates;
use chrono::{DateTime, Utc};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    DiscussionCreated,
    DiscussionCommentCreated,
    PullRequestOpened,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnPayload {
    Discussion {
        title: String,
        body: String,
    },
    Comment {
        title: String,
        body: String,
        comment: String,
    },
    PullRequest,
}

/// One webhook delivery worth of work.
#[derive(Debug, Clone)]
pub struct Turn {
    pub kind: EventKind,
    pub actor: String,
    pub owner: String,
    pub repo: String,
    pub thread_number: i64,
    pub target: ReplyTarget,
    pub payload: TurnPayload,
    pub received_at: DateTime<Utc>,
}

impl Turn {
    pub fn from_discussion(event: &DiscussionEvent) -> Self {
        let discussion = &event.discussion;
        Self {
            kind: EventKind::DiscussionCreated,
            actor: discussion.user.login.clone(),
            owner: event.repository.owner.login.clone(),
            repo: event.repository.name.clone(),
            thread_number: discussion.number,
            target: ReplyTarget::Discussion {
                node_id: discussion.node_id.clone(),
            },
            payload: TurnPayload::Discussion {
                title: discussion.title.clone(),
                body: discussion.body.clone().unwrap_or_default(),
            },
            received_at: Utc::now(),
        }
    }

    pub fn from_discussion_comment(event: &DiscussionCommentEvent) -> Self {
        let discussion = &event.discussion;
        Self {
            kind: EventKind::DiscussionCommentCreated,
            actor: event.comment.user.login.clone(),
            owner: event.repository.owner.login.clone(),
            repo: event.repository.name.clone(),
            thread_number: discussion.number,
            target: ReplyTarget::Discussion {
                node_id: discussion.node_id.clone(),
            },
            payload: TurnPayload::Comment {
                title: discussion.title.clone(),
                body: discussion.body.clone().unwrap_or_default(),
                comment: event.comment.body.clone(),
            },
            received_at: Utc::now(),
        }
    }

    pub fn from_pull_request(event: &PullRequestEvent) -> Self {
        let owner = event.repository.owner.login.clone();
        let repo = event.repository.name.clone();
        Self {
            kind: EventKind::PullRequestOpened,
            actor: event.pull_request.user.login.clone(),
            target: ReplyTarget::Issue {
                owner: owner.clone(),
                repo: repo.clone(),
                number: event.number,
            },
            owner,
            repo,
            thread_number: event.number,
            payload: TurnPayload::PullRequest,
            received_at: Utc::now(),
        }
    }

    /// Backdates the turn to when its delivery arrived.
    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SelfAuthored,
    NotMentioned,
}

/// The step of a turn a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Identity,
    Acknowledgment,
    ContextOrGeneration,
    ReplyPost,
    Welcome,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Identity => "identity resolution",
            ErrorKind::Acknowledgment => "acknowledgment",
            ErrorKind::ContextOrGeneration => "context or generation",
            ErrorKind::ReplyPost => "reply post",
            ErrorKind::Welcome => "welcome",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// End the turn without posting anything.
    Abort,
    /// Log and move on to the next step.
    Continue,
    /// Post the apology for the turn, then end it.
    Apologize,
    /// Hand the error to the caller.
    Propagate,
    /// Log and end the turn.
    LogOnly,
}

impl FailurePolicy {
    pub fn for_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Identity => FailurePolicy::Abort,
            ErrorKind::Acknowledgment => FailurePolicy::Continue,
            ErrorKind::ContextOrGeneration => FailurePolicy::Apologize,
            ErrorKind::ReplyPost => FailurePolicy::Propagate,
            ErrorKind::Welcome => FailurePolicy::LogOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Filtered(SkipReason),
    Replied,
    Failed,
    Welcomed,
    NotFirstContribution,
    Aborted,
}

#[derive(Error, Debug)]
#[error("{kind} failed for {target}: {source}")]
pub struct TurnError {
    pub kind: ErrorKind,
    pub target: ReplyTarget,
    #[source]
    pub source: BoxError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AnswerRequest {
    NewDiscussion {
        title: String,
        body: String,
    },
    FollowUp {
        title: String,
        body: String,
        query: String,
    },
}

#[derive(Debug)]
enum TurnState {
    Start,
    Filtered(SkipReason),
    Helping,
    Acknowledging(AnswerRequest),
    Answering(AnswerRequest),
    Replying(String),
    CheckingContribution,
    Welcoming,
    Replied,
    Failed,
    Welcomed,
    NotFirstContribution,
    Aborted,
}

pub struct AnswerOrchestrator {
    identity: Arc<dyn IdentityResolver>,
    mentions: MentionParser,
    context: ContextAssembler,
    generator: Arc<dyn AnswerGenerator>,
    gateway: Arc<dyn ReplyGateway>,
    contributions: Arc<dyn ContributionHistory>,
}

impl AnswerOrchestrator {
    pub fn new(
        identity: Arc<dyn IdentityResolver>,
        mentions: MentionParser,
        context: ContextAssembler,
        generator: Arc<dyn AnswerGenerator>,
        gateway: Arc<dyn ReplyGateway>,
        contributions: Arc<dyn ContributionHistory>,
    ) -> Self {
        Self {
            identity,
            mentions,
            context,
            generator,
            gateway,
            contributions,
        }
    }

    pub async fn handle_discussion_created(
        &self,
        event: &DiscussionEvent,
    ) -> Result<TurnOutcome, TurnError> {
        self.run(&Turn::from_discussion(event)).await
    }

    pub async fn handle_discussion_comment_created(
        &self,
        event: &DiscussionCommentEvent,
    ) -> Result<TurnOutcome, TurnError> {
        self.run(&Turn::from_discussion_comment(event)).await
    }

    pub async fn handle_pull_request_opened(
        &self,
        event: &PullRequestEvent,
    ) -> Result<TurnOutcome, TurnError> {
        self.run(&Turn::from_pull_request(event)).await
    }

    /// Drives `turn` to a terminal state.
    #[instrument(
        skip(self, turn),
        fields(kind = ?turn.kind, repo = %format!("{}/{}", turn.owner, turn.repo), thread = turn.thread_number, actor = %turn.actor)
    )]
    pub async fn run(&self, turn: &Turn) -> Result<TurnOutcome, TurnError> {
        let result = self.drive(turn).await;
        let latency_ms = (Utc::now() - turn.received_at).num_milliseconds();
        match &result {
            Ok(outcome) => info!(?outcome, latency_ms, "Turn finished"),
            Err(e) => error!(error = %e, latency_ms, "Turn failed"),
        }
        result
    }

    async fn drive(&self, turn: &Turn) -> Result<TurnOutcome, TurnError> {
        let mut state = TurnState::Start;
        loop {
            debug!(?state, "Turn state");
            state = match state {
                TurnState::Start => match self.identity.resolve().await {
                    Ok(bot) => self.classify(turn, &bot),
                    Err(e) => {
                        self.escalate(turn, ErrorKind::Identity, e.into(), TurnState::Aborted)
                            .await?
                    }
                },
                TurnState::Filtered(reason) => {
                    info!(?reason, "Skipping turn");
                    return Ok(TurnOutcome::Filtered(reason));
                }
                TurnState::Helping => {
                    let help = self.generator.generate_help_message(&turn.actor);
                    match self.gateway.post_threaded_reply(&turn.target, &help).await {
                        Ok(()) => TurnState::Replied,
                        Err(e) => {
                            self.escalate(turn, ErrorKind::ReplyPost, e.into(), TurnState::Failed)
                                .await?
                        }
                    }
                }
                TurnState::Acknowledging(request) => {
                    let ack = match &request {
                        AnswerRequest::NewDiscussion { title, .. } => {
                            templates::discussion_acknowledgment(&turn.actor, title)
                        }
                        AnswerRequest::FollowUp { .. } => {
                            templates::follow_up_acknowledgment(&turn.actor)
                        }
                    };
                    match self.gateway.post_threaded_reply(&turn.target, &ack).await {
                        Ok(()) => TurnState::Answering(request),
                        Err(e) => {
                            self.escalate(
                                turn,
                                ErrorKind::Acknowledgment,
                                e.into(),
                                TurnState::Answering(request),
                            )
                            .await?
                        }
                    }
                }
                TurnState::Answering(request) => match self.answer(turn, &request).await {
                    Ok(reply) => TurnState::Replying(reply),
                    Err(e) => {
                        self.escalate(turn, ErrorKind::ContextOrGeneration, e, TurnState::Failed)
                            .await?
                    }
                },
                TurnState::Replying(reply) => {
                    match self.gateway.post_threaded_reply(&turn.target, &reply).await {
                        Ok(()) => TurnState::Replied,
                        Err(e) => {
                            self.escalate(turn, ErrorKind::ReplyPost, e.into(), TurnState::Failed)
                                .await?
                        }
                    }
                }
                TurnState::CheckingContribution => match self
                    .contributions
                    .is_first_contribution(&turn.owner, &turn.repo, &turn.actor)
                    .await
                {
                    Ok(true) => TurnState::Welcoming,
                    Ok(false) => TurnState::NotFirstContribution,
                    Err(e) => {
                        self.escalate(turn, ErrorKind::Welcome, e.into(), TurnState::Failed)
                            .await?
                    }
                },
                TurnState::Welcoming => {
                    let welcome = templates::welcome_message(&turn.actor, &turn.owner, &turn.repo);
                    match self.gateway.post_threaded_reply(&turn.target, &welcome).await {
                        Ok(()) => TurnState::Welcomed,
                        Err(e) => {
                            self.escalate(turn, ErrorKind::Welcome, e.into(), TurnState::Failed)
                                .await?
                        }
                    }
                }
                TurnState::Replied => return Ok(TurnOutcome::Replied),
                TurnState::Failed => return Ok(TurnOutcome::Failed),
                TurnState::Welcomed => return Ok(TurnOutcome::Welcomed),
                TurnState::NotFirstContribution => return Ok(TurnOutcome::NotFirstContribution),
                TurnState::Aborted => return Ok(TurnOutcome::Aborted),
            };
        }
    }

    /// The first transition out of `Start`, once the bot's identity is known.
    fn classify(&self, turn: &Turn, bot: &BotIdentity) -> TurnState {
        if bot.is(&turn.actor) {
            return TurnState::Filtered(SkipReason::SelfAuthored);
        }

        match &turn.payload {
            TurnPayload::Discussion { title, body } => {
                TurnState::Acknowledging(AnswerRequest::NewDiscussion {
                    title: title.clone(),
                    body: body.clone(),
                })
            }
            TurnPayload::Comment {
                title,
                body,
                comment,
            } => {
                let parsed = self.mentions.parse(comment, &turn.actor, bot);
                if !parsed.should_reply() {
                    let reason = if parsed.is_self {
                        SkipReason::SelfAuthored
                    } else {
                        SkipReason::NotMentioned
                    };
                    TurnState::Filtered(reason)
                } else if parsed.command == Command::Help {
                    TurnState::Helping
                } else {
                    TurnState::Acknowledging(AnswerRequest::FollowUp {
                        title: title.clone(),
                        body: body.clone(),
                        query: parsed.query,
                    })
                }
            }
            TurnPayload::PullRequest => TurnState::CheckingContribution,
        }
    }

    /// Retrieval then generation. Returns the signed reply.
    async fn answer(&self, turn: &Turn, request: &AnswerRequest) -> Result<String, BoxError> {
        let (answer, signature) = match request {
            AnswerRequest::NewDiscussion { title, body } => {
                let repository = self
                    .context
                    .retrieve_for_new_discussion(&turn.owner, &turn.repo, title, body)
                    .await?;
                let answer = self
                    .generator
                    .generate_answer(&turn.repo, title, body, &repository)
                    .await?;
                (answer, templates::DISCUSSION_ANSWER_SIGNATURE)
            }
            AnswerRequest::FollowUp { title, body, query } => {
                let context = self
                    .context
                    .for_follow_up(&turn.owner, &turn.repo, title, body, query)
                    .await?;
                let answer = self
                    .generator
                    .generate_follow_up_answer(
                        &turn.repo,
                        &context.discussion,
                        query,
                        &context.repository,
                    )
                    .await?;
                (answer, templates::FOLLOW_UP_ANSWER_SIGNATURE)
            }
        };

        if answer.trim().is_empty() {
            return Err(GenerationError::EmptyResponse.into());
        }
        Ok(format!("{}{}", answer, signature))
    }

    /// Applies the failure policy for `kind`. `resume` is the state the turn moves to
    /// when the policy lets it go on.
    async fn escalate(
        &self,
        turn: &Turn,
        kind: ErrorKind,
        error: BoxError,
        resume: TurnState,
    ) -> Result<TurnState, TurnError> {
        match FailurePolicy::for_kind(kind) {
            FailurePolicy::Abort => {
                error!(target_thread = %turn.target, "{} failed, aborting turn: {}", kind, error);
                Ok(TurnState::Aborted)
            }
            FailurePolicy::Continue => {
                warn!(target_thread = %turn.target, "{} failed, continuing: {}", kind, error);
                Ok(resume)
            }
            FailurePolicy::Apologize => {
                error!(target_thread = %turn.target, "{} failed: {}", kind, error);
                let apology = match turn.kind {
                    EventKind::DiscussionCommentCreated => {
                        templates::follow_up_apology(&turn.actor)
                    }
                    _ => templates::discussion_apology(&turn.actor),
                };
                if let Err(e) = self.gateway.post_threaded_reply(&turn.target, &apology).await {
                    error!(target_thread = %turn.target, "Failed to post apology: {}", e);
                }
                Ok(TurnState::Failed)
            }
            FailurePolicy::Propagate => Err(TurnError {
                kind,
                target: turn.target.clone(),
                source: error,
            }),
            FailurePolicy::LogOnly => {
                warn!(target_thread = %turn.target, "{} failed: {}", kind, error);
                Ok(resume)
            }
        }
    }
}
