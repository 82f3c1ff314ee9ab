use crate::github::{GithubApiClient, GithubError};
use async_trait::async_trait;
use std::fmt;
use tracing::debug;

/// Where a turn's comments go. Fixed for the whole turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyTarget {
    /// A discussion thread, addressed by its GraphQL node id.
    Discussion { node_id: String },
    /// An issue or pull request conversation.
    Issue {
        owner: String,
        repo: String,
        number: i64,
    },
}

impl fmt::Display for ReplyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyTarget::Discussion { node_id } => write!(f, "discussion {}", node_id),
            ReplyTarget::Issue {
                owner,
                repo,
                number,
            } => write!(f, "{}/{}#{}", owner, repo, number),
        }
    }
}

#[async_trait]
pub trait ReplyGateway: Send + Sync {
    async fn post_threaded_reply(&self, target: &ReplyTarget, text: &str)
        -> Result<(), GithubError>;
}

#[async_trait]
impl ReplyGateway for GithubApiClient {
    async fn post_threaded_reply(
        &self,
        target: &ReplyTarget,
        text: &str,
    ) -> Result<(), GithubError> {
        match target {
            ReplyTarget::Discussion { node_id } => {
                self.post_discussion_comment(node_id, text).await?;
            }
            ReplyTarget::Issue {
                owner,
                repo,
                number,
            } => {
                self.post_issue_comment(owner, repo, *number, text).await?;
            }
        }
        debug!("Posted reply to {}", target);
        Ok(())
    }
}
