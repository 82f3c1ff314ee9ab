use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubUser {
    pub id: i64,
    pub login: String,
    #[serde(rename = "type", default)]
    pub user_type: Option<String>, // "User", "Bot", "Organization"
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubRepository {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub owner: GithubUser,
    #[serde(default)]
    pub default_branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubDiscussion {
    pub id: i64,
    pub node_id: String, // GraphQL global id, the reply target for discussion comments
    pub number: i64,
    pub title: String,
    pub body: Option<String>,
    pub user: GithubUser,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubDiscussionComment {
    pub id: i64,
    pub node_id: String,
    pub body: String,
    pub user: GithubUser,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubPullRequest {
    pub id: i64,
    pub number: i64,
    pub title: String,
    pub body: Option<String>,
    pub user: GithubUser,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Payload of the `discussion` webhook event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscussionEvent {
    pub action: String,
    pub discussion: GithubDiscussion,
    pub repository: GithubRepository,
    #[serde(default)]
    pub sender: Option<GithubUser>,
}

/// Payload of the `discussion_comment` webhook event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscussionCommentEvent {
    pub action: String,
    pub discussion: GithubDiscussion,
    pub comment: GithubDiscussionComment,
    pub repository: GithubRepository,
    #[serde(default)]
    pub sender: Option<GithubUser>,
}

/// Payload of the `pull_request` webhook event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub number: i64,
    pub pull_request: GithubPullRequest,
    pub repository: GithubRepository,
    #[serde(default)]
    pub sender: Option<GithubUser>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubIssueComment {
    pub id: i64,
    pub body: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubSearchIssuesResponse {
    pub total_count: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubCodeSearchItem {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubCodeSearchResponse {
    pub total_count: u64,
    pub items: Vec<GithubCodeSearchItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubFileContent {
    pub name: String,
    pub path: String,
    pub size: usize,
    pub content: Option<String>,
    pub encoding: Option<String>, // "base64" for files
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscussionCommentNode {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AddDiscussionCommentPayload {
    pub comment: DiscussionCommentNode,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AddDiscussionCommentData {
    #[serde(rename = "addDiscussionComment")]
    pub add_discussion_comment: AddDiscussionCommentPayload,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OpenAIChatMessage {
    pub role: String, // e.g., "system", "user", "assistant"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl OpenAIChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAIChatRequest {
    pub model: String,
    pub messages: Vec<OpenAIChatMessage>,
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAIChatChoice {
    pub index: u32,
    pub message: OpenAIChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAIUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: Option<u32>,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAIChatResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<OpenAIChatChoice>,
    pub usage: Option<OpenAIUsage>,
}
