use crate::config::AppSettings;
use crate::models::{
    AddDiscussionCommentData, GithubCodeSearchItem, GithubCodeSearchResponse, GithubFileContent,
    GithubIssueComment, GithubSearchIssuesResponse, GithubUser, GraphQlResponse,
};
use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};
use url::Url;
use urlencoding::encode;

const USER_AGENT: &str = "discussbot";
const GITHUB_API_VERSION: &str = "2022-11-28";
const RETRY_MAX_ELAPSED: Duration = Duration::from_secs(10);
const RETRY_MAX_ATTEMPTS: u32 = 3;

const ADD_DISCUSSION_COMMENT_MUTATION: &str = r#"mutation AddDiscussionComment($discussionId: ID!, $body: String!) {
  addDiscussionComment(input: {discussionId: $discussionId, body: $body}) {
    comment {
      id
      url
    }
  }
}"#;

#[derive(Error, Debug)]
pub enum GithubError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {body}")]
    Api { status: StatusCode, body: String },
    #[error("GraphQL error: {0}")]
    GraphQl(String),
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
    #[error("Failed to deserialize response: {0}")]
    Deserialization(String),
    #[error("Failed to decode file content: {0}")]
    Decode(String),
}

/// Answers whether a user has contributed to a repository before.
#[async_trait]
pub trait ContributionHistory: Send + Sync {
    async fn is_first_contribution(
        &self,
        owner: &str,
        repo: &str,
        login: &str,
    ) -> Result<bool, GithubError>;
}

#[derive(Debug, Clone)]
pub struct GithubApiClient {
    client: Client,
    api_base: String,
    graphql_url: String,
}

impl GithubApiClient {
    pub fn new(settings: &AppSettings) -> Result<Self, GithubError> {
        // Validates the base before any request is built from it
        let parsed = Url::parse(&settings.github_api_url)?;
        let api_base = parsed.as_str().trim_end_matches('/').to_string();
        let graphql_url = graphql_endpoint(&api_base);

        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        let auth = HeaderValue::from_str(&format!("Bearer {}", settings.github_token.trim()))
            .map_err(|e| GithubError::InvalidHeader(e.to_string()))?;
        headers.insert(header::AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.request_timeout_seconds.max(1)))
            .build()?;

        Ok(Self {
            client,
            api_base,
            graphql_url,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    /// GET with exponential backoff on transport errors and 5xx responses,
    /// at most `RETRY_MAX_ATTEMPTS` tries. Only used for read-only calls.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, GithubError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(RETRY_MAX_ELAPSED))
            .build();

        let mut attempt = 0;
        backoff::future::retry(policy, || {
            attempt += 1;
            let retryable = attempt < RETRY_MAX_ATTEMPTS;
            async move {
                let response = self
                    .client
                    .get(url)
                    .query(query)
                    .send()
                    .await
                    .map_err(|e| {
                        let err = GithubError::Request(e);
                        if !retryable {
                            return backoff::Error::permanent(err);
                        }
                        warn!("GitHub {} request failed, retrying: {}", operation, err);
                        backoff::Error::transient(err)
                    })?;

                let status = response.status();
                if !status.is_success() {
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
                    let err = GithubError::Api { status, body };
                    if status.is_server_error() && retryable {
                        warn!("GitHub {} returned {}, retrying", operation, status);
                        return Err(backoff::Error::transient(err));
                    }
                    return Err(backoff::Error::permanent(err));
                }

                response.json::<T>().await.map_err(|e| {
                    backoff::Error::permanent(GithubError::Deserialization(e.to_string()))
                })
            }
        })
        .await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<T, GithubError> {
        let response = self.client.post(url).json(payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
            error!("GitHub API Error: {} - {}", status, body);
            return Err(GithubError::Api { status, body });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GithubError::Deserialization(e.to_string()))
    }

    /// The account the token authenticates as.
    #[instrument(skip(self))]
    pub async fn get_authenticated_user(&self) -> Result<GithubUser, GithubError> {
        let url = self.endpoint("user");
        self.get_json("get authenticated user", &url, &[]).await
    }

    #[instrument(skip(self, body))]
    pub async fn post_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        body: &str,
    ) -> Result<GithubIssueComment, GithubError> {
        let url = self.endpoint(&format!(
            "repos/{}/{}/issues/{}/comments",
            encode(owner),
            encode(repo),
            number
        ));
        let comment: GithubIssueComment = self.post_json(&url, &json!({ "body": body })).await?;
        debug!("Created issue comment {} on {}/{}#{}", comment.id, owner, repo, number);
        Ok(comment)
    }

    /// Replies to a discussion through the GraphQL `addDiscussionComment` mutation.
    /// Returns the node id of the created comment.
    #[instrument(skip(self, body))]
    pub async fn post_discussion_comment(
        &self,
        discussion_node_id: &str,
        body: &str,
    ) -> Result<String, GithubError> {
        let payload = json!({
            "query": ADD_DISCUSSION_COMMENT_MUTATION,
            "variables": {
                "discussionId": discussion_node_id,
                "body": body,
            }
        });

        let response: GraphQlResponse<AddDiscussionCommentData> =
            self.post_json(&self.graphql_url, &payload).await?;

        if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
            let message = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            error!("GraphQL addDiscussionComment failed: {}", message);
            return Err(GithubError::GraphQl(message));
        }

        let comment_id = response
            .data
            .map(|data| data.add_discussion_comment.comment.id)
            .ok_or_else(|| GithubError::GraphQl("response contained no data".to_string()))?;
        debug!("Created discussion comment {}", comment_id);
        Ok(comment_id)
    }

    /// Number of pull requests (any state) authored by `login` in the repository.
    #[instrument(skip(self))]
    pub async fn count_pull_requests_by_author(
        &self,
        owner: &str,
        repo: &str,
        login: &str,
    ) -> Result<u64, GithubError> {
        let url = self.endpoint("search/issues");
        let query = vec![
            ("q", format!("repo:{}/{} is:pr author:{}", owner, repo, login)),
            ("per_page", "1".to_string()),
        ];
        let response: GithubSearchIssuesResponse =
            self.get_json("search pull requests", &url, &query).await?;
        Ok(response.total_count)
    }

    /// Code search restricted to one repository. Keywords are OR-ed together.
    #[instrument(skip(self))]
    pub async fn search_code(
        &self,
        owner: &str,
        repo: &str,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<GithubCodeSearchItem>, GithubError> {
        let url = self.endpoint("search/code");
        let query = vec![
            (
                "q",
                format!("{} repo:{}/{}", keywords.join(" OR "), owner, repo),
            ),
            ("per_page", limit.max(1).to_string()),
        ];
        let response: GithubCodeSearchResponse =
            self.get_json("search code", &url, &query).await?;
        debug!(
            "Code search in {}/{} matched {} files",
            owner, repo, response.total_count
        );
        Ok(response.items)
    }

    /// Decoded file content, or `None` when the file does not exist.
    #[instrument(skip(self))]
    pub async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<Option<String>, GithubError> {
        let encoded_path = path
            .split('/')
            .map(|segment| encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = self.endpoint(&format!(
            "repos/{}/{}/contents/{}",
            encode(owner),
            encode(repo),
            encoded_path
        ));
        let query: Vec<(&str, String)> = git_ref
            .map(|r| vec![("ref", r.to_string())])
            .unwrap_or_default();

        let file: GithubFileContent = match self.get_json("get file content", &url, &query).await
        {
            Ok(file) => file,
            Err(GithubError::Api { status, .. }) if status == StatusCode::NOT_FOUND => {
                debug!("{} not found in {}/{}", path, owner, repo);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        decode_file_content(&file).map(Some)
    }
}

#[async_trait]
impl ContributionHistory for GithubApiClient {
    async fn is_first_contribution(
        &self,
        owner: &str,
        repo: &str,
        login: &str,
    ) -> Result<bool, GithubError> {
        // The pull request that triggered the lookup is already counted
        let count = self.count_pull_requests_by_author(owner, repo, login).await?;
        Ok(count <= 1)
    }
}

fn graphql_endpoint(api_base: &str) -> String {
    // GitHub Enterprise serves REST at /api/v3 and GraphQL at /api/graphql
    match api_base.strip_suffix("/v3") {
        Some(enterprise_root) if enterprise_root.ends_with("/api") => {
            format!("{}/graphql", enterprise_root)
        }
        _ => format!("{}/graphql", api_base),
    }
}

pub(crate) fn decode_file_content(file: &GithubFileContent) -> Result<String, GithubError> {
    let content = file.content.as_deref().unwrap_or_default();
    match file.encoding.as_deref() {
        Some("base64") => {
            let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = base64::decode(compact)
                .map_err(|e| GithubError::Decode(format!("{}: {}", file.path, e)))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => Ok(content.to_string()),
    }
}
