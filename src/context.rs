use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Supplies repository text relevant to a search string.
#[async_trait]
pub trait RetrievalSource: Send + Sync {
    async fn get_context_for_query(&self, owner: &str, repo: &str, search_text: &str)
        -> Result<String>;
}

/// Everything a follow-up answer needs besides the question itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledContext {
    /// Title and body of the discussion that started the thread.
    pub discussion: String,
    /// Whatever the retrieval source returned, untouched.
    pub repository: String,
}

/// The "original post" block shared by fresh answers and follow-ups.
fn original_post(title: &str, body: &str) -> String {
    format!(
        "--- ORIGINAL DISCUSSION TITLE ---\n{}\n\n--- ORIGINAL DISCUSSION BODY ---\n{}\n",
        title, body
    )
}

#[derive(Clone)]
pub struct ContextAssembler {
    retrieval: Arc<dyn RetrievalSource>,
}

impl ContextAssembler {
    pub fn new(retrieval: Arc<dyn RetrievalSource>) -> Self {
        Self { retrieval }
    }

    pub fn for_new_discussion(title: &str, body: &str) -> String {
        original_post(title, body)
    }

    /// Search text for a fresh discussion: the whole post.
    pub fn new_discussion_search_text(title: &str, body: &str) -> String {
        format!("{} {}", title, body)
    }

    /// Repository context for a fresh discussion. The original post goes to
    /// generation separately, so only the retrieved text is returned.
    pub async fn retrieve_for_new_discussion(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
    ) -> Result<String> {
        let search_text = Self::new_discussion_search_text(title, body);
        self.retrieve(owner, repo, &search_text).await
    }

    /// Follow-ups search with the new question only, not the whole thread.
    pub async fn for_follow_up(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        query: &str,
    ) -> Result<AssembledContext> {
        let repository = self.retrieve(owner, repo, query).await?;
        Ok(AssembledContext {
            discussion: original_post(title, body),
            repository,
        })
    }

    async fn retrieve(&self, owner: &str, repo: &str, search_text: &str) -> Result<String> {
        debug!(
            owner = %owner,
            repo = %repo,
            search_len = search_text.len(),
            "Retrieving repository context"
        );
        self.retrieval
            .get_context_for_query(owner, repo, search_text)
            .await
    }
}
