use crate::config::AppSettings;
use crate::context::ContextAssembler;
use crate::models::OpenAIChatMessage;
use crate::openai::{OpenAIApiClient, OpenAIClient};
use crate::templates;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, trace};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions in a GitHub repository's discussions. \
Ground every answer in the repository context you are given. If the context does not contain the answer, say so \
plainly instead of guessing. Reply in GitHub-flavored Markdown.";

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Failed to communicate with OpenAI: {0}")]
    Client(#[from] OpenAIClient),
    #[error("No response choices from OpenAI")]
    NoChoices,
    #[error("LLM response content is empty")]
    EmptyResponse,
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate_answer(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        context: &str,
    ) -> Result<String, GenerationError>;

    async fn generate_follow_up_answer(
        &self,
        repo: &str,
        discussion_context: &str,
        query: &str,
        context: &str,
    ) -> Result<String, GenerationError>;

    fn generate_help_message(&self, user: &str) -> String;
}

pub struct OpenAiAnswerGenerator {
    client: OpenAIApiClient,
    settings: Arc<AppSettings>,
}

impl OpenAiAnswerGenerator {
    pub fn new(client: OpenAIApiClient, settings: Arc<AppSettings>) -> Self {
        Self { client, settings }
    }

    fn with_prefix(&self, prompt: String) -> String {
        match self.settings.prompt_prefix.as_deref() {
            Some(prefix) if !prefix.trim().is_empty() => format!("{}\n\n{}", prefix, prompt),
            _ => prompt,
        }
    }

    async fn complete(&self, prompt: String) -> Result<String, GenerationError> {
        let prompt = self.with_prefix(prompt);
        trace!("Formatted prompt for LLM:\n{}", prompt);

        let request = self.client.build_request(vec![
            OpenAIChatMessage::system(SYSTEM_PROMPT),
            OpenAIChatMessage::user(prompt),
        ]);

        let response = self.client.send_chat_completion(&request).await.map_err(|e| {
            error!("Failed to communicate with OpenAI: {}", e);
            GenerationError::Client(e)
        })?;
        debug!("OpenAI response id: {}", response.id);

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(GenerationError::NoChoices)?;
        match choice.message.content {
            Some(content) if !content.trim().is_empty() => Ok(content.trim().to_string()),
            _ => Err(GenerationError::EmptyResponse),
        }
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiAnswerGenerator {
    async fn generate_answer(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        let prompt = format!(
            "A user opened a new discussion in the `{repo}` repository.\n\n{}\n\
             --- REPOSITORY CONTEXT ---\n{context}\n\n\
             Answer the user's question using the repository context above.",
            ContextAssembler::for_new_discussion(title, body)
        );
        self.complete(prompt).await
    }

    async fn generate_follow_up_answer(
        &self,
        repo: &str,
        discussion_context: &str,
        query: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        let prompt = format!(
            "A user asked a follow-up question in a discussion of the `{repo}` repository.\n\n\
             {discussion_context}\n\
             --- FOLLOW-UP QUESTION ---\n{query}\n\n\
             --- REPOSITORY CONTEXT ---\n{context}\n\n\
             Answer the follow-up question, taking the original discussion into account."
        );
        self.complete(prompt).await
    }

    fn generate_help_message(&self, user: &str) -> String {
        templates::help_message(user)
    }
}
