use crate::config::AppSettings;
use crate::models::{OpenAIChatMessage, OpenAIChatRequest, OpenAIChatResponse};
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument};
use url::Url;

pub const OPENAI_CHAT_COMPLETIONS_PATH: &str = "chat/completions";

#[derive(Error, Debug)]
pub enum OpenAIClient {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {body}")]
    Api { status: StatusCode, body: String },
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("Failed to deserialize response: {0}")]
    Deserialization(reqwest::Error),
}

#[derive(Debug)]
pub struct OpenAIApiClient {
    client: Client,
    chat_completions_url: Url,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    token_mode: String,
}

impl OpenAIApiClient {
    pub fn new(settings: &AppSettings) -> Result<Self, OpenAIClient> {
        let mut base = Url::parse(&settings.openai_custom_url)?;
        // Url::join replaces the last segment unless the base ends with '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let chat_completions_url = base.join(OPENAI_CHAT_COMPLETIONS_PATH)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds.max(1)))
            .build()?;

        Ok(Self {
            client,
            chat_completions_url,
            api_key: settings.openai_api_key.clone(),
            model: settings.openai_model.clone(),
            temperature: settings.openai_temperature,
            max_tokens: settings.openai_max_tokens,
            token_mode: settings.openai_token_mode.clone(),
        })
    }

    /// A request for the configured model, honoring the token parameter mode.
    pub fn build_request(&self, messages: Vec<OpenAIChatMessage>) -> OpenAIChatRequest {
        let (max_tokens, max_completion_tokens) = if self.token_mode == "max_completion_tokens" {
            (None, Some(self.max_tokens))
        } else {
            (Some(self.max_tokens), None)
        };

        OpenAIChatRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(self.temperature),
            max_tokens,
            max_completion_tokens,
        }
    }

    #[instrument(skip(self, request_payload), fields(model = %request_payload.model))]
    pub async fn send_chat_completion(
        &self,
        request_payload: &OpenAIChatRequest,
    ) -> Result<OpenAIChatResponse, OpenAIClient> {
        debug!(
            "Sending chat completion request to: {}",
            self.chat_completions_url
        );

        let response = self
            .client
            .post(self.chat_completions_url.clone())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::CONTENT_TYPE, "application/json")
            .json(request_payload)
            .send()
            .await
            .map_err(OpenAIClient::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
            error!("OpenAI API Error: {} - {}", status, body);
            return Err(OpenAIClient::Api { status, body });
        }

        let parsed_response = response
            .json::<OpenAIChatResponse>()
            .await
            .map_err(OpenAIClient::Deserialization)?;

        Ok(parsed_response)
    }
}
