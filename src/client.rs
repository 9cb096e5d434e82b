//! Blocking client for OpenAI-compatible `/chat/completions` endpoints
//! (Groq, OpenAI, local gateways).

use anyhow::{Context, Result};
use log::debug;
use reqwest::{StatusCode, blocking::Client};
use serde::{Deserialize, Serialize};

use crate::{
    config::ClientConfig,
    error::ServiceError,
    oracle::{CompletionService, MappingRequest},
};

const ERROR_BODY_PREVIEW: usize = 200;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    stream: bool,
    response_format: ResponseFormat,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatCompletionsClient {
    http: Client,
    config: ClientConfig,
}

impl ChatCompletionsClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("schema-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Building HTTP client for the inference service")?;
        Ok(Self { http, config })
    }
}

impl CompletionService for ChatCompletionsClient {
    fn complete(&self, request: &MappingRequest) -> Result<String, ServiceError> {
        let body = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            stream: false,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
        };
        let mut builder = self.http.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        debug!(
            "POST {} (model {})",
            self.config.endpoint, self.config.model
        );
        let response = builder
            .send()
            .map_err(|err| ServiceError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            let detail = detail.chars().take(ERROR_BODY_PREVIEW).collect::<String>();
            let message = format!("HTTP {status}: {}", detail.trim());
            return Err(if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                ServiceError::Unavailable(message)
            } else {
                ServiceError::Rejected(message)
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|err| ServiceError::Rejected(format!("unreadable completion payload: {err}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ServiceError::Rejected("completion carried no content".to_string()))
    }
}
