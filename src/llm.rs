//! OpenAI-compatible chat completions.

use derive_more::{Display, From};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};

use crate::config;

#[derive(Debug, Display, From)]
pub enum Error {
    #[display("completion request failed: {_0}")]
    #[from]
    Request(reqwest_middleware::Error),

    #[display("completion response unreadable: {_0}")]
    #[from]
    Response(reqwest::Error),

    #[display("completion service answered with {_0}")]
    Status(reqwest::StatusCode),
}

#[derive(Clone)]
pub struct Client {
    http: ClientWithMiddleware,
    config: config::Llm,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl Client {
    pub fn new(config: config::Llm) -> Self {
        let retry_policy = ExponentialBackoff::builder()
            .build_with_max_retries(config.max_retries);
        let http = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Self { http, config }
    }

    /// Sends `prompt` as a single user message and returns the first choice's
    /// text, or an empty string when the model produced none.
    pub async fn complete(&self, prompt: &str) -> Result<String, Error> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };
        let response = self
            .http
            .post(&self.config.url)
            .bearer_auth(&self.config.token)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Status(response.status()));
        }
        Ok(response
            .json::<ChatResponse>()
            .await?
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default())
    }
}
