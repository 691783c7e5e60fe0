//! The one question this program asks.
//!
//! [`PromptRunner::run`] sends a single fixed chat request and returns the
//! first choice's text. Whatever happens, [`render`] turns the outcome into
//! the one line the binary prints.

use crate::{
    chat::{ChatCompletion, ChatCompletionBuilder, ChatMessage},
    client::OpenAiClient,
    ApiResponseOrError, Credentials,
};

pub const PROMPT: &str = "What is the capital of New York?";
pub const MODEL: &str = "gpt-3.5-turbo";
pub const TEMPERATURE: f32 = 0.0;

#[derive(Debug, Clone)]
pub struct PromptRunner {
    client: OpenAiClient,
}

impl PromptRunner {
    pub fn new(credentials: Credentials) -> ApiResponseOrError<Self> {
        Ok(Self {
            client: OpenAiClient::new(credentials)?,
        })
    }

    /// The request every run sends, independent of configuration.
    pub fn builder() -> ChatCompletionBuilder {
        ChatCompletion::builder(MODEL, [ChatMessage::user(PROMPT)]).temperature(TEMPERATURE)
    }

    /// Sends the request once. No retries.
    ///
    /// A first choice without content yields an empty string.
    pub async fn run(&self) -> ApiResponseOrError<String> {
        let completion = Self::builder().create(&self.client).await?;
        log::debug!(
            "completion {} from {} ({} choices)",
            completion.id,
            completion.model,
            completion.choices.len()
        );

        let message = completion.first_message()?;
        Ok(message.content.clone().unwrap_or_default())
    }
}

/// The text to print for an outcome. Failures are not distinguished from
/// one another, or from a reply.
pub fn render(outcome: ApiResponseOrError<String>) -> String {
    match outcome {
        Ok(reply) => reply,
        Err(error) => error.to_string(),
    }
}

/// Builds a runner, runs it once and renders the outcome.
pub async fn run_once(credentials: Credentials) -> String {
    let outcome = match PromptRunner::new(credentials) {
        Ok(runner) => runner.run().await,
        Err(error) => Err(error),
    };
    render(outcome)
}
