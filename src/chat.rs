//! Given a chat conversation, the model will return a chat completion response.
use crate::{client::OpenAiClient, ApiResponseOrError, OpenAiError, Usage};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Option<Usage>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatCompletionChoice {
    pub index: u64,
    pub finish_reason: Option<String>,
    pub message: ChatCompletionMessage,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ChatCompletionMessage {
    /// The contents of the message. Absent when the model refuses or calls
    /// a tool instead of answering.
    pub content: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    User { content: String },
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User {
            content: content.into(),
        }
    }
}

#[derive(Serialize, Builder, Debug, Clone, PartialEq)]
#[builder(derive(Clone, Debug, PartialEq))]
#[builder(pattern = "owned")]
#[builder(name = "ChatCompletionBuilder")]
#[builder(setter(strip_option, into))]
pub struct ChatCompletionRequest {
    /// ID of the model to use.
    model: String,
    /// The messages to generate chat completions for, in order.
    messages: Vec<ChatMessage>,
    /// What sampling temperature to use, between 0 and 2. Zero always picks
    /// the most likely token.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl ChatCompletionRequest {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }
}

impl From<ChatCompletionBuilderError> for OpenAiError {
    fn from(value: ChatCompletionBuilderError) -> Self {
        OpenAiError::new(value.to_string(), "invalid_request")
    }
}

impl ChatCompletion {
    pub fn builder(model: &str, messages: impl Into<Vec<ChatMessage>>) -> ChatCompletionBuilder {
        ChatCompletionBuilder::create_empty()
            .model(model)
            .messages(messages)
    }

    pub async fn create(
        client: &OpenAiClient,
        request: &ChatCompletionRequest,
    ) -> ApiResponseOrError<Self> {
        client.post("chat/completions", request).await
    }

    /// The first choice's message, which is the only one read by this crate.
    pub fn first_message(&self) -> ApiResponseOrError<&ChatCompletionMessage> {
        self.choices
            .first()
            .map(|choice| &choice.message)
            .ok_or_else(|| OpenAiError::new("response contained no choices", "invalid_response"))
    }
}

impl ChatCompletionBuilder {
    pub async fn create(self, client: &OpenAiClient) -> ApiResponseOrError<ChatCompletion> {
        ChatCompletion::create(client, &self.build()?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Credentials;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    #[test]
    fn request_serializes_to_wire_format() {
        let request = ChatCompletion::builder("gpt-3.5-turbo", [ChatMessage::user("Hello!")])
            .temperature(0.0_f32)
            .build()
            .unwrap();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "gpt-3.5-turbo",
                "messages": [{ "role": "user", "content": "Hello!" }],
                "temperature": 0.0
            })
        );
    }

    #[test]
    fn unset_temperature_is_omitted() {
        let request = ChatCompletion::builder("gpt-4", [ChatMessage::user("Hi")])
            .build()
            .unwrap();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "gpt-4",
                "messages": [{ "role": "user", "content": "Hi" }]
            })
        );
    }

    #[test]
    fn builder_clone_and_eq() {
        let builder_a = ChatCompletion::builder("gpt-4", []).temperature(0.0_f32);
        let builder_b = builder_a.clone();
        let builder_c = builder_b.clone().temperature(1.0_f32);
        let builder_d = ChatCompletionBuilder::default();
        assert_eq!(builder_a, builder_b);
        assert_ne!(builder_a, builder_c);
        assert_ne!(builder_a, builder_d);
    }

    #[test]
    fn missing_model_is_a_request_error() {
        let error: OpenAiError = ChatCompletionBuilder::default()
            .messages([ChatMessage::user("Hi")])
            .build()
            .unwrap_err()
            .into();

        assert_eq!(error.error_type, "invalid_request");
        assert!(error.message.contains("model"));
    }

    #[test]
    fn deserializes_completion_and_reads_first_choice() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1677652288,
            "model": "gpt-3.5-turbo-0125",
            "system_fingerprint": "fp_44709d6fcb",
            "choices": [
                {
                    "index": 0,
                    "message": { "role": "assistant", "content": "Albany." },
                    "logprobs": null,
                    "finish_reason": "stop"
                },
                {
                    "index": 1,
                    "message": { "role": "assistant", "content": "New York City." },
                    "finish_reason": "stop"
                }
            ],
            "usage": { "prompt_tokens": 15, "completion_tokens": 3, "total_tokens": 18 }
        }))
        .unwrap();

        assert_eq!(
            completion.first_message().unwrap().content.as_deref(),
            Some("Albany.")
        );
        assert_eq!(completion.usage.map(|usage| usage.total_tokens), Some(18));
    }

    #[test]
    fn refusal_leaves_content_unset() {
        let message: ChatCompletionMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "refusal": "I can't help with that."
        }))
        .unwrap();

        assert_eq!(message, ChatCompletionMessage { content: None });
    }

    #[tokio::test]
    async fn builder_create_posts_to_chat_completions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_json(json!({
                "model": "gpt-3.5-turbo",
                "messages": [{ "role": "user", "content": "Hello!" }],
                "temperature": 0.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 1700000000,
                "model": "gpt-3.5-turbo-0125",
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": "Hi there." },
                    "finish_reason": "stop"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        let client = OpenAiClient::new(Credentials::new("sk-test", server.uri())).unwrap();

        let chat_completion = ChatCompletion::builder("gpt-3.5-turbo", [ChatMessage::user("Hello!")])
            .temperature(0.0_f32)
            .create(&client)
            .await
            .unwrap();

        assert_eq!(
            chat_completion.first_message().unwrap().content.as_deref(),
            Some("Hi there.")
        );
    }

    #[tokio::test]
    async fn builder_create_reports_incomplete_requests() {
        let client = OpenAiClient::new(Credentials::anonymous("http://127.0.0.1:9")).unwrap();

        let error = ChatCompletionBuilder::default()
            .messages([ChatMessage::user("Hi")])
            .create(&client)
            .await
            .unwrap_err();

        assert_eq!(error.error_type, "invalid_request");
    }

    #[test]
    fn no_choices_is_an_error() {
        let completion = ChatCompletion {
            id: "chatcmpl-0".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: "gpt-3.5-turbo".to_string(),
            choices: Vec::new(),
            usage: None,
        };

        assert_eq!(
            completion.first_message().unwrap_err().to_string(),
            "response contained no choices"
        );
    }
}
