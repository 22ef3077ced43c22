//! Answer generation over an OpenAI-compatible chat-completions API.
//!
//! The pipeline only sees the [`Generator`] trait: given a system prompt,
//! the prior conversation and a formatted context, return text or a
//! [`GenerationError`]. Providers:
//!
//! | Provider | Endpoint |
//! |----------|----------|
//! | `openrouter` | `https://openrouter.ai/api/v1/chat/completions` (default) |
//! | `openai` | `https://api.openai.com/v1/chat/completions` |
//! | `disabled` | always fails with [`GenerationError::Disabled`] |

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::error::GenerationError;

pub const SYSTEM_PROMPT: &str = "You are a knowledgeable assistant that answers questions based on provided context. Always cite the source files when referencing information. Be accurate and concise.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything a generator needs for one answer.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub system_prompt: &'a str,
    /// Earlier turns of the session, oldest first.
    pub history: &'a [ChatTurn],
    /// The rendered user prompt (context and question).
    pub prompt: &'a str,
}

impl GenerationRequest<'_> {
    /// The full message list sent to a chat model.
    pub fn messages(&self) -> Vec<ChatTurn> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatTurn {
            role: Role::System,
            content: self.system_prompt.to_string(),
        });
        messages.extend(self.history.iter().cloned());
        messages.push(ChatTurn::user(self.prompt));
        messages
    }
}

/// Render retrieved chunks as `[Source: file]` blocks.
pub fn format_context<'a>(chunks: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (source_file, text) in chunks {
        out.push_str(&format!("[Source: {}]\n{}\n\n", source_file, text));
    }
    out
}

pub fn build_user_prompt(context: &str, question: &str) -> String {
    format!(
        "Context from uploaded documents:\n{}\n\nQuestion: {}\n\n\
         Please provide a comprehensive answer based on the context above. \
         If the context doesn't contain enough information to fully answer the question, please say so.",
        context, question
    )
}

pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError>;
}

pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "openrouter" | "openai" => Ok(Box::new(ChatCompletionsGenerator::new(config)?)),
        other => bail!(
            "Unknown generation provider: '{}'. Must be 'openrouter', 'openai', or 'disabled'.",
            other
        ),
    }
}

// ============ Disabled Provider ============

pub struct DisabledGenerator;

impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn generate(&self, _request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        Err(GenerationError::Disabled)
    }
}

// ============ Chat Completions Provider ============

/// Blocking client for `POST {base_url}/chat/completions`.
///
/// The API key is read from the environment when a request is made, so a
/// missing key surfaces as a generation failure rather than a startup error.
pub struct ChatCompletionsGenerator {
    client: Client,
    endpoint: String,
    api_key_env: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build generation HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.resolved_base_url()),
            api_key_env: config.resolved_api_key_env(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        })
    }
}

impl Generator for ChatCompletionsGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        let api_key = std::env::var(&self.api_key_env)
            .map_err(|_| GenerationError::MissingApiKey(self.api_key_env.clone()))?;

        let body = ChatRequest {
            model: &self.model,
            messages: request.messages(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key.trim())
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.timeout_secs)
                } else {
                    GenerationError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        let text = resp.text().map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(self.timeout_secs)
            } else {
                GenerationError::Transport(e.to_string())
            }
        })?;
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_chat_response(&text)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// Extract the first choice's content from a chat-completions body.
pub(crate) fn parse_chat_response(body: &str) -> Result<String, GenerationError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Malformed("response has no choices".to_string()))?
        .message
        .content
        .ok_or_else(|| GenerationError::Malformed("choice has no message content".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Paris."}},{"index":1,"message":{"role":"assistant","content":"Lyon."}}]}"#;
        assert_eq!(parse_chat_response(body).unwrap(), "Paris.");
    }

    #[test]
    fn malformed_bodies_are_errors() {
        for body in [
            "not json",
            r#"{"choices":[]}"#,
            r#"{"error":{"message":"rate limited"}}"#,
            r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#,
        ] {
            let err = parse_chat_response(body).unwrap_err();
            assert!(matches!(err, GenerationError::Malformed(_)), "{}", body);
        }
    }

    #[test]
    fn context_blocks_name_their_source() {
        let ctx = format_context([("a.txt", "Alpha fact."), ("b.md", "Beta fact.")]);
        assert_eq!(ctx, "[Source: a.txt]\nAlpha fact.\n\n[Source: b.md]\nBeta fact.\n\n");
    }

    #[test]
    fn user_prompt_embeds_context_and_question() {
        let prompt = build_user_prompt("[Source: a.txt]\nAlpha.\n\n", "What is alpha?");
        assert!(prompt.starts_with("Context from uploaded documents:\n[Source: a.txt]"));
        assert!(prompt.contains("\n\nQuestion: What is alpha?\n\n"));
        assert!(prompt.ends_with("please say so."));
    }

    #[test]
    fn messages_put_system_first_and_prompt_last() {
        let history = vec![ChatTurn::user("earlier"), ChatTurn::assistant("reply")];
        let request = GenerationRequest {
            system_prompt: SYSTEM_PROMPT,
            history: &history,
            prompt: "now",
        };
        let messages = request.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1], history[0]);
        assert_eq!(messages[3], ChatTurn::user("now"));
        let json = serde_json::to_value(&messages[2]).unwrap();
        assert_eq!(json["role"], "assistant");
    }

    #[test]
    fn disabled_generator_always_fails() {
        let request = GenerationRequest {
            system_prompt: SYSTEM_PROMPT,
            history: &[],
            prompt: "q",
        };
        assert!(matches!(
            DisabledGenerator.generate(&request),
            Err(GenerationError::Disabled)
        ));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = GenerationConfig {
            provider: "magic".to_string(),
            ..Default::default()
        };
        assert!(create_generator(&config).is_err());
    }

    #[test]
    fn missing_api_key_is_a_generation_error() {
        let config = GenerationConfig {
            api_key_env: Some("RAGTRACE_TEST_KEY_THAT_IS_NOT_SET".to_string()),
            ..Default::default()
        };
        let generator = ChatCompletionsGenerator::new(&config).unwrap();
        let request = GenerationRequest {
            system_prompt: SYSTEM_PROMPT,
            history: &[],
            prompt: "q",
        };
        let err = generator.generate(&request).unwrap_err();
        assert!(err
            .to_string()
            .contains("RAGTRACE_TEST_KEY_THAT_IS_NOT_SET environment variable not set"));
    }
}
