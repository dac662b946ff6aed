use crate::usage::SessionMetrics;
use anyhow::{Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionStreamOptions, ChatCompletionTool,
        CompletionUsage, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
        CreateChatCompletionStreamResponse,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Represents a tool call requested by the LLM.
pub type ToolCall = async_openai::types::ChatCompletionMessageToolCall;

/// Token counts reported for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl From<&CompletionUsage> for TokenUsage {
    fn from(usage: &CompletionUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        }
    }
}

impl From<TokenUsage> for SessionMetrics {
    fn from(usage: TokenUsage) -> Self {
        SessionMetrics::Llm {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        }
    }
}

/// Represents the events that can be yielded from a streaming text response.
#[derive(Debug, Clone)]
pub enum LLMStreamEvent {
    TextChunk(String),
    /// Sent once, after the last chunk.
    Usage(TokenUsage),
}

/// A stream of text chunks from the LLM.
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMStreamEvent, OpenAIError>> + Send>>;

/// Represents the two possible outcomes of the LLM's initial decision-making turn.
#[derive(Debug, Clone)]
pub enum LLMAction {
    /// The LLM decided to respond directly with text.
    TextResponse(String),
    /// The LLM decided to call one or more tools.
    ToolCall(Vec<ToolCall>),
}

/// The LLM's decision together with what it cost.
#[derive(Debug, Clone)]
pub struct LLMDecision {
    pub action: LLMAction,
    pub usage: Option<TokenUsage>,
}

/// A generic client for interacting with an LLM.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes a single, non-streaming call to the LLM to decide on the next action.
    async fn decide_action(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
    ) -> Result<LLMDecision>;

    /// Makes a streaming call to the LLM after tools have been executed.
    async fn stream_after_tools(
        &self,
        messages_with_tool_results: Vec<ChatCompletionRequestMessage>,
    ) -> Result<LLMStream>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The specific model identifier to use for chat completions (e.g., "gpt-4o").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn decide_action(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
    ) -> Result<LLMDecision> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .tools(tools)
            .tool_choice("auto")
            .build()?;

        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;
        let usage = response.usage.as_ref().map(TokenUsage::from);
        let choice = response
            .choices
            .first()
            .ok_or_else(|| anyhow!("LLM response contained no choices."))?;

        let action = if let Some(tool_calls) = &choice.message.tool_calls {
            LLMAction::ToolCall(tool_calls.clone())
        } else if let Some(content) = &choice.message.content {
            LLMAction::TextResponse(content.clone())
        } else {
            return Err(anyhow!(
                "LLM response had neither text content nor tool calls."
            ));
        };

        Ok(LLMDecision { action, usage })
    }

    async fn stream_after_tools(
        &self,
        messages_with_tool_results: Vec<ChatCompletionRequestMessage>,
    ) -> Result<LLMStream> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages_with_tool_results)
            .stream(true)
            .stream_options(ChatCompletionStreamOptions {
                include_usage: true,
            })
            .build()?;

        let stream = self.client.chat().create_stream(request).await?;

        Ok(Box::pin(stream.flat_map(|result| {
            let events: Vec<Result<LLMStreamEvent, OpenAIError>> = match result {
                Ok(response) => chunk_events(&response).into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            futures::stream::iter(events)
        })))
    }
}

/// Splits one stream chunk into events. Text comes before usage; some
/// providers attach usage to the last content chunk.
fn chunk_events(response: &CreateChatCompletionStreamResponse) -> Vec<LLMStreamEvent> {
    let mut events = Vec::new();
    if let Some(content) = response
        .choices
        .first()
        .and_then(|choice| choice.delta.content.clone())
        .filter(|content| !content.is_empty())
    {
        events.push(LLMStreamEvent::TextChunk(content));
    }
    if let Some(usage) = &response.usage {
        events.push(LLMStreamEvent::Usage(usage.into()));
    }
    events
}
