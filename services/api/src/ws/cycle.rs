//! Contains the logic for the tutor's "ReAct" (Reason and Act) cycle.

use anyhow::{Context, Result};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionTool, ChatCompletionToolArgs, FunctionObjectArgs,
};
use futures_util::StreamExt;
use rmcp::model::{CallToolRequestParam, RawContent};
use serde_json::json;
use tracing::{debug, warn};
use tutor_core::{
    llm_client::{LLMAction, LLMClient, LLMStreamEvent, TokenUsage, ToolCall},
    session::ToolClient,
    state::TutorState,
};

/// What one cycle produced: the reply to speak and the usage of every model call.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub response: String,
    pub usage: Vec<TokenUsage>,
}

/// Handles a single user utterance, driving the model through a ReAct cycle.
///
/// This involves:
/// 1.  Constructing the prompt with the current tutor state and the conversation so far.
/// 2.  Calling the model to decide on an action (speak or use tools).
/// 3.  If tools are chosen, executing them and feeding the results back to the model.
/// 4.  Collecting the final text response.
///
/// `conversation` must already end with the user's utterance.
pub async fn handle_react_cycle(
    llm_client: &dyn LLMClient,
    tools: &ToolClient,
    instructions: &str,
    tutor_state: &TutorState,
    conversation: &[ChatCompletionRequestMessage],
) -> Result<CycleOutcome> {
    // History is already in the conversation; the prompt only carries the position.
    let state_json = serde_json::to_string_pretty(&json!({
        "mode": tutor_state.mode,
        "current_topic_id": tutor_state.current_topic_id,
    }))?;
    let system_prompt_with_state = format!(
        "{}\n\n# Current Context for This Turn\n\n**Tutor State:**\n```json\n{}\n```",
        instructions, state_json
    );

    let mut messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt_with_state)
            .build()?
            .into(),
    ];
    messages.extend_from_slice(conversation);

    let tool_defs = list_tool_definitions(tools).await?;

    let decision = llm_client.decide_action(messages.clone(), tool_defs).await?;
    let mut outcome = CycleOutcome::default();
    outcome.usage.extend(decision.usage);

    match decision.action {
        LLMAction::TextResponse(response_text) => outcome.response = response_text,
        LLMAction::ToolCall(tool_calls) => {
            let mut history_with_tools = messages;
            history_with_tools.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(tool_calls.clone())
                    .build()?
                    .into(),
            );
            for call in &tool_calls {
                let result = call_tool(tools, call).await;
                history_with_tools.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(call.id.clone())
                        .content(result)
                        .build()?
                        .into(),
                );
            }

            let mut final_stream = llm_client.stream_after_tools(history_with_tools).await?;
            while let Some(event_result) = final_stream.next().await {
                match event_result {
                    Ok(LLMStreamEvent::TextChunk(chunk)) => outcome.response.push_str(&chunk),
                    Ok(LLMStreamEvent::Usage(usage)) => outcome.usage.push(usage),
                    Err(e) => warn!(error = ?e, "Error in model response stream"),
                }
            }
        }
    }

    Ok(outcome)
}

/// Converts the registered tool set into function definitions for the model.
async fn list_tool_definitions(tools: &ToolClient) -> Result<Vec<ChatCompletionTool>> {
    tools
        .list_all_tools()
        .await?
        .into_iter()
        .map(|t| {
            Ok(ChatCompletionToolArgs::default()
                .function(
                    FunctionObjectArgs::default()
                        .name(t.name)
                        .description(t.description.unwrap_or_default())
                        .parameters(serde_json::to_value(&*t.input_schema)?)
                        .build()?,
                )
                .build()?)
        })
        .collect()
}

/// Executes one tool call. Failures become the tool's textual result so the
/// model can explain them to the user.
async fn call_tool(tools: &ToolClient, call: &ToolCall) -> String {
    let name = call.function.name.clone();
    debug!(tool = %name, arguments = %call.function.arguments, "Calling tool");
    match try_call_tool(tools, call).await {
        Ok(text) => text,
        Err(e) => {
            warn!(tool = %name, error = ?e, "Tool call failed");
            format!("Tool '{}' failed: {}", name, e)
        }
    }
}

async fn try_call_tool(tools: &ToolClient, call: &ToolCall) -> Result<String> {
    let raw_arguments = call.function.arguments.trim();
    let arguments = if raw_arguments.is_empty() {
        None
    } else {
        Some(serde_json::from_str(raw_arguments).context("Tool arguments were not a JSON object")?)
    };

    let result = tools
        .peer()
        .call_tool(CallToolRequestParam {
            name: call.function.name.clone().into(),
            arguments,
        })
        .await?;

    let annotated_content = result
        .content
        .context("Tool call returned no content")?
        .pop()
        .context("Content list was empty")?;
    Ok(match annotated_content.raw {
        RawContent::Text(text_content) => text_content.text,
        _ => "{\"error\": \"Unexpected content type from tool\"}".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_openai::types::{
        ChatCompletionRequestUserMessageArgs, ChatCompletionToolType, FunctionCall,
    };
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex as StdMutex};
    use tokio::sync::Mutex;
    use tutor_core::{
        agent::{TutorService, Userdata},
        content::ContentStore,
        llm_client::{LLMDecision, LLMStream},
        orchestrator::serve_tools,
    };

    /// Replays a fixed decision and a fixed stream, recording what it was sent.
    struct ScriptedLLM {
        decision: StdMutex<Option<LLMDecision>>,
        chunks: Vec<&'static str>,
        seen_tools: StdMutex<Vec<String>>,
        seen_followup: StdMutex<Option<String>>,
    }

    impl ScriptedLLM {
        fn new(action: LLMAction, chunks: Vec<&'static str>) -> Self {
            Self {
                decision: StdMutex::new(Some(LLMDecision {
                    action,
                    usage: Some(TokenUsage {
                        prompt_tokens: 100,
                        completion_tokens: 10,
                    }),
                })),
                chunks,
                seen_tools: StdMutex::new(vec![]),
                seen_followup: StdMutex::new(None),
            }
        }
    }

    #[async_trait]
    impl LLMClient for ScriptedLLM {
        async fn decide_action(
            &self,
            _messages: Vec<ChatCompletionRequestMessage>,
            tools: Vec<ChatCompletionTool>,
        ) -> Result<LLMDecision> {
            *self.seen_tools.lock().unwrap() =
                tools.into_iter().map(|t| t.function.name).collect();
            self.decision
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| anyhow!("decision already used"))
        }

        async fn stream_after_tools(
            &self,
            messages: Vec<ChatCompletionRequestMessage>,
        ) -> Result<LLMStream> {
            *self.seen_followup.lock().unwrap() = Some(serde_json::to_string(&messages)?);
            let mut events: Vec<Result<LLMStreamEvent, async_openai::error::OpenAIError>> = self
                .chunks
                .iter()
                .map(|c| Ok(LLMStreamEvent::TextChunk(c.to_string())))
                .collect();
            events.push(Ok(LLMStreamEvent::Usage(TokenUsage {
                prompt_tokens: 150,
                completion_tokens: 20,
            })));
            Ok(Box::pin(futures_util::stream::iter(events)))
        }
    }

    fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            r#type: ChatCompletionToolType::Function,
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    fn user_turn(text: &str) -> Vec<ChatCompletionRequestMessage> {
        vec![
            ChatCompletionRequestUserMessageArgs::default()
                .content(text)
                .build()
                .unwrap()
                .into(),
        ]
    }

    async fn tool_client() -> (ToolClient, Arc<Mutex<Userdata>>, tokio::task::JoinHandle<()>) {
        let content = ContentStore::from_json_str(
            r#"[{"id": "loops", "title": "Loops", "summary": "Loops repeat code blocks."}]"#,
        )
        .unwrap();
        let userdata = Arc::new(Mutex::new(Userdata::new(None)));
        let service = TutorService::new(Arc::new(content), userdata.clone(), None);
        let (client, handle) = serve_tools(service).await.unwrap();
        (client, userdata, handle)
    }

    #[tokio::test]
    async fn test_text_response_skips_tools() {
        let (tools, _userdata, handle) = tool_client().await;
        let llm = ScriptedLLM::new(
            LLMAction::TextResponse("Which mode would you like?".to_string()),
            vec![],
        );

        let outcome = handle_react_cycle(
            &llm,
            &tools,
            "Be a tutor.",
            &TutorState::default(),
            &user_turn("hi"),
        )
        .await
        .unwrap();

        assert_eq!(outcome.response, "Which mode would you like?");
        assert_eq!(outcome.usage.len(), 1);
        assert!(llm.seen_followup.lock().unwrap().is_none());
        assert_eq!(llm.seen_tools.lock().unwrap().len(), 7);
        handle.abort();
    }

    #[tokio::test]
    async fn test_tool_call_results_feed_the_followup() {
        let (tools, userdata, handle) = tool_client().await;
        let llm = ScriptedLLM::new(
            LLMAction::ToolCall(vec![
                tool_call("call_1", "select_topic", r#"{"topic_id": "Loops"}"#),
                tool_call("call_2", "explain_topic", ""),
            ]),
            vec!["Loops ", "repeat code."],
        );

        let outcome = handle_react_cycle(
            &llm,
            &tools,
            "Be a tutor.",
            &TutorState::default(),
            &user_turn("teach me loops"),
        )
        .await
        .unwrap();

        assert_eq!(outcome.response, "Loops repeat code.");
        assert_eq!(
            outcome.usage,
            vec![
                TokenUsage {
                    prompt_tokens: 100,
                    completion_tokens: 10
                },
                TokenUsage {
                    prompt_tokens: 150,
                    completion_tokens: 20
                },
            ]
        );

        let followup = llm.seen_followup.lock().unwrap().clone().unwrap();
        assert!(followup.contains("Selected topic: Loops."));
        assert!(followup.contains("Loops repeat code blocks."));
        assert!(followup.contains("call_2"));

        let state = userdata.lock().await.tutor_state.clone();
        assert_eq!(state.current_topic_id.as_deref(), Some("loops"));
        handle.abort();
    }

    #[tokio::test]
    async fn test_failed_tool_call_degrades_to_text() {
        let (tools, _userdata, handle) = tool_client().await;
        let llm = ScriptedLLM::new(
            LLMAction::ToolCall(vec![
                tool_call("call_1", "select_topic", "not json"),
                tool_call("call_2", "launch_rocket", "{}"),
            ]),
            vec!["Sorry, something went wrong."],
        );

        let outcome = handle_react_cycle(
            &llm,
            &tools,
            "Be a tutor.",
            &TutorState::default(),
            &user_turn("teach me loops"),
        )
        .await
        .unwrap();

        assert_eq!(outcome.response, "Sorry, something went wrong.");
        let followup = llm.seen_followup.lock().unwrap().clone().unwrap();
        assert!(followup.contains("Tool 'select_topic' failed"));
        assert!(followup.contains("Tool 'launch_rocket' failed"));
        handle.abort();
    }
}
