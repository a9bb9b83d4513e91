// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter bridging the Anthropic wire protocol to the
//! provider-neutral [`LlmProvider`] contract.

use async_trait::async_trait;
use steward_core::{
    LlmBlock, LlmMessage, LlmProvider, LlmReply, LlmRequest, LlmRole, StewardError, TokenUsage,
    ToolCall,
};

use crate::client::AnthropicClient;
use crate::types::{
    ApiContent, ApiContentBlock, ApiMessage, MessageRequest, ResponseContentBlock, ToolDefinition,
};

/// Anthropic-backed implementation of [`LlmProvider`].
pub struct AnthropicProvider {
    client: AnthropicClient,
}

impl AnthropicProvider {
    /// Wraps an [`AnthropicClient`].
    pub fn new(client: AnthropicClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: LlmRequest) -> Result<LlmReply, StewardError> {
        // Model identifiers are free strings from the caller; anything that
        // is not a Claude model is rejected before touching the wire.
        if !request.model.starts_with("claude-") {
            return Err(StewardError::BadModel {
                model: request.model,
            });
        }

        let wire = render_request(&request);
        let response = self.client.complete_message(&wire).await?;

        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();
        for block in response.content {
            match block {
                ResponseContentBlock::Text { text } => text_parts.push(text),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall { id, name, input });
                }
            }
        }

        Ok(LlmReply {
            text: if text_parts.is_empty() {
                None
            } else {
                Some(text_parts.join("\n"))
            },
            tool_calls,
            stop_reason: response.stop_reason,
            usage: TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
                cache_read_tokens: response.usage.cache_read_input_tokens,
                cache_creation_tokens: response.usage.cache_creation_input_tokens,
            },
        })
    }

    fn default_model(&self) -> &str {
        self.client.default_model()
    }
}

/// Renders a provider-neutral request into the Anthropic wire format.
fn render_request(request: &LlmRequest) -> MessageRequest {
    let messages = request.messages.iter().map(render_message).collect();

    let tools: Vec<ToolDefinition> = request
        .tools
        .iter()
        .map(|spec| ToolDefinition {
            name: spec.name.clone(),
            description: spec.description.clone(),
            input_schema: spec.input_schema.clone(),
        })
        .collect();

    MessageRequest {
        model: request.model.clone(),
        messages,
        system: Some(request.system_prompt.clone()),
        max_tokens: request.max_tokens,
        stream: false,
        tools: if tools.is_empty() { None } else { Some(tools) },
    }
}

fn render_message(message: &LlmMessage) -> ApiMessage {
    let role = match message.role {
        LlmRole::User => "user",
        LlmRole::Assistant => "assistant",
    };

    // A single text block collapses to plain string content.
    if let [LlmBlock::Text { text }] = message.blocks.as_slice() {
        return ApiMessage {
            role: role.to_string(),
            content: ApiContent::Text(text.clone()),
        };
    }

    let blocks = message
        .blocks
        .iter()
        .map(|block| match block {
            LlmBlock::Text { text } => ApiContentBlock::Text { text: text.clone() },
            LlmBlock::ToolUse { id, name, input } => ApiContentBlock::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
            LlmBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => ApiContentBlock::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content.clone(),
                is_error: *is_error,
            },
        })
        .collect();

    ApiMessage {
        role: role.to_string(),
        content: ApiContent::Blocks(blocks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_core::{ToolClass, ToolSpec};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> AnthropicProvider {
        let client = AnthropicClient::new(
            "test-key".into(),
            "2023-06-01".into(),
            "claude-sonnet-4-20250514".into(),
        )
        .unwrap()
        .with_base_url(server.uri());
        AnthropicProvider::new(client)
    }

    fn request_with(messages: Vec<LlmMessage>) -> LlmRequest {
        LlmRequest {
            model: "claude-sonnet-4-20250514".into(),
            system_prompt: "You are a DevOps agent.".into(),
            messages,
            tools: vec![ToolSpec {
                name: "kubectl_get_pods".into(),
                description: "List pods".into(),
                input_schema: serde_json::json!({"type": "object", "properties": {}}),
                class: ToolClass::Safe,
                timeout_secs: 60,
            }],
            max_tokens: 4096,
        }
    }

    #[tokio::test]
    async fn rejects_unknown_model_before_any_request() {
        let server = MockServer::start().await;
        let provider = provider_for(&server);

        let mut request = request_with(vec![]);
        request.model = "gpt-oss-20b".into();

        match provider.complete(request).await {
            Err(StewardError::BadModel { model }) => assert_eq!(model, "gpt-oss-20b"),
            other => panic!("expected BadModel, got {other:?}"),
        }
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn parses_interleaved_text_and_tool_use() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "content": [
                    {"type": "text", "text": "Listing pods."},
                    {"type": "tool_use", "id": "toolu_1", "name": "kubectl_get_pods",
                     "input": {"namespace": "default"}}
                ],
                "model": "claude-sonnet-4-20250514",
                "stop_reason": "tool_use",
                "usage": {"input_tokens": 12, "output_tokens": 8}
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let reply = provider
            .complete(request_with(vec![LlmMessage {
                role: LlmRole::User,
                blocks: vec![LlmBlock::Text {
                    text: "List pods in default namespace.".into(),
                }],
            }]))
            .await
            .unwrap();

        assert_eq!(reply.text.as_deref(), Some("Listing pods."));
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "kubectl_get_pods");
        assert_eq!(reply.tool_calls[0].input["namespace"], "default");
        assert_eq!(reply.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(reply.usage.output_tokens, 8);
    }

    #[tokio::test]
    async fn sends_tool_results_as_user_blocks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(serde_json::json!({
                "messages": [
                    {"role": "user", "content": "List pods"},
                    {"role": "assistant", "content": [
                        {"type": "tool_use", "id": "toolu_1", "name": "kubectl_get_pods", "input": {}}
                    ]},
                    {"role": "user", "content": [
                        {"type": "tool_result", "tool_use_id": "toolu_1", "content": "{\"count\":0}"}
                    ]}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "msg_2",
                "type": "message",
                "role": "assistant",
                "content": [{"type": "text", "text": "No pods running."}],
                "model": "claude-sonnet-4-20250514",
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 20, "output_tokens": 4}
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let reply = provider
            .complete(request_with(vec![
                LlmMessage {
                    role: LlmRole::User,
                    blocks: vec![LlmBlock::Text {
                        text: "List pods".into(),
                    }],
                },
                LlmMessage {
                    role: LlmRole::Assistant,
                    blocks: vec![LlmBlock::ToolUse {
                        id: "toolu_1".into(),
                        name: "kubectl_get_pods".into(),
                        input: serde_json::json!({}),
                    }],
                },
                LlmMessage {
                    role: LlmRole::User,
                    blocks: vec![LlmBlock::ToolResult {
                        tool_use_id: "toolu_1".into(),
                        content: r#"{"count":0}"#.into(),
                        is_error: None,
                    }],
                },
            ]))
            .await
            .unwrap();

        assert_eq!(reply.text.as_deref(), Some("No pods running."));
        assert!(reply.tool_calls.is_empty());
    }
}
