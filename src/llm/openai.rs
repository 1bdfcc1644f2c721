//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 DeepSeek、OpenAI、自建代理等。
//! tools 非空时以 function calling 方式绑定工具，返回的 tool_calls 转为 [`ToolCall`]。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionResponseMessage, ChatCompletionTool,
    ChatCompletionTools, CreateChatCompletionRequestArgs, FunctionCall, FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, LlmTurn};
use crate::memory::{Message, Role, ToolCall};
use crate::tools::ToolDefinition;

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client 与 model 名
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());
        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };
        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            usage: TokenUsage::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn build_err(e: impl std::fmt::Display) -> LlmError {
    LlmError::Request(format!("build request: {}", e))
}

/// Message 序列转为 API 格式；assistant 轮带上原始 tool_calls，Tool 轮带上 tool_call_id
pub(crate) fn to_openai_messages(
    messages: &[Message],
) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
    messages
        .iter()
        .map(|m| {
            let msg = match m.role {
                Role::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(build_err)?,
                ),
                Role::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(build_err)?,
                ),
                Role::Assistant => {
                    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                    if !m.content.is_empty() || m.tool_calls.is_empty() {
                        args.content(m.content.clone());
                    }
                    if !m.tool_calls.is_empty() {
                        args.tool_calls(
                            m.tool_calls
                                .iter()
                                .map(to_openai_tool_call)
                                .collect::<Vec<_>>(),
                        );
                    }
                    ChatCompletionRequestMessage::Assistant(args.build().map_err(build_err)?)
                }
                Role::Tool => ChatCompletionRequestMessage::Tool(
                    ChatCompletionRequestToolMessageArgs::default()
                        .content(m.content.clone())
                        .tool_call_id(m.tool_call_id.clone().unwrap_or_default())
                        .build()
                        .map_err(build_err)?,
                ),
            };
            Ok(msg)
        })
        .collect()
}

fn to_openai_tool_call(call: &ToolCall) -> ChatCompletionMessageToolCalls {
    let arguments = match &call.arguments {
        serde_json::Value::String(raw) => raw.clone(),
        other => other.to_string(),
    };
    ChatCompletionMessageToolCalls::Function(ChatCompletionMessageToolCall {
        id: call.id.clone(),
        function: FunctionCall {
            name: call.name.clone(),
            arguments,
        },
    })
}

pub(crate) fn to_openai_tools(tools: &[ToolDefinition]) -> Vec<ChatCompletionTools> {
    tools
        .iter()
        .map(|t| {
            ChatCompletionTools::Function(ChatCompletionTool {
                function: FunctionObject {
                    name: t.name.clone(),
                    description: Some(t.description.clone()),
                    parameters: Some(t.parameters.clone()),
                    strict: None,
                },
            })
        })
        .collect()
}

/// 响应消息转为 LlmTurn；自定义工具调用（非 function）不在支持范围内，忽略
pub(crate) fn from_openai_message(message: &ChatCompletionResponseMessage) -> LlmTurn {
    let tool_calls = message
        .tool_calls
        .as_ref()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|c| match c {
                    ChatCompletionMessageToolCalls::Function(f) => Some(ToolCall::from_raw_arguments(
                        f.id.clone(),
                        f.function.name.clone(),
                        &f.function.arguments,
                    )),
                    ChatCompletionMessageToolCalls::Custom(_) => None,
                })
                .collect()
        })
        .unwrap_or_default();
    LlmTurn {
        content: message.content.clone().unwrap_or_default(),
        tool_calls,
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmTurn, LlmError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(to_openai_messages(messages)?);
        if !tools.is_empty() {
            args.tools(to_openai_tools(tools));
        }
        let request = args.build().map_err(build_err)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        // 提取 token 使用统计
        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let choice = response
            .choices
            .first()
            .ok_or_else(|| LlmError::InvalidResponse("no choices".to_string()))?;
        Ok(from_openai_message(&choice.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ToolResult;

    #[test]
    fn test_token_usage_accumulates() {
        let client = OpenAiClient::new(Some("http://127.0.0.1:1"), "deepseek-chat", Some("k"));
        assert_eq!(client.token_usage(), (0, 0, 0));
        client.usage.add(120, 30);
        client.usage.add(80, 20);
        assert_eq!(client.token_usage(), (200, 50, 250));
    }

    #[test]
    fn test_message_conversion_keeps_tool_pairing() {
        let call = ToolCall::new("call_1", "search_news", serde_json::json!({"query": "黄金"}));
        let messages = vec![
            Message::system("sys"),
            Message::user("黄金价格怎么样"),
            Message::assistant_tool_calls("", vec![call]),
            Message::tool(ToolResult {
                tool_call_id: "call_1".into(),
                name: "search_news".into(),
                output: "金价上涨".into(),
            }),
        ];
        let converted = to_openai_messages(&messages).unwrap();
        assert_eq!(converted.len(), 4);

        match &converted[2] {
            ChatCompletionRequestMessage::Assistant(a) => {
                assert!(a.content.is_none());
                let calls = a.tool_calls.as_ref().unwrap();
                match &calls[0] {
                    ChatCompletionMessageToolCalls::Function(f) => {
                        assert_eq!(f.id, "call_1");
                        assert_eq!(f.function.name, "search_news");
                        assert!(f.function.arguments.contains("黄金"));
                    }
                    other => panic!("unexpected tool call: {:?}", other),
                }
            }
            other => panic!("unexpected message: {:?}", other),
        }
        match &converted[3] {
            ChatCompletionRequestMessage::Tool(t) => assert_eq!(t.tool_call_id, "call_1"),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_tool_definitions_become_functions() {
        let defs = vec![ToolDefinition {
            name: "fetch_webpage".into(),
            description: "Fetch a page".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let tools = to_openai_tools(&defs);
        match &tools[0] {
            ChatCompletionTools::Function(f) => {
                assert_eq!(f.function.name, "fetch_webpage");
                assert_eq!(f.function.description.as_deref(), Some("Fetch a page"));
            }
            other => panic!("unexpected tool: {:?}", other),
        }
    }

    #[test]
    fn test_response_tool_calls_parsed() {
        let message: ChatCompletionResponseMessage = serde_json::from_value(serde_json::json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_9",
                "type": "function",
                "function": {"name": "fetch_webpage", "arguments": "{\"url\":\"https://example.com\"}"}
            }]
        }))
        .unwrap();
        let turn = from_openai_message(&message);
        assert_eq!(turn.content, "");
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].id, "call_9");
        assert_eq!(turn.tool_calls[0].arguments["url"], "https://example.com");
    }
}
