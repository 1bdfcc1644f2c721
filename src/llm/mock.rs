//! Mock LLM 客户端（用于测试与本地联调，无需 API）
//!
//! 按脚本顺序返回预设的 LlmTurn；脚本用完后回显最后一条 User 消息中的问题。
//! 每次调用都会记录收到的消息与是否绑定了工具，便于断言循环行为。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, LlmTurn};
use crate::memory::{Message, Role};
use crate::tools::ToolDefinition;

/// 一次调用的记录
#[derive(Debug, Clone)]
pub struct MockCall {
    pub messages: Vec<Message>,
    pub tools_enabled: bool,
}

/// Mock 客户端：脚本化回复 + 调用记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<LlmTurn, LlmError>>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按顺序预设回复
    pub fn with_script(turns: impl IntoIterator<Item = Result<LlmTurn, LlmError>>) -> Self {
        Self {
            script: Mutex::new(turns.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn echo(messages: &[Message]) -> LlmTurn {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        let question = last_user
            .rsplit_once("USER QUESTION:")
            .map(|(_, q)| q.trim())
            .unwrap_or(last_user);
        LlmTurn::text(format!(
            "<p style=\"color:#e0e0e0;margin:1px 0;line-height:1.2\">Mock 分析：{}</p>",
            question
        ))
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmTurn, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockCall {
                messages: messages.to_vec(),
                tools_enabled: !tools.is_empty(),
            });
        }
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match scripted {
            Some(turn) => turn,
            None => Ok(Self::echo(messages)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_echo() {
        let mock = MockLlmClient::with_script([Err(LlmError::Request("boom".into()))]);
        let messages = vec![Message::user("CONTEXT FROM PAGE:\nx\n\nUSER QUESTION: 黄金价格怎么样")];

        assert!(mock.complete(&messages, &[]).await.is_err());
        let turn = mock.complete(&messages, &[]).await.unwrap();
        assert!(turn.content.contains("黄金价格怎么样"));
        assert!(!turn.content.contains("CONTEXT"));
        assert_eq!(mock.call_count(), 2);
        assert!(!mock.calls()[0].tools_enabled);
    }
}
