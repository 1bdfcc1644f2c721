//! 对话编排错误类型
//!
//! 模块取数失败、工具失败在最小范围内吸收（占位文本 / ToolResult 文本）；
//! 只有模型调用失败与迭代上限耗尽会作为终止 `error` 事件发给客户端。

use thiserror::Error;

use crate::llm::LlmError;

/// 迭代上限耗尽时发给客户端的固定文案
pub const MAX_ITERATIONS_MESSAGE: &str =
    "Maximum iterations reached. Please try rephrasing your question.";

/// 未配置模型后端时发给客户端的固定文案
pub const LLM_UNAVAILABLE_MESSAGE: &str = "LLM not initialized. Please check your API keys.";

/// 对话编排过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("LLM not initialized")]
    LlmUnavailable,

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Module already registered: {0}")]
    DuplicateModule(String),

    #[error("Unknown default module: {0}")]
    UnknownModule(String),

    #[error("Maximum iterations reached ({0})")]
    MaxIterationsReached(usize),

    #[error("Client disconnected")]
    ClientDisconnected,

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl AgentError {
    /// 终止 `error` 事件中给客户端看的文案
    pub fn user_message(&self) -> String {
        match self {
            AgentError::MaxIterationsReached(_) => MAX_ITERATIONS_MESSAGE.to_string(),
            AgentError::LlmUnavailable => LLM_UNAVAILABLE_MESSAGE.to_string(),
            other => format!("Error: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message() {
        assert_eq!(
            AgentError::MaxIterationsReached(5).user_message(),
            MAX_ITERATIONS_MESSAGE
        );
        assert_eq!(
            AgentError::Llm(LlmError::Timeout(60)).user_message(),
            "Error: LLM request timed out after 60s"
        );
    }
}
