//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，dispatch(call) 在超时内调用 registry.execute；
//! 未知工具、失败与超时都转为 ToolResult 文本，不向上抛出；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::core::AgentError;
use crate::memory::{ToolCall, ToolResult};
use crate::tools::{ToolDefinition, ToolRegistry};

/// 工具执行器：对每次调用施加超时
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self::with_timeout(registry, Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(registry: ToolRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// 执行指定工具；超时返回 ToolTimeout，工具返回 Err 则转为 ToolExecutionFailed；输出 JSON 审计日志
    pub async fn execute(
        &self,
        tool_name: &str,
        args: serde_json::Value,
    ) -> Result<String, AgentError> {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, self.registry.execute(tool_name, args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(AgentError::ToolExecutionFailed(e)),
            Err(_) => Err(AgentError::ToolTimeout(tool_name.to_string())),
        }
    }

    /// 执行一次模型发起的工具调用，结果总是 ToolResult（id 与调用一致）
    ///
    /// 未注册的工具名直接得到 `Unknown tool: <name>`；其它失败得到 `Error: ...`。
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let output = if self.registry.get(&call.name).is_none() {
            tracing::warn!(tool = %call.name, "unknown tool requested");
            format!("Unknown tool: {}", call.name)
        } else {
            match self.execute(&call.name, call.arguments.clone()).await {
                Ok(content) => content,
                Err(e) => format!("Error: {}", e),
            }
        };
        ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            output,
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }
}

fn args_preview(args: &serde_json::Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
