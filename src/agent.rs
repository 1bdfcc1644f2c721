//! Headless 对话运行时
//!
//! 供 HTTP / CLI 调用：create_agent_components 在启动时构建共享组件，
//! process_chat 对单个请求依次执行 模块选择 → 并发取数 → 组装消息 → 工具循环，
//! 所有输出通过 EventSink 以 StreamEvent 推给传输层。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::Instrument;

use crate::config::{load_config, AppConfig};
use crate::context::{ConversationBuilder, ModuleFetcher, ModuleRegistry, RelevanceSelector};
use crate::core::{AgentBuilder, AgentError};
use crate::llm::LlmClient;
use crate::memory::HistoryTurn;
use crate::react::{chat_loop, AnswerValidator, ChatOutcome, ChatSession, EventSink, StreamEvent};
use crate::tools::ToolExecutor;

/// 取数开始前的状态提示
pub const FETCHING_STATUS: &str = "正在获取相关数据...";

/// 预构建的对话组件：启动时创建一次，所有请求只读共享
pub struct AgentComponents {
    pub config: AppConfig,
    /// 未配置模型后端时为 None
    pub llm: Option<Arc<dyn LlmClient>>,
    pub executor: ToolExecutor,
    pub modules: Arc<ModuleRegistry>,
    pub selector: RelevanceSelector,
    pub fetcher: ModuleFetcher,
    pub builder: ConversationBuilder,
    pub validator: AnswerValidator,
}

/// 单次对话请求
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryTurn>) -> Self {
        self.history = history;
        self
    }
}

/// 加载配置并构建组件（配置文件缺失时使用默认值）
pub fn create_agent_components(config_path: Option<PathBuf>) -> Result<AgentComponents, AgentError> {
    let cfg = match load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            AppConfig::default()
        }
    };
    AgentBuilder::new(cfg).with_system_prompt_from_file().build()
}

/// 处理一个对话请求；以 done 或 error 事件结束（客户端断开时静默结束）
///
/// 返回值供调用方记录日志，客户端看到的结果只通过 sink 传递。
pub async fn process_chat(
    components: &AgentComponents,
    request: ChatRequest,
    sink: EventSink,
) -> Result<ChatOutcome, AgentError> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("chat", request_id = %request_id);
    async move {
        let result = run_chat(components, &request, &sink).await;
        match &result {
            Ok(outcome) => {
                tracing::info!(iterations = outcome.iterations, "chat completed");
            }
            Err(AgentError::ClientDisconnected) => {
                tracing::info!("client disconnected, chat abandoned");
            }
            Err(e) => {
                tracing::error!(error = %e, "chat failed");
                sink.emit(StreamEvent::error(e.user_message())).await;
            }
        }
        result
    }
    .instrument(span)
    .await
}

async fn run_chat(
    components: &AgentComponents,
    request: &ChatRequest,
    sink: &EventSink,
) -> Result<ChatOutcome, AgentError> {
    let llm = components.llm.as_deref().ok_or(AgentError::LlmUnavailable)?;

    tracing::info!(
        question = %request.message,
        history = request.history.len(),
        "chat request"
    );
    if !sink.emit(StreamEvent::status(FETCHING_STATUS)).await {
        return Err(AgentError::ClientDisconnected);
    }

    let selected = components.selector.select(&request.message, &request.history);
    let ids: Vec<&str> = selected.iter().map(|m| m.id()).collect();
    tracing::info!(modules = ?ids, "modules selected");

    let context = components.fetcher.fetch_all(&selected).await;
    let mut messages =
        components
            .builder
            .build(&request.history, &context.render(), &request.message);

    let chat = &components.config.chat;
    let session = ChatSession::new(llm, &components.executor, &components.validator)
        .with_max_iterations(chat.max_iterations)
        .with_llm_timeout(Duration::from_secs(components.config.llm.timeouts.request));
    let result = chat_loop(&session, &mut messages, sink).await;

    let (prompt_tokens, completion_tokens, total_tokens) = llm.token_usage();
    tracing::debug!(prompt_tokens, completion_tokens, total_tokens, "cumulative token usage");
    result
}
