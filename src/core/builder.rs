//! Agent 构建器：统一的组件初始化逻辑
//!
//! CLI 与 Web 入口共用同一套模块目录、工具注册表与 LLM 选择逻辑。

use std::sync::Arc;

use crate::agent::AgentComponents;
use crate::config::AppConfig;
use crate::context::{
    build_catalog_registry, load_system_prompt, ConversationBuilder, ModuleFetcher,
    ModuleRegistry, RelevanceSelector,
};
use crate::core::AgentError;
use crate::llm::{create_deepseek_client, LlmClient, MockLlmClient, OpenAiClient, DEEPSEEK_CHAT};
use crate::react::AnswerValidator;
use crate::tools::{FetchWebpageTool, SearchNewsTool, Tool, ToolExecutor, ToolRegistry};

/// 选中的模型后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    DeepSeek,
    OpenAi,
    Mock,
}

/// 按 provider 与可用的 API Key 选择后端
///
/// - `mock`：总是 Mock
/// - `openai`：只认 OPENAI_API_KEY
/// - `deepseek`：DEEPSEEK_API_KEY 或 OPENAI_API_KEY 均可（DeepSeek 兼容端点）
/// - 其它：优先 DeepSeek，其次 OpenAI
pub fn select_backend(provider: &str, deepseek_key: bool, openai_key: bool) -> Option<LlmBackend> {
    match provider.to_lowercase().as_str() {
        "mock" => Some(LlmBackend::Mock),
        "openai" => openai_key.then_some(LlmBackend::OpenAi),
        "deepseek" => (deepseek_key || openai_key).then_some(LlmBackend::DeepSeek),
        _ if deepseek_key => Some(LlmBackend::DeepSeek),
        _ if openai_key => Some(LlmBackend::OpenAi),
        _ => None,
    }
}

/// 根据配置与环境变量创建 LLM 客户端
///
/// 没有可用的 API Key 且 provider 不是 `mock` 时返回 None，请求会以错误事件结束。
pub fn create_llm_from_config(cfg: &AppConfig) -> Option<Arc<dyn LlmClient>> {
    let backend = select_backend(
        &cfg.llm.provider,
        std::env::var("DEEPSEEK_API_KEY").is_ok(),
        std::env::var("OPENAI_API_KEY").is_ok(),
    );
    match backend {
        Some(LlmBackend::Mock) => {
            tracing::info!("Using Mock LLM");
            Some(Arc::new(MockLlmClient::new()))
        }
        Some(LlmBackend::DeepSeek) => {
            // 配置仍是默认模型时交给 DEEPSEEK_MODEL 决定
            let model = (cfg.llm.model != DEEPSEEK_CHAT).then_some(cfg.llm.model.as_str());
            let client = create_deepseek_client(model, cfg.llm.base_url.as_deref());
            tracing::info!("Using DeepSeek LLM ({})", client.model());
            Some(Arc::new(client))
        }
        Some(LlmBackend::OpenAi) => {
            tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
            Some(Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                std::env::var("OPENAI_API_KEY").ok().as_deref(),
            )))
        }
        None => {
            tracing::warn!("No API key set for provider {}, LLM disabled", cfg.llm.provider);
            None
        }
    }
}

/// Agent 构建器：统一配置和初始化对话编排的各个组件
pub struct AgentBuilder {
    config: AppConfig,
    system_prompt: Option<String>,
    llm: Option<Arc<dyn LlmClient>>,
    modules: Option<ModuleRegistry>,
    extra_tools: Vec<Arc<dyn Tool>>,
    builtin_tools: bool,
}

impl AgentBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            system_prompt: None,
            llm: None,
            modules: None,
            extra_tools: Vec::new(),
            builtin_tools: true,
        }
    }

    /// 设置系统提示词
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = Some(prompt.to_string());
        self
    }

    /// 从 config/prompts/analyst.md 加载系统提示词
    pub fn with_system_prompt_from_file(mut self) -> Self {
        self.system_prompt = Some(load_system_prompt());
        self
    }

    /// 指定 LLM 客户端（跳过按环境变量选择）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 指定数据模块注册表（默认使用内置目录）
    pub fn with_modules(mut self, modules: ModuleRegistry) -> Self {
        self.modules = Some(modules);
        self
    }

    /// 追加工具
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.extra_tools.push(Arc::new(tool));
        self
    }

    /// 是否注册内置的 search_news / fetch_webpage
    pub fn with_builtin_tools(mut self, enable: bool) -> Self {
        self.builtin_tools = enable;
        self
    }

    /// 构建工具注册表：内置工具 + 追加工具，重名即报错
    pub fn build_tool_registry(&self) -> Result<ToolRegistry, AgentError> {
        let tools_cfg = &self.config.tools;
        let mut tools = ToolRegistry::new();
        if self.builtin_tools {
            tools.register(SearchNewsTool::new(&tools_cfg.news, tools_cfg.max_result_chars))?;
            tools.register(FetchWebpageTool::new(
                tools_cfg.webpage.allowed_domains.clone(),
                tools_cfg.webpage.timeout_secs,
                tools_cfg.max_result_chars,
            ))?;
        }
        for tool in &self.extra_tools {
            tools.register_arc(tool.clone())?;
        }
        Ok(tools)
    }

    /// 构建完整的 AgentComponents（供 CLI / Web 使用）
    pub fn build(self) -> Result<AgentComponents, AgentError> {
        let tools = self.build_tool_registry()?;
        let llm = match self.llm.clone() {
            Some(llm) => Some(llm),
            None => create_llm_from_config(&self.config),
        };
        let modules = match self.modules {
            Some(m) => m,
            None => build_catalog_registry(&self.config.modules)?,
        };
        let modules = Arc::new(modules);
        let chat = &self.config.chat;
        let system_prompt = self.system_prompt.unwrap_or_else(load_system_prompt);

        tracing::info!(
            modules = modules.len(),
            tools = ?tools.tool_names(),
            llm = llm.is_some(),
            "agent components ready"
        );

        Ok(AgentComponents {
            llm,
            executor: ToolExecutor::new(tools, self.config.tools.tool_timeout_secs),
            selector: RelevanceSelector::new(modules.clone(), chat.relevance_window),
            fetcher: ModuleFetcher::new(self.config.modules.fetch_timeout_secs),
            builder: ConversationBuilder::new(system_prompt, chat.history_window),
            validator: AnswerValidator::new(),
            modules,
            config: self.config,
        })
    }
}
