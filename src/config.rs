//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `FUND_CHAT__*` 覆盖（双下划线表示嵌套，如 `FUND_CHAT__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub chat: ChatSection,
    pub modules: ModulesSection,
    pub tools: ToolsSection,
    pub web: WebSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock；实际选择还取决于 API Key 是否存在
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次模型调用超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [chat] 段：工具循环上限与历史窗口
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSection {
    /// 每个请求最多调用模型的次数（最后一次强制不带工具）
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// 构造 prompt 时回放的历史轮数
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// 相关性选择时参考的历史轮数
    #[serde(default = "default_relevance_window")]
    pub relevance_window: usize,
    /// 事件通道容量（背压）
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            history_window: default_history_window(),
            relevance_window: default_relevance_window(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_max_iterations() -> usize {
    5
}

fn default_history_window() -> usize {
    10
}

fn default_relevance_window() -> usize {
    5
}

fn default_event_buffer() -> usize {
    64
}

/// [modules] 段：页面数据服务地址、单模块超时、无匹配时的默认模块
#[derive(Debug, Clone, Deserialize)]
pub struct ModulesSection {
    #[serde(default = "default_modules_base_url")]
    pub base_url: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_module_ids")]
    pub default_ids: Vec<String>,
}

impl Default for ModulesSection {
    fn default() -> Self {
        Self {
            base_url: default_modules_base_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            default_ids: default_module_ids(),
        }
    }
}

fn default_modules_base_url() -> String {
    "http://127.0.0.1:8310/api/modules".to_string()
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

fn default_module_ids() -> Vec<String> {
    vec!["kx".into(), "bk".into(), "fund".into()]
}

/// [tools] 段：工具超时、结果截断、新闻搜索与网页抓取
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,
    #[serde(default)]
    pub news: NewsSection,
    #[serde(default)]
    pub webpage: WebpageSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            max_result_chars: default_max_result_chars(),
            news: NewsSection::default(),
            webpage: WebpageSection::default(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_max_result_chars() -> usize {
    8000
}

/// [tools.news] 段：新闻搜索端点（GET {endpoint}?{query_param}=...）
#[derive(Debug, Clone, Deserialize)]
pub struct NewsSection {
    #[serde(default = "default_news_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_news_query_param")]
    pub query_param: String,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NewsSection {
    fn default() -> Self {
        Self {
            endpoint: default_news_endpoint(),
            query_param: default_news_query_param(),
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_news_endpoint() -> String {
    "https://news.google.com/rss/search".to_string()
}

fn default_news_query_param() -> String {
    "q".to_string()
}

fn default_http_timeout_secs() -> u64 {
    15
}

/// [tools.webpage] 段：抓取超时与域名白名单（为空表示不限制）
#[derive(Debug, Clone, Deserialize)]
pub struct WebpageSection {
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub allowed_domains: Vec<String>,
}

impl Default for WebpageSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
            allowed_domains: Vec::new(),
        }
    }
}

/// [web] 段：HTTP 监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct WebSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for WebSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8311
}

/// 从 config 目录加载配置，环境变量 FUND_CHAT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 FUND_CHAT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("FUND_CHAT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
