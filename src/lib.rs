//! Fund Chat - 带实时行情上下文的流式对话编排
//!
//! 模块划分：
//! - **agent**: 请求运行时（组件构建、单请求处理流程）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **context**: 数据模块注册、相关性选择、并发取数、标记文本提取、消息组装
//! - **core**: 错误类型、对话阶段状态机、组件构建器
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **memory**: 消息与历史轮次
//! - **react**: 工具循环、答案校验、流式事件
//! - **tools**: 工具注册表与执行器（search_news、fetch_webpage）
//! - **web**: axum HTTP 接口（feature `web`）

pub mod agent;
pub mod config;
pub mod context;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;
#[cfg(feature = "web")]
pub mod web;
