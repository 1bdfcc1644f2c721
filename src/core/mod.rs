//! 核心层：错误类型、对话阶段状态机、组件构建

pub mod builder;
pub mod error;
pub mod state;

pub use builder::{create_llm_from_config, select_backend, AgentBuilder, LlmBackend};
pub use error::{AgentError, LLM_UNAVAILABLE_MESSAGE, MAX_ITERATIONS_MESSAGE};
pub use state::ChatPhase;
