//! 上下文层：标记提取、数据模块、相关性选择、并发拉取、对话构造

pub mod builder;
pub mod catalog;
pub mod fetcher;
pub mod markup;
pub mod modules;
pub mod selector;

pub use builder::{context_message, load_system_prompt, ConversationBuilder, DEFAULT_SYSTEM_PROMPT};
pub use catalog::{build_catalog_registry, HttpDataModule, MODULE_CATALOG};
pub use fetcher::{ContextSection, FetchedContext, ModuleFetcher, FETCH_FAILED_PLACEHOLDER};
pub use markup::{looks_like_markup, strip_markup, text_nodes};
pub use modules::{DataModule, ModuleRegistry, StaticModule};
pub use selector::RelevanceSelector;
