//! 工具箱：注册表、执行器、参数 schema 与内置的新闻搜索 / 网页抓取工具

pub mod executor;
pub mod news;
pub mod registry;
pub mod schema;
pub mod webpage;

pub use executor::ToolExecutor;
pub use news::SearchNewsTool;
pub use registry::{Tool, ToolDefinition, ToolRegistry};
pub use schema::parameters_for;
pub use webpage::FetchWebpageTool;
