//! 短期记忆：请求内的对话消息与客户端带来的历史轮次

pub mod conversation;

pub use conversation::{last_n, HistoryTurn, Message, Role, ToolCall, ToolResult};
