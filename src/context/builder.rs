//! 对话构造：把历史、实时上下文与当前问题组装成发给模型的消息序列
//!
//! 顺序固定：system 指令 → 最近 N 轮历史（原顺序）→ 一条合成的 user 消息（上下文 + 问题）。

use crate::context::markup::{looks_like_markup, strip_markup};
use crate::memory::{last_n, HistoryTurn, Message, Role};

/// 助手轮提取后的文本需超过该字符数才替代原文
const MIN_EXTRACTED_CHARS: usize = 10;

/// 内置的分析师 system 指令（config/prompts/analyst.md 不存在时使用）
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"Financial analyst assistant. Answer questions directly with analysis.

⛔ FORBIDDEN - Never output these:
"正在搜索" "正在分析" "正在获取" "正在查询" "正在调用"
<div>正在...</div> ← THIS BREAKS EVERYTHING!

✅ CORRECT output example:
<p style='color:#e0e0e0;margin:1px 0;line-height:1.2'>国金量化基金配置科技和医药板块，今日涨<span style='color:#4caf50;font-weight:bold'>+0.5%</span></p>

Your FIRST word must be actual content, not status!

Format (dark theme, compact):
- Text: <p style="color:#e0e0e0;margin:1px 0;line-height:1.2">
- Good: <span style="color:#4caf50;font-weight:bold">
- Bad: <span style="color:#f44336;font-weight:bold">
- List: <ul style="margin:1px 0;padding-left:14px;line-height:1.2"><li style="margin:0">

Context has: 基金(fund), 板块(bk), 快讯(kx), 指数, 金价

Provide insights, not raw tables. Use context data. If user says "它", check history."#;

/// 按顺序查找 system 指令文件，找不到时使用内置指令
pub fn load_system_prompt() -> String {
    [
        "config/prompts/analyst.md",
        "../config/prompts/analyst.md",
    ]
    .into_iter()
    .find_map(|p| std::fs::read_to_string(p).ok())
    .filter(|s| !s.trim().is_empty())
    .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
}

/// 合成的最后一条 user 消息
pub fn context_message(context: &str, question: &str) -> String {
    format!(
        "CONTEXT FROM PAGE (后端实时数据):\n{}\n\nUSER QUESTION: {}",
        context, question
    )
}

/// 对话构造器
pub struct ConversationBuilder {
    system_prompt: String,
    window: usize,
}

impl ConversationBuilder {
    pub fn new(system_prompt: impl Into<String>, window: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            window,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// 组装消息序列
    pub fn build(&self, history: &[HistoryTurn], context: &str, question: &str) -> Vec<Message> {
        let mut messages = vec![Message::system(self.system_prompt.clone())];

        for turn in last_n(history, self.window) {
            if turn.content.trim().is_empty() {
                continue;
            }
            match turn.role() {
                Some(Role::User) => messages.push(Message::user(turn.content.clone())),
                Some(Role::Assistant) => {
                    messages.push(Message::assistant(normalize_assistant(&turn.content)))
                }
                _ => tracing::debug!(role = %turn.role, "skipping history turn with unknown role"),
            }
        }

        messages.push(Message::user(context_message(context, question)));
        messages
    }
}

/// 助手轮是标记时还原为纯文本；提取结果过短则保留原文
fn normalize_assistant(content: &str) -> String {
    if !looks_like_markup(content) {
        return content.to_string();
    }
    let text = strip_markup(content, " ");
    if text.chars().count() > MIN_EXTRACTED_CHARS {
        text
    } else {
        content.to_string()
    }
}
