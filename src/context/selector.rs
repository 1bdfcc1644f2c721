//! 相关性选择器
//!
//! 根据当前问题与最近几轮历史，从模块注册表中选出需要拉取的数据模块。
//! 纯关键词子串匹配，结果确定；没有任何命中时回退到默认模块。

use std::sync::Arc;

use crate::context::markup::strip_markup;
use crate::context::{DataModule, ModuleRegistry};
use crate::memory::{last_n, HistoryTurn, Role};

/// 助手轮中表示「还在生成」的占位标记，命中则不参与匹配
const IN_PROGRESS_MARKERS: &[&str] = &["AI Analyst is thinking", "⏳", "Processing"];
/// 助手轮提取后的文本需超过该字符数才参与匹配
const MIN_ASSISTANT_CHARS: usize = 50;

/// 相关性选择器
pub struct RelevanceSelector {
    modules: Arc<ModuleRegistry>,
    window: usize,
}

impl RelevanceSelector {
    pub fn new(modules: Arc<ModuleRegistry>, window: usize) -> Self {
        Self { modules, window }
    }

    /// 拼接问题与最近历史，得到小写匹配文本
    pub fn haystack(&self, question: &str, history: &[HistoryTurn]) -> String {
        let mut parts: Vec<String> = Vec::new();
        for turn in last_n(history, self.window) {
            match turn.role() {
                Some(Role::User) => parts.push(turn.content.clone()),
                Some(Role::Assistant) => {
                    let text = strip_markup(&turn.content, " ");
                    if text.chars().count() > MIN_ASSISTANT_CHARS
                        && !IN_PROGRESS_MARKERS.iter().any(|m| text.contains(m))
                    {
                        parts.push(text);
                    }
                }
                _ => {}
            }
        }
        parts.push(question.to_string());
        parts.join(" ").to_lowercase()
    }

    /// 选出关键词命中的模块（按注册顺序）；无命中时返回默认模块
    pub fn select(&self, question: &str, history: &[HistoryTurn]) -> Vec<Arc<dyn DataModule>> {
        let haystack = self.haystack(question, history);
        let selected: Vec<Arc<dyn DataModule>> = self
            .modules
            .modules()
            .iter()
            .filter(|m| m.keywords().iter().any(|k| haystack.contains(k.as_str())))
            .cloned()
            .collect();

        if selected.is_empty() {
            tracing::debug!("no module keyword matched, using defaults");
            return self.modules.defaults();
        }
        tracing::debug!(
            modules = ?selected.iter().map(|m| m.id().to_string()).collect::<Vec<_>>(),
            "modules selected"
        );
        selected
    }
}
