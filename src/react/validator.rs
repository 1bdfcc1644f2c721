//! 答案校验：拒绝「正在…」一类的占位状态文本
//!
//! 非最后一轮命中禁用短语时，把被拒答案作为 assistant 轮、再追加一条强纠正指令，循环继续；
//! 最后一轮命中时照常接受（强制作答不再循环）。

use crate::memory::Message;

/// 禁用的占位短语
pub const FORBIDDEN_PHRASES: &[&str] = &["正在搜索", "正在分析", "正在获取", "正在查询", "正在调用"];

/// 纠正指令
pub const CORRECTION_PROMPT: &str = r#"STOP! Your previous response contained status messages like "正在搜索..." which is FORBIDDEN.

You must provide ACTUAL ANALYSIS, not status messages.

Example of what you should output:
<p style='color: #e0e0e0; margin: 1px 0; line-height: 1.2;'>国金量化基金今日表现稳健，主要配置电子、医药等成长板块...</p>

Now provide your REAL analysis without any status messages."#;

/// 校验结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// 接受，进入流式输出
    Accept,
    /// 最后一轮命中禁用短语，仍然接受
    AcceptForced { phrase: &'static str },
    /// 拒绝，需要纠正后重试
    Reject { phrase: &'static str },
}

/// 答案校验器
#[derive(Debug, Clone)]
pub struct AnswerValidator {
    phrases: &'static [&'static str],
    correction: String,
}

impl Default for AnswerValidator {
    fn default() -> Self {
        Self {
            phrases: FORBIDDEN_PHRASES,
            correction: CORRECTION_PROMPT.to_string(),
        }
    }
}

impl AnswerValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 第一个命中的禁用短语
    pub fn find_forbidden(&self, answer: &str) -> Option<&'static str> {
        self.phrases.iter().copied().find(|p| answer.contains(p))
    }

    /// 判定候选答案；is_final 表示已是最后一次迭代
    pub fn check(&self, answer: &str, is_final: bool) -> Verdict {
        match self.find_forbidden(answer) {
            None => Verdict::Accept,
            Some(phrase) if is_final => Verdict::AcceptForced { phrase },
            Some(phrase) => Verdict::Reject { phrase },
        }
    }

    /// 被拒后追加到序列的两条消息：原答案 + 纠正指令
    pub fn correction_messages(&self, rejected: &str) -> [Message; 2] {
        [
            Message::assistant(rejected.to_string()),
            Message::user(self.correction.clone()),
        ]
    }
}
