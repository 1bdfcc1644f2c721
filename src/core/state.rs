//! 对话阶段：工具循环的显式状态机
//!
//! Invoking → Executing → Invoking …；Invoking → Validating → Streaming → Done；任意阶段 → Error。
//! 校验失败时 Validating → Invoking（消耗一次迭代）。

use serde::Serialize;

/// 单个请求在工具循环中的阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatPhase {
    Invoking,
    Executing,
    Validating,
    Streaming,
    Done,
    Error,
}

impl ChatPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChatPhase::Done | ChatPhase::Error)
    }

    /// 是否允许从当前阶段迁移到 next
    pub fn can_transition_to(self, next: ChatPhase) -> bool {
        use ChatPhase::*;
        match (self, next) {
            (Done, _) | (Error, _) => false,
            (_, Error) => true,
            (Invoking, Executing) | (Invoking, Validating) => true,
            (Executing, Invoking) => true,
            (Validating, Invoking) | (Validating, Streaming) => true,
            (Streaming, Done) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(ChatPhase::Invoking.can_transition_to(ChatPhase::Executing));
        assert!(ChatPhase::Validating.can_transition_to(ChatPhase::Invoking));
        assert!(ChatPhase::Streaming.can_transition_to(ChatPhase::Done));
        assert!(ChatPhase::Executing.can_transition_to(ChatPhase::Error));
        assert!(!ChatPhase::Executing.can_transition_to(ChatPhase::Streaming));
        assert!(!ChatPhase::Done.can_transition_to(ChatPhase::Error));
        assert!(ChatPhase::Error.is_terminal());
        assert!(!ChatPhase::Streaming.is_terminal());
    }
}
