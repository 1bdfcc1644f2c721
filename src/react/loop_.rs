//! 工具调用主循环
//!
//! Invoking（带工具调用模型）→ 有工具调用则 Executing（逐个执行并把结果按 id 写回）→ 下一轮 Invoking；
//! 无工具调用则 Validating → Streaming → Done。最后一次迭代追加「请直接作答」指令并不绑定工具，
//! 保证循环必然结束。模型调用失败不重试，直接返回错误。

use std::time::Duration;

use tokio::time::timeout;

use crate::core::{AgentError, ChatPhase};
use crate::llm::{LlmClient, LlmError, LlmTurn};
use crate::memory::Message;
use crate::react::stream::stream_answer;
use crate::react::{AnswerValidator, EventSink, StreamEvent, Verdict};
use crate::tools::{ToolDefinition, ToolExecutor};

/// 默认迭代上限（每个请求最多调用模型的次数）
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// 最后一次迭代前追加的指令
pub const FINAL_ANSWER_PROMPT: &str = "Please provide your final answer now based on all the information gathered. Do not call any more tools.";

/// 循环结果：被接受并已流式发出的答案
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    pub answer: String,
    /// 实际调用模型的次数
    pub iterations: usize,
    /// 最后一轮命中禁用短语但被强制接受
    pub forced: bool,
}

/// 循环配置：模型、工具执行器、校验器、迭代上限与单次调用超时
pub struct ChatSession<'a> {
    pub llm: &'a dyn LlmClient,
    pub executor: &'a ToolExecutor,
    pub validator: &'a AnswerValidator,
    pub max_iterations: usize,
    pub llm_timeout: Duration,
}

impl<'a> ChatSession<'a> {
    pub fn new(
        llm: &'a dyn LlmClient,
        executor: &'a ToolExecutor,
        validator: &'a AnswerValidator,
    ) -> Self {
        Self {
            llm,
            executor,
            validator,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            llm_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_llm_timeout(mut self, llm_timeout: Duration) -> Self {
        self.llm_timeout = llm_timeout;
        self
    }

    async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmTurn, LlmError> {
        match timeout(self.llm_timeout, self.llm.complete(messages, tools)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.llm_timeout.as_secs())),
        }
    }
}

fn transition(phase: &mut ChatPhase, next: ChatPhase) {
    debug_assert!(
        phase.can_transition_to(next),
        "invalid transition {:?} -> {:?}",
        phase,
        next
    );
    tracing::trace!(from = ?phase, to = ?next, "phase");
    *phase = next;
}

/// 执行工具循环；成功时答案已作为 content 事件发出并以 done 结束
///
/// 错误时不发送 error 事件，由调用方根据错误决定发给客户端的文案。
pub async fn chat_loop(
    session: &ChatSession<'_>,
    messages: &mut Vec<Message>,
    sink: &EventSink,
) -> Result<ChatOutcome, AgentError> {
    let tools = session.executor.definitions();
    let mut phase = ChatPhase::Invoking;

    for iteration in 1..=session.max_iterations {
        if sink.is_closed()
            || !sink
                .emit(StreamEvent::status(format!("Processing (step {})...", iteration)))
                .await
        {
            return Err(AgentError::ClientDisconnected);
        }

        let is_final = iteration == session.max_iterations;
        let result = if is_final {
            messages.push(Message::user(FINAL_ANSWER_PROMPT));
            session.invoke(messages, &[]).await
        } else {
            session.invoke(messages, &tools).await
        };
        let turn = match result {
            Ok(turn) => turn,
            Err(e) => {
                transition(&mut phase, ChatPhase::Error);
                tracing::error!(iteration, error = %e, "model invocation failed");
                return Err(e.into());
            }
        };

        if turn.has_tool_calls() && !is_final {
            transition(&mut phase, ChatPhase::Executing);
            let names: Vec<String> = turn.tool_calls.iter().map(|c| c.name.clone()).collect();
            tracing::info!(iteration, tools = ?names, "model requested tools");
            if !sink.emit(StreamEvent::ToolCall { tools: names }).await {
                return Err(AgentError::ClientDisconnected);
            }

            messages.push(Message::assistant_tool_calls(
                turn.content.clone(),
                turn.tool_calls.clone(),
            ));
            for call in &turn.tool_calls {
                let result = session.executor.dispatch(call).await;
                messages.push(Message::tool(result));
            }
            transition(&mut phase, ChatPhase::Invoking);
            continue;
        }
        if turn.has_tool_calls() {
            tracing::warn!(iteration, "tool calls on the final iteration are ignored");
        }

        transition(&mut phase, ChatPhase::Validating);
        let forced = match session.validator.check(&turn.content, is_final) {
            Verdict::Reject { phrase } => {
                tracing::warn!(iteration, phrase, "answer contains status phrase, requesting correction");
                messages.extend(session.validator.correction_messages(&turn.content));
                transition(&mut phase, ChatPhase::Invoking);
                continue;
            }
            Verdict::AcceptForced { phrase } => {
                tracing::warn!(iteration, phrase, "accepting status phrase on the final iteration");
                true
            }
            Verdict::Accept => false,
        };

        transition(&mut phase, ChatPhase::Streaming);
        if !stream_answer(sink, &turn.content).await {
            return Err(AgentError::ClientDisconnected);
        }
        transition(&mut phase, ChatPhase::Done);
        tracing::info!(iterations = iteration, forced, "answer streamed");
        return Ok(ChatOutcome {
            answer: turn.content,
            iterations: iteration,
            forced,
        });
    }

    tracing::warn!(max_iterations = session.max_iterations, "maximum iterations reached");
    Err(AgentError::MaxIterationsReached(session.max_iterations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::memory::{Role, ToolCall};
    use crate::react::validator::CORRECTION_PROMPT;
    use crate::tools::{Tool, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Quote;

    #[async_trait]
    impl Tool for Quote {
        fn name(&self) -> &str {
            "search_news"
        }

        fn description(&self) -> &str {
            "returns a canned headline"
        }

        async fn execute(&self, args: Value) -> Result<String, String> {
            Ok(format!("headline for {}", args["query"].as_str().unwrap_or("")))
        }
    }

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Quote).unwrap();
        ToolExecutor::new(registry, 5)
    }

    fn tool_turn(ids: &[(&str, &str)]) -> Result<LlmTurn, LlmError> {
        Ok(LlmTurn::with_tool_calls(
            "",
            ids.iter()
                .map(|(id, name)| ToolCall::new(*id, *name, json!({"query": "黄金"})))
                .collect(),
        ))
    }

    async fn run(
        mock: &MockLlmClient,
        max_iterations: usize,
    ) -> (Result<ChatOutcome, AgentError>, Vec<Message>, Vec<StreamEvent>) {
        let executor = executor();
        let validator = AnswerValidator::new();
        let session = ChatSession::new(mock, &executor, &validator).with_max_iterations(max_iterations);
        let (sink, mut rx) = EventSink::channel(1024);
        let mut messages = vec![Message::system("sys"), Message::user("黄金价格怎么样")];
        let result = chat_loop(&session, &mut messages, &sink).await;
        drop(sink);
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        (result, messages, events)
    }

    fn content_of(events: &[StreamEvent]) -> String {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Content { chunk } => Some(chunk.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_direct_answer_single_iteration() {
        let mock = MockLlmClient::with_script([Ok(LlmTurn::text("<p>金价 2,400</p>"))]);
        let (result, _, events) = run(&mock, 5).await;

        let outcome = result.unwrap();
        assert_eq!(outcome.iterations, 1);
        assert!(!outcome.forced);
        assert_eq!(mock.call_count(), 1);
        assert!(mock.calls()[0].tools_enabled);
        assert_eq!(events[0], StreamEvent::status("Processing (step 1)..."));
        assert_eq!(content_of(&events), "<p>金价 2,400</p>");
        assert_eq!(events.last(), Some(&StreamEvent::Done));
    }

    #[tokio::test]
    async fn test_final_iteration_is_tool_free() {
        let mock = MockLlmClient::with_script([
            tool_turn(&[("c1", "search_news")]),
            tool_turn(&[("c2", "search_news")]),
            tool_turn(&[("c3", "search_news")]),
            tool_turn(&[("c4", "search_news")]),
            Ok(LlmTurn::with_tool_calls(
                "<p>最终分析</p>",
                vec![ToolCall::new("c5", "search_news", json!({}))],
            )),
        ]);
        let (result, messages, events) = run(&mock, 5).await;

        assert_eq!(result.unwrap().answer, "<p>最终分析</p>");
        let calls = mock.calls();
        assert_eq!(calls.len(), 5);
        assert!(calls[..4].iter().all(|c| c.tools_enabled));
        assert!(!calls[4].tools_enabled);
        assert_eq!(
            calls[4].messages.last().map(|m| m.content.as_str()),
            Some(FINAL_ANSWER_PROMPT)
        );
        // 第 5 轮的工具调用没有执行
        let tool_results = messages.iter().filter(|m| m.role == Role::Tool).count();
        assert_eq!(tool_results, 4);
        let announces = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::ToolCall { .. }))
            .count();
        assert_eq!(announces, 4);
        assert_eq!(events.last(), Some(&StreamEvent::Done));
    }

    #[tokio::test]
    async fn test_tool_results_match_call_ids() {
        let mock = MockLlmClient::with_script([
            tool_turn(&[("call_a", "search_news"), ("call_b", "ghost")]),
            Ok(LlmTurn::text("done")),
        ]);
        let (result, _, events) = run(&mock, 5).await;
        assert!(result.is_ok());

        let second = &mock.calls()[1].messages;
        let n = second.len();
        assert_eq!(second[n - 3].role, Role::Assistant);
        assert_eq!(second[n - 3].tool_calls.len(), 2);
        assert_eq!(second[n - 2].tool_call_id.as_deref(), Some("call_a"));
        assert_eq!(second[n - 2].content, "headline for 黄金");
        assert_eq!(second[n - 1].tool_call_id.as_deref(), Some("call_b"));
        assert_eq!(second[n - 1].content, "Unknown tool: ghost");

        assert!(events.contains(&StreamEvent::ToolCall {
            tools: vec!["search_news".into(), "ghost".into()]
        }));
    }

    #[tokio::test]
    async fn test_forbidden_phrase_one_correction_round() {
        let mock = MockLlmClient::with_script([
            Ok(LlmTurn::text("<div>正在搜索基金信息...</div>")),
            Ok(LlmTurn::text("<p>基金今日上涨</p>")),
        ]);
        let (result, _, events) = run(&mock, 5).await;

        let outcome = result.unwrap();
        assert_eq!(outcome.iterations, 2);
        assert_eq!(mock.call_count(), 2);
        let second = &mock.calls()[1].messages;
        let n = second.len();
        assert_eq!(second[n - 2].content, "<div>正在搜索基金信息...</div>");
        assert_eq!(second[n - 2].role, Role::Assistant);
        assert_eq!(second[n - 1].content, CORRECTION_PROMPT);
        assert_eq!(content_of(&events), "<p>基金今日上涨</p>");
    }

    #[tokio::test]
    async fn test_forbidden_phrase_accepted_on_final_iteration() {
        let mock = MockLlmClient::with_script([
            Ok(LlmTurn::text("正在分析")),
            Ok(LlmTurn::text("正在分析中")),
        ]);
        let (result, _, events) = run(&mock, 2).await;

        let outcome = result.unwrap();
        assert!(outcome.forced);
        assert_eq!(outcome.answer, "正在分析中");
        assert_eq!(content_of(&events), "正在分析中");
    }

    #[tokio::test]
    async fn test_model_error_is_fatal() {
        let mock = MockLlmClient::with_script([Err(LlmError::Request("503".into()))]);
        let (result, _, events) = run(&mock, 5).await;

        assert!(matches!(result, Err(AgentError::Llm(LlmError::Request(_)))));
        assert_eq!(mock.call_count(), 1);
        assert!(!events.iter().any(StreamEvent::is_terminal));
    }

    #[tokio::test]
    async fn test_zero_iterations_exhausts_cap() {
        let mock = MockLlmClient::new();
        let (result, _, _) = run(&mock, 0).await;
        assert!(matches!(result, Err(AgentError::MaxIterationsReached(0))));
        assert_eq!(mock.call_count(), 0);
    }

    struct Hanging;

    #[async_trait]
    impl LlmClient for Hanging {
        async fn complete(&self, _: &[Message], _: &[ToolDefinition]) -> Result<LlmTurn, LlmError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(LlmTurn::text("late"))
        }
    }

    #[tokio::test]
    async fn test_model_timeout() {
        let executor = executor();
        let validator = AnswerValidator::new();
        let session = ChatSession::new(&Hanging, &executor, &validator)
            .with_llm_timeout(Duration::from_millis(50));
        let (sink, _rx) = EventSink::channel(16);
        let mut messages = vec![Message::user("q")];
        let result = chat_loop(&session, &mut messages, &sink).await;
        assert!(matches!(result, Err(AgentError::Llm(LlmError::Timeout(_)))));
    }

    #[tokio::test]
    async fn test_stops_when_client_gone() {
        let mock = MockLlmClient::new();
        let executor = executor();
        let validator = AnswerValidator::new();
        let session = ChatSession::new(&mock, &executor, &validator);
        let (sink, rx) = EventSink::channel(16);
        drop(rx);
        let mut messages = vec![Message::user("q")];
        let result = chat_loop(&session, &mut messages, &sink).await;
        assert!(matches!(result, Err(AgentError::ClientDisconnected)));
        assert_eq!(mock.call_count(), 0);
    }

    /// 返回工具调用的同时关闭事件接收端，模拟客户端在模型调用期间断开
    struct DisconnectDuringCall {
        rx: std::sync::Mutex<Option<tokio::sync::mpsc::Receiver<StreamEvent>>>,
    }

    #[async_trait]
    impl LlmClient for DisconnectDuringCall {
        async fn complete(&self, _: &[Message], _: &[ToolDefinition]) -> Result<LlmTurn, LlmError> {
            if let Ok(mut rx) = self.rx.lock() {
                rx.take();
            }
            tool_turn(&[("c1", "search_news")])
        }
    }

    struct Counting(std::sync::Arc<std::sync::atomic::AtomicUsize>);

    #[async_trait]
    impl Tool for Counting {
        fn name(&self) -> &str {
            "search_news"
        }

        fn description(&self) -> &str {
            "counts invocations"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok("ran".into())
        }
    }

    #[tokio::test]
    async fn test_no_tool_runs_after_disconnect() {
        let runs = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry.register(Counting(runs.clone())).unwrap();
        let executor = ToolExecutor::new(registry, 5);
        let validator = AnswerValidator::new();
        let (sink, rx) = EventSink::channel(16);
        let llm = DisconnectDuringCall {
            rx: std::sync::Mutex::new(Some(rx)),
        };
        let session = ChatSession::new(&llm, &executor, &validator);
        let mut messages = vec![Message::user("q")];

        let result = chat_loop(&session, &mut messages, &sink).await;
        assert!(matches!(result, Err(AgentError::ClientDisconnected)));
        assert_eq!(runs.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(messages.iter().all(|m| m.role != Role::Tool));
    }
}
