//! 流式事件：状态、工具调用通告、内容分片、完成、错误
//!
//! 每个请求只有一个生产者（编排循环），事件经有界 mpsc 通道按生成顺序交给传输层；
//! 线上格式为 `data: <json>\n\n`，JSON 中非 ASCII 字符不转义。

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// 单个流式事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// 进度提示
    Status { message: String },
    /// 本轮模型请求的工具名（按调用顺序）
    ToolCall { tools: Vec<String> },
    /// 最终回复的一段
    Content { chunk: String },
    /// 回复结束
    Done,
    /// 终止错误
    Error { message: String },
}

impl StreamEvent {
    pub fn status(message: impl Into<String>) -> Self {
        StreamEvent::Status {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }

    pub fn to_json(&self) -> String {
        // 只含字符串字段，序列化不会失败
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"error","message":"serialization failed"}"#.to_string())
    }

    /// SSE 帧：`data: <json>\n\n`
    pub fn to_sse_frame(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }
}

/// 事件发送端：有界通道 + 取消令牌；接收端关闭（客户端断开）后取消令牌
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            tx,
            cancel: CancellationToken::new(),
        }
    }

    /// 创建通道，返回发送端与接收端
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }

    /// 发送事件（满时等待，形成背压）；接收端已关闭则返回 false 并取消令牌
    pub async fn emit(&self, event: StreamEvent) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if self.tx.send(event).await.is_err() {
            tracing::debug!("event receiver dropped, cancelling request");
            self.cancel.cancel();
            return false;
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(
            StreamEvent::status("正在获取相关数据...").to_sse_frame(),
            "data: {\"type\":\"status\",\"message\":\"正在获取相关数据...\"}\n\n"
        );
        assert_eq!(
            StreamEvent::ToolCall { tools: vec!["search_news".into(), "fetch_webpage".into()] }.to_json(),
            r#"{"type":"tool_call","tools":["search_news","fetch_webpage"]}"#
        );
        assert_eq!(
            StreamEvent::Content { chunk: "金价".into() }.to_json(),
            r#"{"type":"content","chunk":"金价"}"#
        );
        assert_eq!(StreamEvent::Done.to_json(), r#"{"type":"done"}"#);
        assert_eq!(
            StreamEvent::error("Error: boom").to_json(),
            r#"{"type":"error","message":"Error: boom"}"#
        );
    }

    #[tokio::test]
    async fn test_sink_cancels_when_receiver_dropped() {
        let (sink, mut rx) = EventSink::channel(4);
        assert!(sink.emit(StreamEvent::Done).await);
        assert_eq!(rx.recv().await, Some(StreamEvent::Done));

        drop(rx);
        assert!(!sink.emit(StreamEvent::Done).await);
        assert!(sink.is_closed());
        assert!(sink.cancel_token().is_cancelled());
    }
}
