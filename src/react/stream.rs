//! 最终回复的流式输出：按长度自适应分片，依次发送 content，最后发送一次 done

use crate::react::{EventSink, StreamEvent};

/// 分片大小（字符数）：<500 → 30，500–1999 → 80，≥2000 → 150
pub fn chunk_size_for(char_len: usize) -> usize {
    if char_len < 500 {
        30
    } else if char_len < 2000 {
        80
    } else {
        150
    }
}

/// 按字符切分，不重叠、不丢失
pub fn chunk_answer(answer: &str) -> Vec<String> {
    let chars: Vec<char> = answer.chars().collect();
    let size = chunk_size_for(chars.len());
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

/// 发送全部分片与 done；客户端断开时提前返回 false
pub async fn stream_answer(sink: &EventSink, answer: &str) -> bool {
    let chunks = chunk_answer(answer);
    tracing::debug!(
        chars = answer.chars().count(),
        chunks = chunks.len(),
        "streaming answer"
    );
    for chunk in chunks {
        if !sink.emit(StreamEvent::Content { chunk }).await {
            return false;
        }
    }
    sink.emit(StreamEvent::Done).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lens(answer: &str) -> Vec<usize> {
        chunk_answer(answer).iter().map(|c| c.chars().count()).collect()
    }

    #[test]
    fn test_adaptive_chunk_sizes() {
        let short = "金".repeat(400);
        let l = lens(&short);
        assert!(l[..l.len() - 1].iter().all(|&n| n == 30));
        assert!(*l.last().unwrap() <= 30);
        assert_eq!(l.iter().sum::<usize>(), 400);

        let medium = "a".repeat(1500);
        assert!(lens(&medium)[..18].iter().all(|&n| n == 80));
        assert_eq!(lens(&medium).len(), 19);

        let long = "b".repeat(3000);
        assert_eq!(lens(&long), vec![150; 20]);

        assert_eq!(chunk_size_for(499), 30);
        assert_eq!(chunk_size_for(500), 80);
        assert_eq!(chunk_size_for(1999), 80);
        assert_eq!(chunk_size_for(2000), 150);
    }

    #[test]
    fn test_concatenation_reproduces_answer() {
        let answer = format!("<p>{}</p>", "黄金价格今日上涨，白银跟涨。".repeat(60));
        assert_eq!(chunk_answer(&answer).concat(), answer);
        assert!(chunk_answer("").is_empty());
    }

    #[tokio::test]
    async fn test_stream_then_done() {
        let (sink, mut rx) = EventSink::channel(64);
        assert!(stream_answer(&sink, &"x".repeat(65)).await);
        drop(sink);

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert_eq!(events.len(), 4);
        assert_eq!(events[3], StreamEvent::Done);
        assert_eq!(events[2], StreamEvent::Content { chunk: "x".repeat(5) });
    }

    #[tokio::test]
    async fn test_empty_answer_only_done() {
        let (sink, mut rx) = EventSink::channel(4);
        assert!(stream_answer(&sink, "").await);
        assert_eq!(rx.recv().await, Some(StreamEvent::Done));
    }
}
