//! Fund Chat 命令行
//!
//! 对单个问题跑一次完整流程，把事件按 SSE 帧打印到标准输出。
//! 用法: fund-chat [--config path] 黄金价格怎么样

use std::path::PathBuf;

use anyhow::{bail, Context};
use fund_chat::agent::{create_agent_components, process_chat, ChatRequest};
use fund_chat::observability;
use fund_chat::react::EventSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut words = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args.next().context("--config requires a path")?;
            config_path = Some(PathBuf::from(path));
        } else {
            words.push(arg);
        }
    }
    let question = words.join(" ");
    if question.trim().is_empty() {
        bail!("usage: fund-chat [--config path] <question>");
    }

    let components =
        create_agent_components(config_path).context("Failed to build agent components")?;
    let (sink, mut rx) = EventSink::channel(components.config.chat.event_buffer);

    let printer = tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            print!("{}", ev.to_sse_frame());
        }
    });
    let result = process_chat(&components, ChatRequest::new(question), sink).await;
    printer.await.context("printer task failed")?;

    if let Err(e) = result {
        tracing::debug!("chat ended with error: {}", e);
    }
    Ok(())
}
