//! 对话 HTTP 服务
//!
//! 启动: cargo run --bin fund-chat-web
//! 端口可用 FUND_CHAT_WEB_PORT 覆盖 [web].port

#![cfg(feature = "web")]

use std::sync::Arc;

use anyhow::Context;
use fund_chat::agent::create_agent_components;
use fund_chat::observability;
use fund_chat::web::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let components =
        create_agent_components(None).context("Failed to build agent components")?;
    let host = components.config.web.host.clone();
    let port = std::env::var("FUND_CHAT_WEB_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(components.config.web.port);

    let app = router(Arc::new(components));
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("fund-chat web: http://{}", addr);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
