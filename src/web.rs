//! HTTP 接口：POST /api/chat（SSE 流）与 GET /health
//!
//! 每个请求创建一条有界事件通道，后台任务跑 process_chat，响应体逐条读取事件并编码为
//! `data: <json>\n\n`。客户端断开后响应流被丢弃，生产端在下一次发送时停止。

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures_util::stream;
use serde_json::json;

use crate::agent::{process_chat, AgentComponents, ChatRequest};
use crate::react::EventSink;

/// 构建路由；组件通过 axum state 共享给所有请求
pub fn router(components: Arc<AgentComponents>) -> Router {
    Router::new()
        .route("/api/chat", post(api_chat))
        .route("/health", get(health))
        .with_state(components)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    }))
}

async fn api_chat(
    State(components): State<Arc<AgentComponents>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "message is required"})),
        )
            .into_response();
    }

    let (sink, rx) = EventSink::channel(components.config.chat.event_buffer);
    tokio::spawn(async move {
        let _ = process_chat(&components, req, sink).await;
    });

    type BoxErr = Box<dyn std::error::Error + Send + Sync>;
    let stream = stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|ev| (Ok::<Bytes, BoxErr>(Bytes::from(ev.to_sse_frame())), rx))
    });

    let mut res = Response::new(Body::from_stream(stream));
    let headers = res.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream; charset=utf-8"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    res
}
