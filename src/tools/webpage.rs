//! fetch_webpage 工具：抓取网页并转为可读文本
//!
//! 仅允许 http/https；配置了域名白名单时只允许名单内的域名（为空则不限制）；
//! GET 请求带超时与 User-Agent；HTML 用 html2text 提取可读文本，失败时回退到标记剥离；
//! 结果超过 max_result_chars 时截断并追加 ...[truncated]。

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::context::markup::strip_markup;
use crate::tools::{parameters_for, Tool};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// fetch_webpage 参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct FetchWebpageArgs {
    /// 要抓取的完整 URL（http 或 https）
    pub url: String,
}

/// 构造带浏览器 UA 与中文 Accept-Language 的 HTTP 客户端
pub(crate) fn http_client(timeout_secs: u64) -> Client {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"));
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
        .unwrap_or_default()
}

/// 判断内容是否像 HTML（需提取可读文本）
pub(crate) fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.starts_with("<html")
        || s.starts_with("<HTML")
        || (s.len() > 20
            && s.contains('<')
            && (s.contains("</") || s.contains("<meta") || s.contains("<head") || s.contains("<title")))
}

/// 将 HTML 转为可读文本（去除 script/style 等）
pub(crate) fn html_to_text(html: &str) -> String {
    match from_read(html.as_bytes(), 120) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => strip_markup(html, " "),
    }
}

/// 按字符数截断
pub(crate) fn truncate_chars(body: String, max_chars: usize) -> String {
    if body.chars().count() > max_chars {
        body.chars().take(max_chars).collect::<String>() + "\n...[truncated]"
    } else {
        body
    }
}

/// 从 URL 中提取 host（不含端口与路径）
fn extract_domain(url: &str) -> Option<String> {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host = rest.split(['/', '?', '#']).next()?;
    let host = host.rsplit('@').next()?;
    let host = host.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}

/// fetch_webpage 工具
pub struct FetchWebpageTool {
    client: Client,
    allowed_domains: HashSet<String>,
    max_result_chars: usize,
}

impl FetchWebpageTool {
    pub fn new(allowed_domains: Vec<String>, timeout_secs: u64, max_result_chars: usize) -> Self {
        Self {
            client: http_client(timeout_secs),
            allowed_domains: allowed_domains.into_iter().map(|s| s.to_lowercase()).collect(),
            max_result_chars,
        }
    }

    fn check_url(&self, url: &str) -> Result<(), String> {
        let domain = extract_domain(url).ok_or_else(|| "Invalid or missing URL".to_string())?;
        if self.allowed_domains.is_empty() || self.allowed_domains.contains(&domain) {
            return Ok(());
        }
        Err(format!("Domain not in allowlist: {}", domain))
    }

    async fn fetch(&self, url: &str) -> Result<String, String> {
        self.check_url(url)?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp.text().await.map_err(|e| format!("Read body: {}", e))?;
        // 去除 BOM，避免 HTML 检测失败
        let body = body.trim_start_matches('\u{FEFF}');

        let text = if looks_like_html(body) {
            html_to_text(body)
        } else {
            body.to_string()
        };
        Ok(truncate_chars(text, self.max_result_chars))
    }
}

#[async_trait]
impl Tool for FetchWebpageTool {
    fn name(&self) -> &str {
        "fetch_webpage"
    }

    fn description(&self) -> &str {
        "Fetch a web page (e.g. a news article or fund page) and return its readable text. Use after search_news to read details."
    }

    fn parameters_schema(&self) -> Value {
        parameters_for::<FetchWebpageArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: FetchWebpageArgs =
            serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
        let url = args.url.trim();
        if url.is_empty() {
            return Err("Missing url".to_string());
        }
        tracing::info!(url = %url, "fetch_webpage");
        self.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://Finance.Sina.com.cn:443/a?b=1").as_deref(),
            Some("finance.sina.com.cn")
        );
        assert_eq!(extract_domain("ftp://x.com"), None);
        assert_eq!(extract_domain("https:///path"), None);
    }

    #[test]
    fn test_allowlist() {
        let open = FetchWebpageTool::new(vec![], 5, 100);
        assert!(open.check_url("https://any.example.com/x").is_ok());

        let closed = FetchWebpageTool::new(vec!["www.eastmoney.com".into()], 5, 100);
        assert!(closed.check_url("https://www.eastmoney.com/a").is_ok());
        assert_eq!(
            closed.check_url("https://evil.example.com").unwrap_err(),
            "Domain not in allowlist: evil.example.com"
        );
    }

    #[test]
    fn test_truncate_and_html_detection() {
        assert_eq!(truncate_chars("黄金白银".into(), 2), "黄金\n...[truncated]");
        assert_eq!(truncate_chars("ok".into(), 2), "ok");
        assert!(looks_like_html("<!DOCTYPE html><html></html>"));
        assert!(!looks_like_html("plain text"));
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let tool = FetchWebpageTool::new(vec![], 5, 100);
        let err = tool.execute(Value::String("https://x.com".into())).await.unwrap_err();
        assert!(err.starts_with("Invalid arguments"));
    }
}
