//! search_news 工具：按关键词搜索财经新闻
//!
//! 请求 `GET {endpoint}?{query_param}=<query>`；RSS 响应解析为「标题 / 时间 / 链接」列表，
//! HTML 响应提取可读文本，其它原样返回；结果按 max_result_chars 截断。

use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::config::NewsSection;
use crate::context::markup::strip_markup;
use crate::tools::webpage::{html_to_text, http_client, looks_like_html, truncate_chars};
use crate::tools::{parameters_for, Tool};

const DEFAULT_MAX_RESULTS: usize = 5;
const MAX_RESULTS_LIMIT: usize = 20;

/// search_news 参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchNewsArgs {
    /// 搜索关键词，如基金名称、板块或事件
    pub query: String,
    /// 返回的新闻条数（默认 5，最多 20）
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// RSS 中的一条新闻
#[derive(Debug, Clone, PartialEq, Eq)]
struct NewsItem {
    title: String,
    published: String,
    link: String,
}

/// 取 `<tag>...</tag>` 之间的文本（含 CDATA 与实体解码）
fn tag_text(block: &str, tag: &str) -> String {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let Some(start) = block.find(&open) else {
        return String::new();
    };
    let after_open = &block[start..];
    let Some(gt) = after_open.find('>') else {
        return String::new();
    };
    let inner = &after_open[gt + 1..];
    let inner = match inner.find(&close) {
        Some(end) => &inner[..end],
        None => inner,
    };
    let inner = inner.trim();
    let inner = inner
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
        .unwrap_or(inner);
    strip_markup(inner, " ")
}

/// 解析 RSS `<item>` 列表，最多 max 条
fn parse_rss_items(body: &str, max: usize) -> Vec<NewsItem> {
    body.split("<item")
        .skip(1)
        .filter_map(|chunk| {
            let block = chunk.split("</item>").next()?;
            let title = tag_text(block, "title");
            if title.is_empty() {
                return None;
            }
            Some(NewsItem {
                title,
                published: tag_text(block, "pubDate"),
                link: tag_text(block, "link"),
            })
        })
        .take(max)
        .collect()
}

fn render_items(query: &str, items: &[NewsItem]) -> String {
    if items.is_empty() {
        return format!("No news found for: {}", query);
    }
    let mut out = format!("News results for: {}\n", query);
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("{}. {}", i + 1, item.title));
        if !item.published.is_empty() {
            out.push_str(&format!(" ({})", item.published));
        }
        if !item.link.is_empty() {
            out.push_str(&format!("\n   {}", item.link));
        }
        out.push('\n');
    }
    out
}

/// search_news 工具
pub struct SearchNewsTool {
    client: Client,
    endpoint: String,
    query_param: String,
    max_result_chars: usize,
}

impl SearchNewsTool {
    pub fn new(section: &NewsSection, max_result_chars: usize) -> Self {
        Self {
            client: http_client(section.timeout_secs),
            endpoint: section.endpoint.clone(),
            query_param: section.query_param.clone(),
            max_result_chars,
        }
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<String, String> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[(self.query_param.as_str(), query)])
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp.text().await.map_err(|e| format!("Read body: {}", e))?;
        let body = body.trim_start_matches('\u{FEFF}');

        let text = if body.contains("<rss") || body.contains("<item") {
            render_items(query, &parse_rss_items(body, max_results))
        } else if looks_like_html(body) {
            html_to_text(body)
        } else {
            body.to_string()
        };
        Ok(truncate_chars(text, self.max_result_chars))
    }
}

#[async_trait]
impl Tool for SearchNewsTool {
    fn name(&self) -> &str {
        "search_news"
    }

    fn description(&self) -> &str {
        "Search recent financial news by keyword (fund, sector, index, commodity or event). Returns titles, publish times and links."
    }

    fn parameters_schema(&self) -> Value {
        parameters_for::<SearchNewsArgs>()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: SearchNewsArgs =
            serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {}", e))?;
        let query = args.query.trim();
        if query.is_empty() {
            return Err("Missing query".to_string());
        }
        let max_results = args
            .max_results
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .clamp(1, MAX_RESULTS_LIMIT);
        tracing::info!(query = %query, max_results, "search_news");
        self.search(query, max_results).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?><rss><channel><title>Feed</title>
        <item><title><![CDATA[黄金价格创新高 &amp; 白银跟涨]]></title><link>https://n.example.com/1</link><pubDate>Mon, 19 Oct 2026 08:00:00 GMT</pubDate></item>
        <item><title>央行公开市场操作</title><link>https://n.example.com/2</link></item>
        <item><title>第三条</title></item>
        </channel></rss>"#;

    #[test]
    fn test_parse_rss_items() {
        let items = parse_rss_items(RSS, 2);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "黄金价格创新高 & 白银跟涨");
        assert_eq!(items[0].published, "Mon, 19 Oct 2026 08:00:00 GMT");
        assert_eq!(items[1].link, "https://n.example.com/2");
        assert!(items[1].published.is_empty());
    }

    #[test]
    fn test_render_items() {
        let rendered = render_items("黄金", &parse_rss_items(RSS, 5));
        assert!(rendered.starts_with("News results for: 黄金\n1. 黄金价格创新高"));
        assert!(rendered.contains("3. 第三条"));
        assert_eq!(render_items("x", &[]), "No news found for: x");
    }

    #[tokio::test]
    async fn test_missing_query() {
        let tool = SearchNewsTool::new(&NewsSection::default(), 100);
        let err = tool
            .execute(serde_json::json!({ "query": "  " }))
            .await
            .unwrap_err();
        assert_eq!(err, "Missing query");
    }
}
