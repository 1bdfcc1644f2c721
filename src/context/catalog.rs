//! 看板数据模块目录：8 个页面模块及其关键词，由页面数据服务通过 HTTP 提供内容

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::ModulesSection;
use crate::context::{DataModule, ModuleRegistry};
use crate::core::AgentError;

/// 模块 id、显示名、关键词
pub const MODULE_CATALOG: &[(&str, &str, &[&str])] = &[
    ("kx", "7*24快讯", &["快讯", "新闻", "news", "消息", "动态"]),
    (
        "marker",
        "全球指数",
        &["指数", "上证", "深证", "恒生", "道琼斯", "nasdaq", "纳斯达克", "market", "index"],
    ),
    (
        "real_time_gold",
        "实时贵金属",
        &["黄金", "白银", "贵金属", "gold", "silver", "金价"],
    ),
    ("gold", "历史金价", &["历史金价", "金价走势", "金价趋势"]),
    ("seven_A", "成交量趋势", &["成交量", "交易量", "volume"]),
    ("A", "上证分时", &["上证分时", "A股分时", "分时图"]),
    (
        "fund",
        "自选基金",
        &["基金", "持仓", "自选", "fund", "收益", "净值"],
    ),
    (
        "bk",
        "行业板块",
        &["板块", "行业", "sector", "涨跌", "主力", "净流入"],
    ),
];

/// 通过 HTTP 拉取的模块：GET {base_url}/{id}
pub struct HttpDataModule {
    id: String,
    display_name: String,
    keywords: Vec<String>,
    url: String,
    client: Client,
}

impl HttpDataModule {
    pub fn new(
        id: &str,
        display_name: &str,
        keywords: &[&str],
        base_url: &str,
        client: Client,
    ) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            url: format!("{}/{}", base_url.trim_end_matches('/'), id),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DataModule for HttpDataModule {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn keywords(&self) -> &[String] {
        &self.keywords
    }

    async fn fetch(&self) -> Result<String, String> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        resp.text().await.map_err(|e| format!("Read body: {}", e))
    }
}

/// 按目录构建模块注册表（共用一个 HTTP 客户端），并设置默认模块
pub fn build_catalog_registry(cfg: &ModulesSection) -> Result<ModuleRegistry, AgentError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(cfg.fetch_timeout_secs))
        .build()
        .map_err(|e| AgentError::ConfigError(format!("module http client: {}", e)))?;

    let mut registry = ModuleRegistry::new();
    for (id, name, keywords) in MODULE_CATALOG {
        registry.register(Arc::new(HttpDataModule::new(
            id,
            name,
            keywords,
            &cfg.base_url,
            client.clone(),
        )))?;
    }
    registry.set_defaults(&cfg.default_ids)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_registry() {
        let registry = build_catalog_registry(&ModulesSection::default()).unwrap();
        assert_eq!(registry.len(), 8);

        let ids: Vec<String> = registry.defaults().iter().map(|m| m.id().to_string()).collect();
        assert_eq!(ids, vec!["kx", "bk", "fund"]);

        let gold = registry.get("real_time_gold").unwrap();
        assert_eq!(gold.display_name(), "实时贵金属");
        assert!(gold.keywords().iter().any(|k| k == "黄金"));
        // 关键词统一小写
        let a = registry.get("A").unwrap();
        assert!(a.keywords().iter().any(|k| k == "a股分时"));
    }

    #[test]
    fn test_module_url() {
        let m = HttpDataModule::new("kx", "7*24快讯", &[], "http://host/api/modules/", Client::new());
        assert_eq!(m.url(), "http://host/api/modules/kx");
    }
}
