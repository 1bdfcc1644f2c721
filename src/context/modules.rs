//! 数据模块：页面上的实时数据块（快讯、指数、金价、基金…）
//!
//! 每个模块有 id、显示名、触发关键词，以及可独立失败的 fetch。
//! ModuleRegistry 在启动时构建一次，之后只读共享；注册时校验 id 唯一与默认模块存在。

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::AgentError;

/// 数据模块 trait
#[async_trait]
pub trait DataModule: Send + Sync {
    /// 模块 id（如 `real_time_gold`）
    fn id(&self) -> &str;

    /// 显示名（如 `实时贵金属`）
    fn display_name(&self) -> &str;

    /// 触发关键词（小写匹配）
    fn keywords(&self) -> &[String];

    /// 拉取模块内容（通常是渲染好的 HTML）
    async fn fetch(&self) -> Result<String, String>;
}

/// 模块注册表：按注册顺序保存，默认模块在无关键词命中时使用
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<dyn DataModule>>,
    default_ids: Vec<String>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册模块；id 重复时返回 DuplicateModule
    pub fn register(&mut self, module: Arc<dyn DataModule>) -> Result<(), AgentError> {
        if self.get(module.id()).is_some() {
            return Err(AgentError::DuplicateModule(module.id().to_string()));
        }
        self.modules.push(module);
        Ok(())
    }

    /// 设置默认模块（须已注册）
    pub fn set_defaults(&mut self, ids: &[String]) -> Result<(), AgentError> {
        let mut seen = HashSet::new();
        let mut defaults = Vec::new();
        for id in ids {
            if self.get(id).is_none() {
                return Err(AgentError::UnknownModule(id.clone()));
            }
            if seen.insert(id.as_str()) {
                defaults.push(id.clone());
            }
        }
        self.default_ids = defaults;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn DataModule>> {
        self.modules.iter().find(|m| m.id() == id).cloned()
    }

    pub fn modules(&self) -> &[Arc<dyn DataModule>] {
        &self.modules
    }

    /// 默认模块（按配置顺序）
    pub fn defaults(&self) -> Vec<Arc<dyn DataModule>> {
        self.default_ids.iter().filter_map(|id| self.get(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// 内存中的静态模块，用于本地联调与测试
pub struct StaticModule {
    id: String,
    display_name: String,
    keywords: Vec<String>,
    content: Result<String, String>,
}

impl StaticModule {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        keywords: &[&str],
        content: Result<String, String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            content,
        }
    }
}

#[async_trait]
impl DataModule for StaticModule {
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
        self.content.clone()
    }
}
