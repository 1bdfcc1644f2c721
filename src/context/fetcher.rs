//! 模块并发拉取
//!
//! 每个选中的模块一个任务（JoinSet 作用域限定在一次调用内），全部完成或失败后才返回。
//! 单个模块失败、超时或 panic 只影响自己：记录日志并用占位文本替代，不影响其它模块与请求。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::context::markup::strip_markup;
use crate::context::DataModule;

/// 模块拉取失败时的占位文本
pub const FETCH_FAILED_PLACEHOLDER: &str = "数据获取失败";

/// 一个模块的上下文片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSection {
    pub module_id: String,
    pub display_name: String,
    pub text: String,
    pub ok: bool,
}

impl ContextSection {
    fn failed(module: &dyn DataModule) -> Self {
        Self {
            module_id: module.id().to_string(),
            display_name: module.display_name().to_string(),
            text: FETCH_FAILED_PLACEHOLDER.to_string(),
            ok: false,
        }
    }

    fn render(&self) -> String {
        format!(
            "\n=== {} ({}) ===\n{}",
            self.display_name, self.module_id, self.text
        )
    }
}

/// 一次拉取的结果（顺序与选中顺序一致）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedContext {
    pub sections: Vec<ContextSection>,
}

impl FetchedContext {
    /// 模块 id → 纯文本内容
    pub fn contents(&self) -> HashMap<String, String> {
        self.sections
            .iter()
            .map(|s| (s.module_id.clone(), s.text.clone()))
            .collect()
    }

    /// 拼接为 prompt 中的上下文块
    pub fn render(&self) -> String {
        self.sections
            .iter()
            .map(ContextSection::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 模块拉取器：单模块超时
pub struct ModuleFetcher {
    timeout: Duration,
}

impl ModuleFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        Self::with_timeout(Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// 并发拉取全部模块，等待每个模块完成或失败后返回
    pub async fn fetch_all(&self, modules: &[Arc<dyn DataModule>]) -> FetchedContext {
        let start = Instant::now();
        let mut set = JoinSet::new();
        for (idx, module) in modules.iter().enumerate() {
            let module = Arc::clone(module);
            let limit = self.timeout;
            set.spawn(async move {
                let outcome = match timeout(limit, module.fetch()).await {
                    Ok(Ok(content)) => Ok(content),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(format!("timed out after {}s", limit.as_secs_f32())),
                };
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<ContextSection>> = vec![None; modules.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, Ok(content))) => {
                    let module = &modules[idx];
                    tracing::debug!(module = %module.id(), chars = content.len(), "module fetched");
                    slots[idx] = Some(ContextSection {
                        module_id: module.id().to_string(),
                        display_name: module.display_name().to_string(),
                        text: strip_markup(&content, "\n"),
                        ok: true,
                    });
                }
                Ok((idx, Err(e))) => {
                    let module = &modules[idx];
                    tracing::error!(module = %module.id(), error = %e, "module fetch failed");
                    slots[idx] = Some(ContextSection::failed(module.as_ref()));
                }
                // panic 的任务拿不到下标，留空槽位，统一在下面补占位
                Err(e) => tracing::error!(error = %e, "module fetch task aborted"),
            }
        }

        let sections = slots
            .into_iter()
            .zip(modules)
            .map(|(slot, module)| slot.unwrap_or_else(|| ContextSection::failed(module.as_ref())))
            .collect();
        tracing::info!(
            modules = modules.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "context fetched"
        );
        FetchedContext { sections }
    }
}
