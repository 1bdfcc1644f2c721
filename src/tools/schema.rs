//! 工具参数 JSON Schema 生成（schemars 自动生成）
//!
//! 每个工具的参数用一个带 `JsonSchema` 的结构体描述，生成的 schema 作为 function calling 的 parameters。

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// 返回参数结构体 T 的 JSON Schema（去掉 `$schema` 与 `title`，只保留对象描述）
pub fn parameters_for<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| {
        serde_json::json!({ "type": "object", "properties": {} })
    });
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct Args {
        /// 搜索关键词
        query: String,
        max_results: Option<usize>,
    }

    #[test]
    fn test_parameters_for() {
        let schema = parameters_for::<Args>();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["query"].is_object());
        assert_eq!(schema["required"], serde_json::json!(["query"]));
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());
    }
}
