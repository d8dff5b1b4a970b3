//! # 响应解析模块
//!
//! ## 设计思路
//!
//! 识别服务的响应结构松散且不可信，每一层都可能缺失。
//! 这里不做“整体反序列化到强类型”，而是按路径逐层用返回 `Option` 的访问器导航，
//! 每个缺失都显式落到一个具名默认值：
//!
//! ```text
//! result → classification → suggestions[0]
//!                              ├─ name                           （缺失 → "Unknown plant"）
//!                              └─ details → description → value （缺失 → "No description available"）
//! ```
//!
//! 任何一层缺失（或类型不符）都只是“未识别”，不是错误。
//! 只有顶层不是合法 JSON 对象时才返回 `IdentifyError::Parse`。
//!
//! 字符串字段按原样返回，不做裁剪；空字符串也是“存在”，不会落到默认值。
//!
//! 同时兼容旧版字段名：`plant_details`、`wikipedia_description`。

use serde_json::{Map, Value};

use super::source::{IdentificationResult, NO_DESCRIPTION, RawResponse, UNKNOWN_PLANT_NAME};
use super::IdentifyError;

const DETAILS_KEYS: &[&str] = &["details", "plant_details"];
const DESCRIPTION_KEYS: &[&str] = &["description", "wikipedia_description"];

/// 排名第一的候选（服务端排序，不做二次排序或阈值过滤）。
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub name: Option<String>,
    pub description: Option<String>,
    pub common_names: Vec<String>,
    pub probability: Option<f64>,
}

/// 响应解析器，无状态。
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseParser;

impl ResponseParser {
    /// 解析原始响应为最终结果。
    pub fn parse(&self, raw: &RawResponse) -> Result<IdentificationResult, IdentifyError> {
        let root = Self::decode_root(&raw.body)?;

        let Some(suggestion) = Self::top_suggestion(&root) else {
            log::info!("🔍 响应中没有可用候选");
            return Ok(IdentificationResult::not_identified());
        };

        log::info!(
            "🌿 识别成功 - name={:?} probability={:?} common_names={:?}",
            suggestion.name,
            suggestion.probability,
            suggestion.common_names
        );

        Ok(IdentificationResult::identified(
            suggestion.name.unwrap_or_else(|| UNKNOWN_PLANT_NAME.to_string()),
            suggestion.description.unwrap_or_else(|| NO_DESCRIPTION.to_string()),
        ))
    }

    /// 顶层必须是 JSON 对象。
    fn decode_root(body: &[u8]) -> Result<Map<String, Value>, IdentifyError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| IdentifyError::Parse(format!("响应不是合法 JSON：{}", e)))?;

        match value {
            Value::Object(map) => Ok(map),
            other => Err(IdentifyError::Parse(format!(
                "响应顶层应为对象，实际为 {}",
                Self::json_type_name(&other)
            ))),
        }
    }

    /// 导航到第一个候选；任一层缺失返回 `None`。
    pub fn top_suggestion(root: &Map<String, Value>) -> Option<Suggestion> {
        let result = object_field(root, "result")?;
        let classification = object_field(result, "classification")?;
        let suggestions = classification.get("suggestions")?.as_array()?;
        let first = suggestions.first()?.as_object()?;

        Some(Self::read_suggestion(first))
    }

    fn read_suggestion(suggestion: &Map<String, Value>) -> Suggestion {
        let name = string_field(suggestion, "name");

        let details = DETAILS_KEYS.iter().find_map(|key| object_field(suggestion, key));

        let description = details.and_then(|details| {
            DESCRIPTION_KEYS
                .iter()
                .find_map(|key| object_field(details, key))
                .and_then(|description| string_field(description, "value"))
        });

        let common_names = details
            .and_then(|details| details.get("common_names"))
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let probability = suggestion.get("probability").and_then(Value::as_f64);

        Suggestion {
            name,
            description,
            common_names,
            probability,
        }
    }

    fn json_type_name(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

fn object_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    map.get(key)?.as_object()
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawResponse {
        RawResponse {
            status: 200,
            body: serde_json::to_vec(&value).unwrap(),
        }
    }

    fn parse(value: Value) -> IdentificationResult {
        ResponseParser.parse(&raw(value)).expect("parse should succeed")
    }

    #[test]
    fn missing_result_is_not_identified() {
        assert_eq!(parse(json!({ "status": "COMPLETED" })), IdentificationResult::not_identified());
    }

    #[test]
    fn missing_intermediate_links_are_not_identified() {
        assert_eq!(parse(json!({ "result": {} })), IdentificationResult::not_identified());
        assert_eq!(
            parse(json!({ "result": { "classification": {} } })),
            IdentificationResult::not_identified()
        );
        assert_eq!(
            parse(json!({ "result": { "classification": { "suggestions": null } } })),
            IdentificationResult::not_identified()
        );
        assert_eq!(
            parse(json!({ "result": "oops" })),
            IdentificationResult::not_identified()
        );
    }

    #[test]
    fn empty_suggestions_is_not_identified() {
        let result = parse(json!({ "result": { "classification": { "suggestions": [] } } }));
        assert_eq!(result, IdentificationResult::not_identified());
        assert_eq!(result.name, "Unknown plant");
        assert_eq!(result.description, "Could not identify the plant in the image");
    }

    #[test]
    fn single_suggestion_is_identified() {
        let result = parse(json!({
            "result": { "classification": { "suggestions": [
                { "name": "Rosa", "details": { "description": { "value": "A flower" } } }
            ] } }
        }));

        assert_eq!(
            result,
            IdentificationResult {
                success: true,
                name: "Rosa".to_string(),
                description: "A flower".to_string(),
            }
        );
    }

    #[test]
    fn suggestion_without_details_uses_default_description() {
        let result = parse(json!({
            "result": { "classification": { "suggestions": [ { "name": "Rosa" } ] } }
        }));
        assert!(result.success);
        assert_eq!(result.name, "Rosa");
        assert_eq!(result.description, "No description available");
    }

    #[test]
    fn suggestion_without_name_uses_default_name() {
        let result = parse(json!({
            "result": { "classification": { "suggestions": [
                { "name": null, "details": { "description": { "value": "Leafy" } } }
            ] } }
        }));
        assert!(result.success);
        assert_eq!(result.name, "Unknown plant");
        assert_eq!(result.description, "Leafy");
    }

    #[test]
    fn only_first_suggestion_is_used() {
        let result = parse(json!({
            "result": { "classification": { "suggestions": [
                { "name": "Ficus", "probability": 0.12 },
                { "name": "Rosa", "probability": 0.95 }
            ] } }
        }));
        assert_eq!(result.name, "Ficus");
    }

    #[test]
    fn legacy_field_names_are_tolerated() {
        let root = json!({
            "result": { "classification": { "suggestions": [{
                "name": "Monstera deliciosa",
                "probability": 0.87,
                "plant_details": {
                    "common_names": ["Swiss cheese plant", 7],
                    "wikipedia_description": { "value": "A climbing plant" }
                }
            }] } }
        });
        let map = root.as_object().unwrap();

        let suggestion = ResponseParser::top_suggestion(map).unwrap();
        assert_eq!(suggestion.name.as_deref(), Some("Monstera deliciosa"));
        assert_eq!(suggestion.description.as_deref(), Some("A climbing plant"));
        assert_eq!(suggestion.common_names, vec!["Swiss cheese plant".to_string()]);
        assert_eq!(suggestion.probability, Some(0.87));
    }

    #[test]
    fn plant_name_is_not_a_name_alias() {
        let result = parse(json!({
            "result": { "classification": { "suggestions": [ { "plant_name": "Fake" } ] } }
        }));
        assert!(result.success);
        assert_eq!(result.name, "Unknown plant");
    }

    #[test]
    fn present_strings_are_returned_verbatim() {
        let result = parse(json!({
            "result": { "classification": { "suggestions": [
                { "name": "  Rosa  ", "details": { "description": { "value": "" } } }
            ] } }
        }));
        assert!(result.success);
        assert_eq!(result.name, "  Rosa  ");
        assert_eq!(result.description, "");

        let unnamed = parse(json!({
            "result": { "classification": { "suggestions": [ { "name": "" } ] } }
        }));
        assert_eq!(unnamed.name, "");
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let raw = RawResponse {
            status: 200,
            body: b"<html>502 Bad Gateway</html>".to_vec(),
        };
        assert!(matches!(ResponseParser.parse(&raw), Err(IdentifyError::Parse(_))));
    }

    #[test]
    fn non_object_top_level_is_a_parse_error() {
        assert!(matches!(ResponseParser.parse(&raw(json!([1, 2]))), Err(IdentifyError::Parse(_))));
        assert!(matches!(ResponseParser.parse(&raw(json!(null))), Err(IdentifyError::Parse(_))));
    }
}
