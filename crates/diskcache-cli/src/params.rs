//! Parameter extraction helpers for dispatched calls.

use diskcache::{CacheError, Result};
use serde_json::Value;

/// Extract an optional string parameter, supporting both snake_case and camelCase.
pub(crate) fn get_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a str> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_str())
}

/// Extract a required string parameter or return an error.
pub(crate) fn require_str_param(params: &Value, snake: &str, camel: &str) -> Result<String> {
    get_str_param(params, snake, camel)
        .map(String::from)
        .ok_or_else(|| CacheError::InvalidParams {
            message: format!("Missing required parameter: {}", snake),
        })
}

/// Extract a required parameter of any JSON type.
pub(crate) fn require_value_param<'a>(params: &'a Value, name: &str) -> Result<&'a Value> {
    params.get(name).ok_or_else(|| CacheError::InvalidParams {
        message: format!("Missing required parameter: {}", name),
    })
}

/// Extract an optional u64 parameter, supporting both snake_case and camelCase.
///
/// Absent and `null` both mean "not given"; anything else must be a
/// non-negative integer.
pub(crate) fn get_u64_param(params: &Value, snake: &str, camel: &str) -> Result<Option<u64>> {
    match params.get(snake).or_else(|| params.get(camel)) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_u64().map(Some).ok_or_else(|| CacheError::InvalidParams {
            message: format!("Parameter {} must be a non-negative integer", snake),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snake_and_camel_case() {
        let params = json!({"cache_key": "a", "ttlSeconds": 5});
        assert_eq!(get_str_param(&params, "cache_key", "cacheKey"), Some("a"));
        assert_eq!(
            get_u64_param(&params, "ttl_seconds", "ttlSeconds").unwrap(),
            Some(5)
        );
    }

    #[test]
    fn test_missing_required() {
        let params = json!({});
        assert!(matches!(
            require_str_param(&params, "key", "cacheKey"),
            Err(CacheError::InvalidParams { .. })
        ));
        assert!(require_value_param(&params, "value").is_err());
    }

    #[test]
    fn test_u64_rejects_negative() {
        let params = json!({"ttl": -1});
        assert!(get_u64_param(&params, "ttl", "ttlSeconds").is_err());
        assert_eq!(get_u64_param(&json!({"ttl": null}), "ttl", "ttlSeconds").unwrap(), None);
    }
}
