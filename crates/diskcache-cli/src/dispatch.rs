//! Method dispatch: maps a method name and JSON params onto a cache call.

use crate::params::{get_u64_param, require_str_param, require_value_param};
use diskcache::{CacheError, DiskCache, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

/// One call, as read from the command line or a batch line.
#[derive(Debug, Deserialize)]
pub struct Request {
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Outcome of one call.
#[derive(Debug, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

#[derive(Debug, Serialize)]
pub struct ResponseError {
    pub code: i32,
    pub kind: String,
    pub message: String,
}

impl Response {
    pub fn success(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn error(err: &CacheError) -> Self {
        Self {
            result: None,
            error: Some(ResponseError {
                code: err.error_code(),
                kind: err.kind().to_string(),
                message: err.to_string(),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Run one request against the cache.
pub fn handle(cache: &DiskCache, request: &Request) -> Response {
    let params = request
        .params
        .clone()
        .unwrap_or(Value::Object(Default::default()));

    debug!("Call: {}({})", request.method, params);

    match dispatch_method(cache, &request.method, &params) {
        Ok(value) => Response::success(value),
        Err(e) => {
            error!("Call {} failed: {}", request.method, e);
            Response::error(&e)
        }
    }
}

fn dispatch_method(cache: &DiskCache, method: &str, params: &Value) -> Result<Value> {
    match method {
        "get" => {
            let key = require_str_param(params, "key", "cacheKey")?;
            let value: Option<Value> = cache.get(&key)?;
            Ok(json!({ "found": value.is_some(), "value": value }))
        }
        "set" => {
            let key = require_str_param(params, "key", "cacheKey")?;
            let value = require_value_param(params, "value")?;
            let ttl = get_u64_param(params, "ttl", "ttlSeconds")?;
            let outcome = cache.set(&key, value, ttl)?;
            Ok(json!({ "outcome": outcome, "overwrote": outcome.is_overwrite() }))
        }
        "expire" => {
            let key = require_str_param(params, "key", "cacheKey")?;
            Ok(json!({ "found": cache.expire(&key)? }))
        }
        "read" => {
            let key = require_str_param(params, "key", "cacheKey")?;
            Ok(serde_json::to_value(cache.read(&key)?)?)
        }
        "contains" => {
            let key = require_str_param(params, "key", "cacheKey")?;
            Ok(json!(cache.contains(&key)?))
        }
        "freshen" => Ok(json!({ "evicted": cache.freshen()? })),
        "flush_cache" | "flushCache" => Ok(json!({ "evicted": cache.flush_cache()? })),
        "get_cache_size" | "getCacheSize" => Ok(json!(cache.cache_size()?)),
        "get_cache_max_size" | "getCacheMaxSize" => Ok(json!(cache.cache_max_size())),
        "stats" => Ok(serde_json::to_value(cache.stats()?)?),
        _ => Err(CacheError::InvalidParams {
            message: format!("Unknown method: {}", method),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_cache() -> (TempDir, DiskCache) {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::builder(temp_dir.path().join("cache"))
            .build()
            .unwrap();
        (temp_dir, cache)
    }

    fn call(cache: &DiskCache, method: &str, params: Value) -> Response {
        handle(
            cache,
            &Request {
                method: method.to_string(),
                params: Some(params),
            },
        )
    }

    #[test]
    fn test_set_then_get() {
        let (_temp, cache) = create_test_cache();

        let set = call(&cache, "set", json!({"key": "k", "value": {"n": 1}, "ttl": 60}));
        assert_eq!(set.result.unwrap()["outcome"], "stored");

        let get = call(&cache, "get", json!({"key": "k"}));
        let result = get.result.unwrap();
        assert_eq!(result["found"], true);
        assert_eq!(result["value"], json!({"n": 1}));
    }

    #[test]
    fn test_camel_case_params() {
        let (_temp, cache) = create_test_cache();

        call(&cache, "set", json!({"cacheKey": "k", "value": 7, "ttlSeconds": 60}));
        let read = call(&cache, "read", json!({"cacheKey": "k"}));
        let info = read.result.unwrap();
        assert_eq!(info["key"], "k");
        assert!(!info["expires_at"].is_null());
    }

    #[test]
    fn test_overwrite_flag() {
        let (_temp, cache) = create_test_cache();
        call(&cache, "set", json!({"key": "k", "value": 1}));
        let second = call(&cache, "set", json!({"key": "k", "value": 2}));
        assert_eq!(second.result.unwrap()["overwrote"], true);
    }

    #[test]
    fn test_absent_key_is_not_an_error() {
        let (_temp, cache) = create_test_cache();

        let get = call(&cache, "get", json!({"key": "nope"}));
        assert!(!get.is_error());
        assert_eq!(get.result.unwrap()["found"], false);

        let read = call(&cache, "read", json!({"key": "nope"}));
        assert_eq!(read.result.unwrap(), Value::Null);

        let expire = call(&cache, "expire", json!({"key": "nope"}));
        assert_eq!(expire.result.unwrap()["found"], false);
    }

    #[test]
    fn test_camel_case_aliases() {
        let (_temp, cache) = create_test_cache();
        call(&cache, "set", json!({"key": "k", "value": "v"}));

        let size = call(&cache, "getCacheSize", json!({}));
        assert_eq!(size.result.unwrap(), json!(3));

        let max = call(&cache, "getCacheMaxSize", json!({}));
        assert_eq!(max.result.unwrap(), json!(64 * 1024 * 1024));

        let flushed = call(&cache, "flushCache", json!({}));
        assert_eq!(flushed.result.unwrap()["evicted"], 1);
    }

    #[test]
    fn test_errors_carry_kind_and_code() {
        let (_temp, cache) = create_test_cache();

        let missing = call(&cache, "set", json!({"key": "k"}));
        let err = missing.error.unwrap();
        assert_eq!(err.kind, "validation");
        assert_eq!(err.code, -32602);

        let unknown = call(&cache, "explode", json!({}));
        assert!(unknown.is_error());

        let bad_key = call(&cache, "get", json!({"key": "../etc"}));
        assert_eq!(bad_key.error.unwrap().kind, "validation");
    }

    #[test]
    fn test_capacity_error_kind() {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskCache::builder(temp_dir.path().join("cache"))
            .max_size_bytes(10)
            .build()
            .unwrap();

        let response = call(&cache, "set", json!({"key": "k", "value": "x".repeat(20)}));
        let err = response.error.unwrap();
        assert_eq!(err.kind, "capacity");
        assert_eq!(err.code, -32002);
    }

    #[test]
    fn test_request_deserializes_without_params() {
        let request: Request = serde_json::from_str(r#"{"method": "stats"}"#).unwrap();
        assert!(request.params.is_none());
        let (_temp, cache) = create_test_cache();
        let response = handle(&cache, &request);
        assert_eq!(response.result.unwrap()["total_entries"], 0);
    }
}
