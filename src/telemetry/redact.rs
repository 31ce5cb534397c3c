//! Sensitive-field redaction for logged and persisted metadata
//!
//! Client-supplied metadata ends up in logs and usage rows. Any field whose
//! name looks credential-shaped is replaced with a placeholder before the
//! value leaves the request handler, recursively through nested objects and
//! arrays.

use serde_json::Value;

const REDACTED: &str = "[REDACTED]";

/// Key fragments that mark a field as sensitive (matched case-insensitively)
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "authorization",
    "credential",
    "private_key",
    "session",
    "cookie",
    "customer_id",
];

fn is_sensitive(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|s| lower.contains(s))
}

/// Redact sensitive fields in a JSON value, returning the sanitized copy
pub fn redact_metadata(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                if is_sensitive(key) {
                    out.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(key.clone(), redact_metadata(val));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_metadata).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_flat_sensitive_fields() {
        let input = json!({ "user_id": "123", "password": "secret123" });
        let out = redact_metadata(&input);
        assert_eq!(out["password"], "[REDACTED]");
        assert_eq!(out["user_id"], "123");
    }

    #[test]
    fn redacts_nested_objects() {
        let input = json!({
            "user": {
                "id": "123",
                "password": "secret",
                "profile": { "apiKey": "key123" }
            }
        });
        let out = redact_metadata(&input);
        assert_eq!(out["user"]["password"], "[REDACTED]");
        assert_eq!(out["user"]["profile"]["apiKey"], "[REDACTED]");
        assert_eq!(out["user"]["id"], "123");
    }

    #[test]
    fn matches_keys_case_insensitively() {
        let input = json!({ "PASSWORD": "a", "ApiKey": "b", "TOKEN": "c", "name": "ok" });
        let out = redact_metadata(&input);
        assert_eq!(out["PASSWORD"], "[REDACTED]");
        assert_eq!(out["ApiKey"], "[REDACTED]");
        assert_eq!(out["TOKEN"], "[REDACTED]");
        assert_eq!(out["name"], "ok");
    }

    #[test]
    fn redacts_provider_customer_ids() {
        let input = json!({ "stripe_customer_id": "cus_123", "email": "a@b.c" });
        let out = redact_metadata(&input);
        assert_eq!(out["stripe_customer_id"], "[REDACTED]");
        assert_eq!(out["email"], "a@b.c");
    }

    #[test]
    fn walks_arrays() {
        let input = json!({ "items": [{ "token": "t" }, { "value": 1 }] });
        let out = redact_metadata(&input);
        assert_eq!(out["items"][0]["token"], "[REDACTED]");
        assert_eq!(out["items"][1]["value"], 1);
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(redact_metadata(&json!(42)), json!(42));
        assert_eq!(redact_metadata(&json!("plain")), json!("plain"));
        assert_eq!(redact_metadata(&json!(null)), json!(null));
    }
}
