//! Candidate-key extraction for unstable server field naming.
//!
//! Several KSeF responses expose the same value under different field names
//! depending on API revision. Each extraction point declares an ordered
//! candidate list; earlier names win even when later names are also
//! present. That order is the contract, tested below.

use serde_json::Value;

/// First non-empty string found under any of `keys`, in order.
#[must_use]
pub fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// First millisecond timestamp under any of `keys`, in order. The server
/// has emitted both JSON numbers and numeric strings here.
#[must_use]
pub fn first_millis(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| value.get(key).and_then(millis))
}

fn millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Normalize a token value that may be a bare string or an object wrapping
/// a `token` field. Applied uniformly at every token extraction site.
#[must_use]
pub fn resolve_token(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("token")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn first_string_respects_candidate_order() {
        let value = json!({"referenceNumber": "second", "challenge": "first"});
        assert_eq!(
            first_string(&value, &["challenge", "referenceNumber"]),
            Some("first".to_string())
        );
    }

    #[test]
    fn first_string_skips_empty_and_missing_candidates() {
        let value = json!({"challenge": "", "challengeKey": "ck-1"});
        assert_eq!(
            first_string(&value, &["challenge", "referenceNumber", "challengeKey"]),
            Some("ck-1".to_string())
        );
        assert_eq!(first_string(&value, &["nope"]), None);
    }

    #[test]
    fn first_millis_accepts_numbers_and_numeric_strings() {
        assert_eq!(first_millis(&json!({"timestampMs": 1700000000000_i64}), &["timestampMs"]), Some(1700000000000));
        assert_eq!(
            first_millis(&json!({"timestamp": "1700000000000"}), &["timestampMs", "timestamp"]),
            Some(1700000000000)
        );
        assert_eq!(first_millis(&json!({"timestamp": "soon"}), &["timestamp"]), None);
    }

    #[test]
    fn resolve_token_handles_both_shapes() {
        assert_eq!(resolve_token(&json!("plain")), Some("plain".to_string()));
        assert_eq!(resolve_token(&json!({"token": "wrapped"})), Some("wrapped".to_string()));
        assert_eq!(resolve_token(&json!("")), None);
        assert_eq!(resolve_token(&json!({"token": ""})), None);
        assert_eq!(resolve_token(&json!(42)), None);
        assert_eq!(resolve_token(&json!({"value": "x"})), None);
    }
}
