use serde_json::Value;

/// Masks sensitive fields in JSON payloads before they hit the logs.
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_field(key) {
                    mask_value(val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_field(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "account_number"
            | "recipient_account_number"
            | "to_account_number"
            | "email"
            | "password"
            | "secret"
            | "token"
            | "api_token"
            | "authorization"
    )
}

fn mask_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.len() > 8 => {
            let visible = &s[..4];
            let end = &s[s.len() - 4..];
            Value::String(format!("{}****{}", visible, end))
        }
        _ => Value::String("****".to_string()),
    }
}
