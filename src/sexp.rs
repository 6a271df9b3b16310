//! s-expression helpers shared by status output and the frame script reader.

use lexpr::Value;

/// Format an event s-expression.
pub fn format_event(event_type: &str, fields: &[(&str, &str)]) -> String {
    let mut s = format!("(:type :event :event :{}", event_type);
    for (key, val) in fields {
        s.push_str(&format!(" :{} {}", key, val));
    }
    s.push(')');
    s
}

/// Escape a string for s-expression output.
pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Find the value following `:key` in a plist.
/// Handles both `Value::Keyword("key")` (elisp parser) and
/// `Value::Symbol(":key")` (default parser) forms.
pub fn get_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let prefixed = format!(":{}", key);
    let mut current = value;
    while let Value::Cons(pair) = current {
        let is_key = match pair.car() {
            Value::Keyword(k) => k.as_ref() == key,
            Value::Symbol(s) => s.as_ref() == prefixed,
            _ => false,
        };
        if is_key {
            return match pair.cdr() {
                Value::Cons(next) => Some(next.car()),
                _ => None,
            };
        }
        current = pair.cdr();
    }
    None
}

/// Extract a plist value as a string.
pub fn get_keyword(value: &Value, key: &str) -> Option<String> {
    let val = get_value(value, key)?;
    Some(match val {
        Value::Keyword(v) => v.to_string(),
        Value::Symbol(v) => {
            let s = v.to_string();
            s.strip_prefix(':').unwrap_or(&s).to_string()
        }
        Value::String(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => (if *b { "t" } else { "nil" }).to_string(),
        Value::Null | Value::Nil => "nil".to_string(),
        _ => val.to_string(),
    })
}

/// Extract an unsigned integer value from a plist.
pub fn get_uint(value: &Value, key: &str) -> Option<u64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Extract a boolean value from a plist.  Treats "nil" as false.
pub fn get_bool(value: &Value, key: &str) -> Option<bool> {
    get_keyword(value, key).map(|s| s != "nil")
}

/// Extract a floating-point value from a plist.
pub fn get_float(value: &Value, key: &str) -> Option<f64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Top-level elements of a proper list.  `nil` and `()` yield no elements.
pub fn list_items(value: &Value) -> Vec<&Value> {
    let mut items = Vec::new();
    let mut current = value;
    while let Value::Cons(pair) = current {
        items.push(pair.car());
        current = pair.cdr();
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_event() {
        let s = format_event("slot-rebound", &[("slot", "2"), ("body", "7")]);
        assert_eq!(s, "(:type :event :event :slot-rebound :slot 2 :body 7)");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string(r#"a"b\c"#), r#"a\"b\\c"#);
    }

    #[test]
    fn test_plist_accessors() {
        let v = lexpr::from_str(r#"(:frame 3 :gesture "SwipeUp" :detected t :confidence 0.6 :lost nil)"#)
            .unwrap();
        assert_eq!(get_uint(&v, "frame"), Some(3));
        assert_eq!(get_keyword(&v, "gesture").as_deref(), Some("SwipeUp"));
        assert_eq!(get_bool(&v, "detected"), Some(true));
        assert_eq!(get_bool(&v, "lost"), Some(false));
        assert_eq!(get_float(&v, "confidence"), Some(0.6));
        assert!(get_value(&v, "missing").is_none());
    }

    #[test]
    fn test_list_items() {
        let v = lexpr::from_str("(:bodies (5 0 7))").unwrap();
        let bodies = get_value(&v, "bodies").unwrap();
        let items: Vec<String> = list_items(bodies).iter().map(|v| v.to_string()).collect();
        assert_eq!(items, vec!["5", "0", "7"]);
    }
}
