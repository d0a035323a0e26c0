use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tenancy_core::is_valid_at;

/// A filter over JSON documents.
///
/// Field names address top-level keys of the document object. `Any` descends
/// into an array of objects (participants, ACL entries) and matches when at
/// least one element satisfies the nested predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Matches every document.
    True,

    /// `doc[field] == value`.
    Eq { field: String, value: Value },

    /// Case-insensitive string equality.
    EqIgnoreCase { field: String, value: String },

    /// `doc[field]` is one of `values`.
    In { field: String, values: Vec<Value> },

    /// `doc[field]` is an array containing `value`.
    Contains { field: String, value: Value },

    /// `doc[field]` is an array with at least one element matching `predicate`.
    Any { field: String, predicate: Box<Predicate> },

    /// `doc[field]` is absent, null, or an RFC 3339 instant later than `at`.
    ValidAt { field: String, at: DateTime<Utc> },

    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn eq_ignore_case(field: &str, value: &str) -> Self {
        Predicate::EqIgnoreCase {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// Membership test against a set of string values.
    pub fn in_strings<I, S>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Predicate::In {
            field: field.to_string(),
            values: values.into_iter().map(|v| Value::String(v.into())).collect(),
        }
    }

    pub fn contains(field: &str, value: impl Into<Value>) -> Self {
        Predicate::Contains {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn any(field: &str, predicate: Predicate) -> Self {
        Predicate::Any {
            field: field.to_string(),
            predicate: Box::new(predicate),
        }
    }

    pub fn valid_at(field: &str, at: DateTime<Utc>) -> Self {
        Predicate::ValidAt {
            field: field.to_string(),
            at,
        }
    }

    pub fn negate(predicate: Predicate) -> Self {
        Predicate::Not(Box::new(predicate))
    }

    /// Evaluate against a document. Non-object documents never match a
    /// field test.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Predicate::True => true,
            Predicate::Eq { field, value } => doc.get(field) == Some(value),
            Predicate::EqIgnoreCase { field, value } => doc
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| s.to_lowercase() == value.to_lowercase()),
            Predicate::In { field, values } => {
                doc.get(field).is_some_and(|v| values.contains(v))
            }
            Predicate::Contains { field, value } => doc
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
            Predicate::Any { field, predicate } => doc
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.iter().any(|item| predicate.matches(item))),
            Predicate::ValidAt { field, at } => match doc.get(field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => is_valid_at(Some(s), at),
                Some(_) => false,
            },
            Predicate::And(parts) => parts.iter().all(|p| p.matches(doc)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(doc)),
            Predicate::Not(inner) => !inner.matches(doc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn task() -> Value {
        json!({
            "id": "t1",
            "type": "task",
            "owner": "alice",
            "participants": [{"id": "bob", "name": "Bob"}],
            "permissions": [{"subject": "carol", "level": "read"}],
            "tags": ["urgent", "q3"],
            "email": "Alice@Example.com",
        })
    }

    #[test]
    fn field_tests() {
        let doc = task();
        assert!(Predicate::eq("type", "task").matches(&doc));
        assert!(!Predicate::eq("type", "contact").matches(&doc));
        assert!(Predicate::eq_ignore_case("email", "alice@example.COM").matches(&doc));
        assert!(Predicate::in_strings("owner", ["bob", "alice"]).matches(&doc));
        assert!(!Predicate::in_strings("owner", Vec::<String>::new()).matches(&doc));
        assert!(Predicate::contains("tags", "q3").matches(&doc));
        assert!(!Predicate::contains("owner", "alice").matches(&doc));
        assert!(!Predicate::eq("missing", "x").matches(&doc));
    }

    #[test]
    fn any_descends_into_objects() {
        let doc = task();
        assert!(Predicate::any("participants", Predicate::eq("id", "bob")).matches(&doc));
        assert!(!Predicate::any("participants", Predicate::eq("id", "carol")).matches(&doc));
        assert!(Predicate::any("permissions", Predicate::eq("subject", "carol")).matches(&doc));
    }

    #[test]
    fn validity() {
        let now = Utc::now();
        let live = json!({"id": "a"});
        let null_marker = json!({"id": "a", "valid_until": null});
        let expired = json!({"id": "a", "valid_until": (now - Duration::minutes(5)).to_rfc3339()});
        let later = json!({"id": "a", "valid_until": (now + Duration::minutes(5)).to_rfc3339()});

        let p = Predicate::valid_at("valid_until", now);
        assert!(p.matches(&live));
        assert!(p.matches(&null_marker));
        assert!(!p.matches(&expired));
        assert!(p.matches(&later));
    }

    #[test]
    fn combinators() {
        let doc = task();
        let p = Predicate::And(vec![
            Predicate::eq("type", "task"),
            Predicate::Or(vec![
                Predicate::eq("owner", "zed"),
                Predicate::any("participants", Predicate::eq("id", "bob")),
            ]),
        ]);
        assert!(p.matches(&doc));
        assert!(!Predicate::negate(p).matches(&doc));
        assert!(Predicate::And(vec![]).matches(&doc));
        assert!(!Predicate::Or(vec![]).matches(&doc));
    }

    #[test]
    fn serializes_with_op_tag() {
        let p = Predicate::eq("type", "task");
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v, json!({"op": "eq", "field": "type", "value": "task"}));
        let back: Predicate = serde_json::from_value(v).unwrap();
        assert_eq!(back, p);
    }
}
