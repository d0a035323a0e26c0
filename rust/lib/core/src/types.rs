use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Paging, ordering, and validity window for list operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListParams {
    /// Maximum number of results to return. None = no limit.
    #[serde(default)]
    pub limit: Option<usize>,

    /// Number of matching results to skip.
    #[serde(default)]
    pub offset: usize,

    /// Sort field, optionally followed by ` desc`.
    #[serde(default)]
    pub sort: Option<String>,

    /// Evaluate validity at this instant instead of now.
    #[serde(default)]
    pub valid_at: Option<DateTime<Utc>>,
}

impl ListParams {
    /// Split `sort` into (field, descending).
    pub fn sort_key(&self) -> Option<(&str, bool)> {
        let raw = self.sort.as_deref()?.trim();
        let mut parts = raw.split_whitespace();
        let field = parts.next()?;
        let descending = parts.next().is_some_and(|d| d.eq_ignore_ascii_case("desc"));
        Some((field, descending))
    }
}

/// Result wrapper for list operations. `total` counts matches before paging.
#[derive(Debug, Clone, Serialize)]
pub struct ListResult<T: Serialize> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Generate a new random ID (UUIDv4, no dashes).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string().replace('-', "")
}

/// Get the current time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Whether an entity with the given `valid_until` marker is still live at `at`.
///
/// Absent marker → live. A marker that does not parse as RFC 3339 counts as
/// expired, so a corrupted value hides the entity instead of exposing it.
pub fn is_valid_at(valid_until: Option<&str>, at: &DateTime<Utc>) -> bool {
    match valid_until {
        None => true,
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(until) => until.with_timezone(&Utc) > *at,
            Err(_) => false,
        },
    }
}

/// Apply client-supplied top-level keys onto a stored JSON object.
///
/// Keys for which `is_protected` returns true are left untouched and
/// returned so the caller can report them. A `null` value removes the key;
/// nested objects are merged per RFC 7386.
pub fn merge_fields(
    base: &mut serde_json::Value,
    patch: &serde_json::Value,
    is_protected: impl Fn(&str) -> bool,
) -> Vec<String> {
    let mut skipped = Vec::new();
    let (Some(base_obj), Some(patch_obj)) = (base.as_object_mut(), patch.as_object()) else {
        return skipped;
    };

    for (key, value) in patch_obj {
        if is_protected(key) {
            skipped.push(key.clone());
            continue;
        }
        if value.is_null() {
            base_obj.remove(key);
        } else if value.is_object() {
            let entry = base_obj
                .entry(key.clone())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            merge_patch(entry, value);
        } else {
            base_obj.insert(key.clone(), value.clone());
        }
    }
    skipped
}

fn merge_patch(base: &mut serde_json::Value, patch: &serde_json::Value) {
    if let (Some(base_obj), Some(patch_obj)) = (base.as_object_mut(), patch.as_object()) {
        for (key, value) in patch_obj {
            if value.is_null() {
                base_obj.remove(key);
            } else if value.is_object() {
                let entry = base_obj
                    .entry(key.clone())
                    .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
                merge_patch(entry, value);
            } else {
                base_obj.insert(key.clone(), value.clone());
            }
        }
    } else {
        *base = patch.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_id() {
        let id = new_id();
        assert_eq!(id.len(), 32);
        assert!(!id.contains('-'));
    }

    #[test]
    fn test_sort_key() {
        let mut params = ListParams::default();
        assert_eq!(params.sort_key(), None);
        params.sort = Some("title".into());
        assert_eq!(params.sort_key(), Some(("title", false)));
        params.sort = Some("updated_at DESC".into());
        assert_eq!(params.sort_key(), Some(("updated_at", true)));
    }

    #[test]
    fn test_validity_marker() {
        let now = Utc::now();
        let past = (now - Duration::hours(1)).to_rfc3339();
        let future = (now + Duration::hours(1)).to_rfc3339();

        assert!(is_valid_at(None, &now));
        assert!(is_valid_at(Some(&future), &now));
        assert!(!is_valid_at(Some(&past), &now));
        assert!(!is_valid_at(Some(&now.to_rfc3339()), &now));
        assert!(!is_valid_at(Some("not a date"), &now));
    }

    #[test]
    fn test_merge_fields_skips_protected() {
        let mut base = serde_json::json!({"id": "t1", "owner": "a", "title": "old", "meta": {"x": 1}});
        let patch = serde_json::json!({
            "owner": "mallory",
            "title": "new",
            "meta": {"y": 2},
            "gone": null,
        });
        let skipped = merge_fields(&mut base, &patch, |k| k == "owner");

        assert_eq!(skipped, vec!["owner".to_string()]);
        assert_eq!(
            base,
            serde_json::json!({"id": "t1", "owner": "a", "title": "new", "meta": {"x": 1, "y": 2}})
        );
    }
}
