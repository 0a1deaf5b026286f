//! Nested key/value builders for `PN_notificationFormat`.
//!
//! A notification format is a JSON object the server fills with item
//! values before forwarding it to the push service. Fields are addressed by
//! a dotted path to their parent object plus a key, e.g. path
//! `"webpush.notification"` and key `"title"`.

use serde_json::{Map, Value};

/// JSON object edited through dotted paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationFormat {
    root: Map<String, Value>,
}

impl NotificationFormat {
    /// Empty format (`{}`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an existing format. Anything but a JSON object is rejected.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(root) => Ok(Self { root }),
            other => anyhow::bail!("notification format must be a JSON object, got {other}"),
        }
    }

    /// Set `key` under the object at `path`, creating objects as needed.
    ///
    /// `None` removes the key instead; nothing is created in that case and
    /// no `null` is ever stored. A non-object met along the path is
    /// replaced by an object when setting.
    pub fn set(&mut self, path: &str, key: &str, value: Option<Value>) {
        match value {
            Some(Value::Null) | None => {
                if let Some(parent) = self.object_at_mut(path) {
                    parent.remove(key);
                }
            }
            Some(value) => {
                if let Some(parent) = self.object_at_or_insert(path) {
                    parent.insert(key.to_string(), value);
                }
            }
        }
    }

    /// Read `key` under the object at `path`.
    pub fn get(&self, path: &str, key: &str) -> Option<&Value> {
        let mut current = &self.root;
        for segment in segments(path) {
            current = current.get(segment)?.as_object()?;
        }
        current.get(key)
    }

    /// Read a string field.
    pub fn get_str(&self, path: &str, key: &str) -> Option<&str> {
        self.get(path, key).and_then(Value::as_str)
    }

    /// Compact JSON, as sent in `PN_notificationFormat`.
    pub fn to_json(&self) -> String {
        Value::Object(self.root.clone()).to_string()
    }

    fn object_at_mut(&mut self, path: &str) -> Option<&mut Map<String, Value>> {
        let mut current = &mut self.root;
        for segment in segments(path) {
            current = current.get_mut(segment)?.as_object_mut()?;
        }
        Some(current)
    }

    /// Object at `path`, creating or replacing non-objects along the way.
    fn object_at_or_insert(&mut self, path: &str) -> Option<&mut Map<String, Value>> {
        let mut current = &mut self.root;
        for segment in segments(path) {
            let slot = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            current = slot.as_object_mut()?;
        }
        Some(current)
    }
}

impl std::fmt::Display for NotificationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_json())
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

const WEBPUSH_NOTIFICATION: &str = "webpush.notification";
const WEBPUSH_DATA: &str = "webpush.data";

/// Web push notification format.
///
/// Visible fields live under `webpush.notification`; custom key/value
/// pairs for the service worker under `webpush.data`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebPushFormat {
    format: NotificationFormat,
}

impl WebPushFormat {
    /// Empty web push format.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notification title. `None` clears it.
    #[must_use]
    pub fn title(mut self, title: Option<&str>) -> Self {
        self.set_text("title", title);
        self
    }

    /// Notification body. `None` clears it.
    #[must_use]
    pub fn body(mut self, body: Option<&str>) -> Self {
        self.set_text("body", body);
        self
    }

    /// Icon URL. `None` clears it.
    #[must_use]
    pub fn icon(mut self, icon: Option<&str>) -> Self {
        self.set_text("icon", icon);
        self
    }

    /// Custom data entry. `None` clears it.
    #[must_use]
    pub fn data(mut self, key: &str, value: Option<&str>) -> Self {
        self.format
            .set(WEBPUSH_DATA, key, value.map(|v| Value::String(v.to_string())));
        self
    }

    fn set_text(&mut self, key: &str, value: Option<&str>) {
        self.format
            .set(WEBPUSH_NOTIFICATION, key, value.map(|v| Value::String(v.to_string())));
    }

    /// Current title.
    pub fn get_title(&self) -> Option<&str> {
        self.format.get_str(WEBPUSH_NOTIFICATION, "title")
    }

    /// Underlying format.
    pub fn format(&self) -> &NotificationFormat {
        &self.format
    }

    /// Compact JSON.
    pub fn to_json(&self) -> String {
        self.format.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_then_get_through_dotted_path() {
        let mut format = NotificationFormat::new();
        format.set("webpush.notification", "title", Some(json!("hello")));

        assert_eq!(format.get_str("webpush.notification", "title"), Some("hello"));
        assert_eq!(
            format.to_json(),
            r#"{"webpush":{"notification":{"title":"hello"}}}"#
        );
    }

    #[test]
    fn test_clearing_removes_key_instead_of_null() {
        let mut format = NotificationFormat::new();
        format.set("webpush.notification", "title", Some(json!("hello")));
        format.set("webpush.notification", "title", None);

        assert_eq!(format.get("webpush.notification", "title"), None);
        assert!(!format.to_json().contains("null"), "got {}", format.to_json());
    }

    #[test]
    fn test_explicit_null_also_removes() {
        let mut format = NotificationFormat::new();
        format.set("a", "k", Some(json!(1)));
        format.set("a", "k", Some(Value::Null));
        assert_eq!(format.to_json(), r#"{"a":{}}"#);
    }

    #[test]
    fn test_clearing_missing_path_creates_nothing() {
        let mut format = NotificationFormat::new();
        format.set("webpush.notification", "title", None);
        assert_eq!(format.to_json(), "{}");
    }

    #[test]
    fn test_scalar_on_path_is_replaced() {
        let mut format = NotificationFormat::from_json(r#"{"webpush":"x"}"#).expect("object");
        format.set("webpush.notification", "body", Some(json!("b")));
        assert_eq!(format.get_str("webpush.notification", "body"), Some("b"));
    }

    #[test]
    fn test_nested_scalars_are_replaced_at_every_level() {
        let mut format =
            NotificationFormat::from_json(r#"{"a":{"b":7},"keep":true}"#).expect("object");
        format.set("a.b.c", "k", Some(json!("v")));

        assert_eq!(format.get_str("a.b.c", "k"), Some("v"));
        assert_eq!(format.get("", "keep"), Some(&json!(true)));
    }

    #[test]
    fn test_empty_path_targets_root() {
        let mut format = NotificationFormat::new();
        format.set("", "priority", Some(json!("high")));
        assert_eq!(format.get_str("", "priority"), Some("high"));
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        assert!(NotificationFormat::from_json("[1,2]").is_err());
        assert!(NotificationFormat::from_json("not json").is_err());
    }

    #[test]
    fn test_webpush_builder() {
        let format = WebPushFormat::new()
            .title(Some("Score"))
            .body(Some("${home} - ${away}"))
            .data("match", Some("42"))
            .icon(Some("/icon.png"))
            .icon(None);

        assert_eq!(format.get_title(), Some("Score"));
        assert_eq!(format.format().get_str("webpush.data", "match"), Some("42"));
        assert_eq!(format.format().get("webpush.notification", "icon"), None);
    }
}
