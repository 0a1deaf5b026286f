//! Ordered wire parameters of a control request.
//!
//! Values are percent-encoded as they are inserted, so the map always holds
//! exactly what goes on the wire. Insertion order is kept because both the
//! encoded body and the diagnostic rendering depend on it.

use super::keys::LS_REQ_ID;

/// Insertion-ordered mapping from wire key to percent-encoded value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    entries: Vec<(&'static str, String)>,
}

impl RequestParams {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Percent-encode `value` and store it under `key`.
    ///
    /// Re-inserting a key replaces its value in place, keeping the
    /// original position.
    pub(crate) fn insert(&mut self, key: &'static str, value: &str) {
        let encoded = urlencoding::encode(value).into_owned();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = encoded,
            None => self.entries.push((key, encoded)),
        }
    }

    /// Insert only when a value is present.
    pub(crate) fn insert_opt(&mut self, key: &'static str, value: Option<&str>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    /// Encoded value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Decoded value for `key`.
    pub fn get_decoded(&self, key: &str) -> Option<String> {
        let raw = self.get(key)?;
        urlencoding::decode(raw).ok().map(std::borrow::Cow::into_owned)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    /// `(key, encoded value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encode as a control request body: `LS_reqId=<id>&k1=v1&k2=v2...`.
    pub fn to_wire(&self, request_id: u64) -> String {
        let mut body = format!("{LS_REQ_ID}={request_id}");
        for (key, value) in &self.entries {
            body.push('&');
            body.push_str(key);
            body.push('=');
            body.push_str(value);
        }
        body
    }
}

impl std::fmt::Display for RequestParams {
    /// Space-delimited `key=value` sequence in insertion order.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::keys::{LS_GROUP, LS_OP, PN_TRIGGER};
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let mut params = RequestParams::new();
        params.insert(LS_OP, "activate");
        params.insert(LS_GROUP, "item1");
        params.insert(PN_TRIGGER, "x");

        let keys: Vec<_> = params.keys().collect();
        assert_eq!(keys, vec![LS_OP, LS_GROUP, PN_TRIGGER]);
        assert_eq!(params.to_string(), "LS_op=activate LS_group=item1 PN_trigger=x");
    }

    #[test]
    fn test_values_are_percent_encoded() {
        let mut params = RequestParams::new();
        params.insert(PN_TRIGGER, "Double.parseDouble(${last_price}) > 10.0");

        let encoded = params.get(PN_TRIGGER).expect("present");
        assert!(!encoded.contains(' '), "spaces must be encoded: {encoded}");
        assert!(!encoded.contains('$'), "'$' must be encoded: {encoded}");
        assert_eq!(
            params.get_decoded(PN_TRIGGER).as_deref(),
            Some("Double.parseDouble(${last_price}) > 10.0")
        );
    }

    #[test]
    fn test_reinsert_replaces_in_place() {
        let mut params = RequestParams::new();
        params.insert(LS_OP, "register");
        params.insert(LS_GROUP, "g");
        params.insert(LS_OP, "activate");

        assert_eq!(params.len(), 2);
        assert_eq!(params.to_string(), "LS_op=activate LS_group=g");
    }

    #[test]
    fn test_insert_opt_skips_none() {
        let mut params = RequestParams::new();
        params.insert_opt(LS_GROUP, None);
        assert!(params.is_empty());
        params.insert_opt(LS_GROUP, Some("g"));
        assert!(params.contains_key(LS_GROUP));
    }

    #[test]
    fn test_to_wire_prefixes_request_id() {
        let mut params = RequestParams::new();
        params.insert(LS_OP, "deactivate");
        params.insert(LS_GROUP, "a b");

        assert_eq!(params.to_wire(42), "LS_reqId=42&LS_op=deactivate&LS_group=a%20b");
        assert_eq!(RequestParams::new().to_wire(7), "LS_reqId=7");
    }
}
