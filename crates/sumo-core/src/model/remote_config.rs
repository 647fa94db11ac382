// ── Device configuration document ──
//
// `config.json` on the robot. Only the `wifis` object is touched; every
// other key is carried through unchanged and in its original order.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CoreError;

const WIFIS: &str = "wifis";
const INDENT: &[u8] = b"        ";

/// The parsed remote configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    root: Map<String, Value>,
}

impl RemoteConfig {
    /// Parse the raw document.
    ///
    /// The root must be an object with a `wifis` object member.
    pub fn parse(raw: &[u8]) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_slice(raw).map_err(|e| CoreError::ConfigFormat {
            reason: format!("not valid JSON: {e}"),
        })?;
        let Value::Object(root) = value else {
            return Err(CoreError::ConfigFormat {
                reason: "top level is not an object".into(),
            });
        };
        match root.get(WIFIS) {
            Some(Value::Object(_)) => Ok(Self { root }),
            Some(_) => Err(CoreError::ConfigFormat {
                reason: format!("'{WIFIS}' is not an object"),
            }),
            None => Err(CoreError::ConfigFormat {
                reason: format!("missing '{WIFIS}'"),
            }),
        }
    }

    /// Insert or overwrite the password for `ssid`.
    pub fn set_wifi(&mut self, ssid: &str, password: &str) {
        if let Some(Value::Object(wifis)) = self.root.get_mut(WIFIS) {
            wifis.insert(ssid.to_owned(), Value::String(password.to_owned()));
        }
    }

    /// Number of stored networks.
    pub fn wifi_count(&self) -> usize {
        self.root
            .get(WIFIS)
            .and_then(Value::as_object)
            .map_or(0, Map::len)
    }

    /// Serialize back to bytes (pretty-printed, eight-space indent).
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.root
            .serialize(&mut ser)
            .map_err(|e| CoreError::Internal(format!("config serialization: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
impl RemoteConfig {
    fn wifi(&self, ssid: &str) -> Option<&str> {
        self.root.get(WIFIS)?.get(ssid)?.as_str()
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    fn as_value(&self) -> Value {
        Value::Object(self.root.clone())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn inserts_into_empty_wifis() {
        let mut cfg = RemoteConfig::parse(br#"{"wifis": {}}"#).expect("parse");
        cfg.set_wifi("Home", "secret");
        assert_eq!(cfg.as_value(), json!({"wifis": {"Home": "secret"}}));
    }

    #[test]
    fn keeps_other_keys_and_order() {
        let raw = br#"{"status_led_pin": 5, "wifis": {"Office": "pw"}, "sumo_id": "xxxxxxxx"}"#;
        let mut cfg = RemoteConfig::parse(raw).expect("parse");
        cfg.set_wifi("Home", "secret");

        let keys: Vec<&str> = cfg.root.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["status_led_pin", "wifis", "sumo_id"]);
        assert_eq!(cfg.get("sumo_id"), Some(&json!("xxxxxxxx")));
        assert_eq!(cfg.wifi("Office"), Some("pw"));
        assert_eq!(cfg.wifi("Home"), Some("secret"));
    }

    #[test]
    fn reapplying_is_idempotent() {
        let mut once = RemoteConfig::parse(br#"{"wifis": {}, "a": [1, 2]}"#).expect("parse");
        once.set_wifi("Home", "secret");
        let mut twice = once.clone();
        twice.set_wifi("Home", "secret");
        assert_eq!(once.to_bytes().expect("ser"), twice.to_bytes().expect("ser"));
    }

    #[test]
    fn overwrites_existing_password() {
        let mut cfg = RemoteConfig::parse(br#"{"wifis": {"Home": "old"}}"#).expect("parse");
        cfg.set_wifi("Home", "new");
        assert_eq!(cfg.wifi("Home"), Some("new"));
        assert_eq!(cfg.wifi_count(), 1);
    }

    #[test]
    fn serializes_with_eight_space_indent() {
        let mut cfg = RemoteConfig::parse(br#"{"wifis": {}}"#).expect("parse");
        cfg.set_wifi("Office", "pw123");
        let text = String::from_utf8(cfg.to_bytes().expect("ser")).expect("utf8");
        assert_eq!(
            text,
            "{\n        \"wifis\": {\n                \"Office\": \"pw123\"\n        }\n}"
        );
    }

    #[test]
    fn rejects_malformed_documents() {
        for raw in [
            &b"not json"[..],
            b"[1, 2, 3]",
            br#"{"other": 1}"#,
            br#"{"wifis": ["Home"]}"#,
        ] {
            let err = RemoteConfig::parse(raw).expect_err("should fail");
            assert!(matches!(err, CoreError::ConfigFormat { .. }), "{err:?}");
        }
    }
}
