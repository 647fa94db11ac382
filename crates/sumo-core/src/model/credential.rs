use secrecy::{ExposeSecret, SecretString};

use crate::error::CoreError;

/// Text shown in the network picker before any network was loaded.
pub const SSID_PLACEHOLDER: &str = "Network name";

/// A WiFi network name and its password.
///
/// Transient: written into the device configuration and then dropped. The
/// password is never logged.
#[derive(Debug, Clone)]
pub struct WifiCredential {
    pub ssid: String,
    pub password: SecretString,
}

impl WifiCredential {
    /// Validate and build a credential.
    ///
    /// Rejects an empty or placeholder network name and an empty password.
    pub fn new(ssid: impl Into<String>, password: SecretString) -> Result<Self, CoreError> {
        let ssid = ssid.into();
        if ssid.trim().is_empty() || ssid == SSID_PLACEHOLDER {
            return Err(CoreError::Validation {
                field: "ssid".into(),
                reason: "select a WiFi network".into(),
            });
        }
        if password.expose_secret().is_empty() {
            return Err(CoreError::Validation {
                field: "password".into(),
                reason: "password must not be empty".into(),
            });
        }
        Ok(Self { ssid, password })
    }
}
