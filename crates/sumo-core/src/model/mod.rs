// ── Domain model ──

pub mod credential;
pub mod firmware;
pub mod notification;
pub mod remote_config;

pub use credential::{SSID_PLACEHOLDER, WifiCredential};
pub use firmware::FirmwareAssets;
pub use notification::{Dialog, Notification, PortEvent, Severity};
pub use remote_config::RemoteConfig;
