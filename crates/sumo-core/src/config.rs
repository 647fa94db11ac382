// ── Runtime orchestrator configuration ──
//
// These types describe how the workers poll, how long each external call
// may block, and where firmware comes from. They never touch disk: the
// CLI builds a `ManagerConfig` (usually via `sumo-config`) and hands it in.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// USB-serial bridges the SumoRobot ships with (CH340 and CP210x).
pub const DEFAULT_VENDOR_PREFIXES: [&str; 2] = ["1A86:", "10C4:"];

/// Application sources uploaded after flashing, in upload order.
pub const DEFAULT_COMPANION_FILES: [&str; 5] =
    ["uwebsockets.py", "config.json", "hal.py", "main.py", "boot.py"];

pub const DEFAULT_INDEX_URL: &str = "http://micropython.org/download";
pub const DEFAULT_SOURCE_BASE_URL: &str =
    "https://raw.githubusercontent.com/robokoding/sumorobot-firmware/master/";

/// Where firmware comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareSource {
    /// Page scraped for the binary link.
    pub index_url: Url,
    /// Directory companion files are fetched from.
    pub source_base_url: Url,
    /// Substring identifying the chip family's binary link on the index page.
    pub chip_marker: String,
    /// Companion files, fetched and uploaded in this order.
    pub companion_files: Vec<String>,
}

impl Default for FirmwareSource {
    fn default() -> Self {
        Self {
            index_url: Url::parse(DEFAULT_INDEX_URL).expect("static index URL"),
            source_base_url: Url::parse(DEFAULT_SOURCE_BASE_URL).expect("static source URL"),
            chip_marker: "firmware/esp32".into(),
            companion_files: DEFAULT_COMPANION_FILES.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// SPI flash write mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FlashMode {
    Qio,
    Qout,
    #[default]
    Dio,
    Dout,
}

/// Bootloader flashing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashParams {
    /// Baud rate negotiated after the stub is running.
    pub baud: u32,
    /// Flash size in bytes.
    pub flash_size: u32,
    pub flash_mode: FlashMode,
    /// Address the image is written to.
    pub offset: u32,
    /// Read back and compare after writing.
    pub verify: bool,
}

impl FlashParams {
    /// Flash size in the `4MB` notation bootloader tools use.
    pub fn flash_size_label(&self) -> String {
        const MIB: u32 = 1024 * 1024;
        if self.flash_size % MIB == 0 {
            format!("{}MB", self.flash_size / MIB)
        } else {
            format!("{}KB", self.flash_size / 1024)
        }
    }
}

impl Default for FlashParams {
    fn default() -> Self {
        Self {
            baud: 460_800,
            flash_size: 4 * 1024 * 1024,
            flash_mode: FlashMode::Dio,
            offset: 0x1000,
            verify: false,
        }
    }
}

/// Image references attached to dialogs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DialogImages {
    /// Shown after WiFi credentials were provisioned (the steady blue LED).
    pub provisioned: Option<String>,
}

/// Configuration for the device session orchestrator.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Delay between worker iterations.
    pub poll_interval: Duration,
    /// Bound on each serial call (open, get, put, scan, close).
    pub serial_timeout: Duration,
    /// Bound on each bootloader step; writing 1 MB at 460800 baud takes a while.
    pub flash_timeout: Duration,
    /// Bound on each HTTP request.
    pub http_timeout: Duration,
    /// Vendor id prefixes identifying the managed device.
    pub vendor_prefixes: Vec<String>,
    /// Name of the configuration document on the device.
    pub config_file: String,
    pub firmware: FirmwareSource,
    pub flash: FlashParams,
    pub images: DialogImages,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            serial_timeout: Duration::from_secs(30),
            flash_timeout: Duration::from_secs(300),
            http_timeout: Duration::from_secs(60),
            vendor_prefixes: DEFAULT_VENDOR_PREFIXES
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            config_file: "config.json".into(),
            firmware: FirmwareSource::default(),
            flash: FlashParams::default(),
            images: DialogImages {
                provisioned: Some("res/blue_led.jpg".into()),
            },
        }
    }
}
