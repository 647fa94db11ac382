//! SumoManager configuration.
//!
//! A TOML file in the platform config directory, overlaid with
//! `SUMO_`-prefixed environment variables (`SUMO_SERIAL__BAUD=9600`), and
//! translated to `sumo_core::ManagerConfig`. Every key has a default, so a
//! missing file is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use sumo_core::{
    DEFAULT_COMPANION_FILES, DEFAULT_INDEX_URL, DEFAULT_SOURCE_BASE_URL, DEFAULT_VENDOR_PREFIXES,
    DialogImages, FirmwareSource, FlashMode, FlashParams, ManagerConfig,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub timeouts: TimeoutSection,
    #[serde(default)]
    pub firmware: FirmwareSection,
    #[serde(default)]
    pub flash: FlashSection,
    #[serde(default)]
    pub serial: SerialSection,
    #[serde(default)]
    pub ui: UiSection,
}

/// Which device is managed and how often workers look at it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceSection {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// `VVVV:` or `VVVV:PPPP` prefixes of managed USB bridges.
    #[serde(default = "default_vendor_prefixes")]
    pub vendor_prefixes: Vec<String>,

    /// Configuration document on the device.
    #[serde(default = "default_config_file")]
    pub config_file: String,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            vendor_prefixes: default_vendor_prefixes(),
            config_file: default_config_file(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_vendor_prefixes() -> Vec<String> {
    DEFAULT_VENDOR_PREFIXES.iter().map(|s| (*s).to_owned()).collect()
}
fn default_config_file() -> String {
    "config.json".into()
}

/// Upper bounds on external calls, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimeoutSection {
    #[serde(default = "default_serial_secs")]
    pub serial: u64,
    #[serde(default = "default_flash_secs")]
    pub flash: u64,
    #[serde(default = "default_http_secs")]
    pub http: u64,
}

impl Default for TimeoutSection {
    fn default() -> Self {
        Self {
            serial: default_serial_secs(),
            flash: default_flash_secs(),
            http: default_http_secs(),
        }
    }
}

fn default_serial_secs() -> u64 {
    30
}
fn default_flash_secs() -> u64 {
    300
}
fn default_http_secs() -> u64 {
    60
}

/// Firmware distribution endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FirmwareSection {
    #[serde(default = "default_index_url")]
    pub index_url: String,
    #[serde(default = "default_source_base_url")]
    pub source_base_url: String,
    #[serde(default = "default_chip_marker")]
    pub chip_marker: String,
    #[serde(default = "default_companion_files")]
    pub companion_files: Vec<String>,
}

impl Default for FirmwareSection {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            source_base_url: default_source_base_url(),
            chip_marker: default_chip_marker(),
            companion_files: default_companion_files(),
        }
    }
}

fn default_index_url() -> String {
    DEFAULT_INDEX_URL.into()
}
fn default_source_base_url() -> String {
    DEFAULT_SOURCE_BASE_URL.into()
}
fn default_chip_marker() -> String {
    "firmware/esp32".into()
}
fn default_companion_files() -> Vec<String> {
    DEFAULT_COMPANION_FILES.iter().map(|s| (*s).to_owned()).collect()
}

/// Bootloader write parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FlashSection {
    #[serde(default = "default_flash_baud")]
    pub baud: u32,
    /// `4MB`, `2MB`, `512KB`, ...
    #[serde(default = "default_flash_size")]
    pub size: String,
    #[serde(default)]
    pub mode: FlashMode,
    #[serde(default = "default_flash_offset")]
    pub offset: u32,
    #[serde(default)]
    pub verify: bool,
}

impl Default for FlashSection {
    fn default() -> Self {
        Self {
            baud: default_flash_baud(),
            size: default_flash_size(),
            mode: FlashMode::default(),
            offset: default_flash_offset(),
            verify: false,
        }
    }
}

fn default_flash_baud() -> u32 {
    460_800
}
fn default_flash_size() -> String {
    "4MB".into()
}
fn default_flash_offset() -> u32 {
    0x1000
}

/// Serial link to MicroPython and the flasher program.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SerialSection {
    #[serde(default = "default_serial_baud")]
    pub baud: u32,
    /// Bound on a single REPL response, in seconds.
    #[serde(default = "default_response_timeout")]
    pub response_timeout: u64,
    /// Pause between opening the port and interrupting the board.
    #[serde(default = "default_raw_delay_ms")]
    pub raw_delay_ms: u64,
    #[serde(default = "default_esptool")]
    pub esptool: PathBuf,
    #[serde(default = "default_chip")]
    pub chip: String,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            baud: default_serial_baud(),
            response_timeout: default_response_timeout(),
            raw_delay_ms: default_raw_delay_ms(),
            esptool: default_esptool(),
            chip: default_chip(),
        }
    }
}

fn default_serial_baud() -> u32 {
    115_200
}
fn default_response_timeout() -> u64 {
    10
}
fn default_raw_delay_ms() -> u64 {
    500
}
fn default_esptool() -> PathBuf {
    "esptool.py".into()
}
fn default_chip() -> String {
    "esp32".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UiSection {
    /// Image shown once WiFi credentials are written.
    #[serde(default = "default_provisioned_image")]
    pub provisioned_image: Option<String>,
}

impl Default for UiSection {
    fn default() -> Self {
        Self {
            provisioned_image: default_provisioned_image(),
        }
    }
}

#[allow(clippy::unnecessary_wraps)]
fn default_provisioned_image() -> Option<String> {
    Some("res/blue_led.jpg".into())
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "robokoding", "sumomanager").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("sumomanager");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` + environment. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SUMO_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Validate and build the orchestrator configuration.
    pub fn to_manager_config(&self) -> Result<ManagerConfig, ConfigError> {
        if self.device.poll_interval_ms == 0 {
            return Err(invalid("device.poll_interval_ms", "must be greater than zero"));
        }
        if self.device.vendor_prefixes.iter().all(|p| p.trim().is_empty()) {
            return Err(invalid("device.vendor_prefixes", "at least one prefix is required"));
        }
        if self.firmware.chip_marker.is_empty() {
            return Err(invalid("firmware.chip_marker", "must not be empty"));
        }

        let index_url = parse_url("firmware.index_url", &self.firmware.index_url)?;
        let mut source_base_url =
            parse_url("firmware.source_base_url", &self.firmware.source_base_url)?;
        // Companion names are joined onto the base; without the slash the
        // last path segment would be replaced.
        if !source_base_url.path().ends_with('/') {
            let path = format!("{}/", source_base_url.path());
            source_base_url.set_path(&path);
        }

        Ok(ManagerConfig {
            poll_interval: Duration::from_millis(self.device.poll_interval_ms),
            serial_timeout: Duration::from_secs(self.timeouts.serial),
            flash_timeout: Duration::from_secs(self.timeouts.flash),
            http_timeout: Duration::from_secs(self.timeouts.http),
            vendor_prefixes: self
                .device
                .vendor_prefixes
                .iter()
                .map(|p| p.trim().to_uppercase())
                .filter(|p| !p.is_empty())
                .collect(),
            config_file: self.device.config_file.clone(),
            firmware: FirmwareSource {
                index_url,
                source_base_url,
                chip_marker: self.firmware.chip_marker.clone(),
                companion_files: self.firmware.companion_files.clone(),
            },
            flash: FlashParams {
                baud: self.flash.baud,
                flash_size: parse_flash_size(&self.flash.size)?,
                flash_mode: self.flash.mode,
                offset: self.flash.offset,
                verify: self.flash.verify,
            },
            images: DialogImages {
                provisioned: self.ui.provisioned_image.clone(),
            },
        })
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse()
        .map_err(|e| invalid(field, format!("invalid URL '{raw}': {e}")))
}

/// `4MB` → 4194304, `512KB` → 524288.
pub fn parse_flash_size(raw: &str) -> Result<u32, ConfigError> {
    let upper = raw.trim().to_uppercase();
    let (digits, unit) = if let Some(n) = upper.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = upper.strip_suffix("KB") {
        (n, 1024)
    } else {
        return Err(invalid("flash.size", format!("expected e.g. '4MB', got '{raw}'")));
    };
    digits
        .trim()
        .parse::<u32>()
        .ok()
        .and_then(|n| n.checked_mul(unit))
        .filter(|n| *n > 0)
        .ok_or_else(|| invalid("flash.size", format!("expected e.g. '4MB', got '{raw}'")))
}
