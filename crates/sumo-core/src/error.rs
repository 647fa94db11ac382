// ── Core error types ──
//
// User-facing errors from sumo-core. Consumers never see HTTP status codes
// or raw serial failures directly: the `From` impls translate collaborator
// and transport-layer errors into domain-appropriate variants.

use thiserror::Error;

use crate::device::DeviceError;
use crate::session::UpdateKind;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device errors ────────────────────────────────────────────────
    #[error("Serial port {port} is unavailable: {reason}")]
    PortUnavailable { port: String, reason: String },

    #[error("No bootloader answered on {port}: {reason}")]
    ChipNotFound { port: String, reason: String },

    #[error("Flashing failed: {reason}")]
    Flash { reason: String },

    #[error("Serial transport failed: {reason}")]
    Transport { reason: String },

    #[error("File not found on device: {name}")]
    FileNotFound { name: String },

    #[error("{operation} timed out after {timeout_secs}s")]
    Timeout {
        operation: &'static str,
        timeout_secs: u64,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device configuration is malformed: {reason}")]
    ConfigFormat { reason: String },

    // ── Firmware distribution errors ─────────────────────────────────
    #[error("Could not resolve the firmware binary: {reason}")]
    FirmwareResolution { reason: String },

    #[error("Download failed: {reason}")]
    NetworkFetch { reason: String },

    // ── Request errors ───────────────────────────────────────────────
    #[error("No SumoRobot connected")]
    NotConnected,

    #[error("A {kind} is already in progress")]
    UpdateInProgress { kind: UpdateKind },

    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// An extra operator hint specific to this failure, appended to the
    /// workflow's generic remediation list.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::PortUnavailable { .. } => Some("Close other programs using the serial port"),
            Self::ChipNotFound { .. } => {
                Some("Hold the BOOT button while the update starts if the board does not respond")
            }
            Self::Timeout { .. } => Some("Check the USB cable and try a different USB port"),
            Self::FirmwareResolution { .. } => {
                Some("Check the firmware index URL in the configuration")
            }
            Self::NetworkFetch { .. } => Some("Check your Internet connection"),
            _ => None,
        }
    }

    /// Returns `true` for request-boundary rejections (nothing was started).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::UpdateInProgress { .. } | Self::Validation { .. }
        )
    }
}

// ── Conversion from collaborator errors ──────────────────────────────

impl From<DeviceError> for CoreError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::PortUnavailable { port, reason } => Self::PortUnavailable { port, reason },
            DeviceError::ChipNotFound { port, reason } => Self::ChipNotFound { port, reason },
            DeviceError::Flash(reason) => Self::Flash { reason },
            DeviceError::FileNotFound(name) => Self::FileNotFound { name },
            DeviceError::Protocol(reason) | DeviceError::Enumeration(reason) => {
                Self::Transport { reason }
            }
            DeviceError::Io(e) => Self::Transport {
                reason: e.to_string(),
            },
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<sumo_api::Error> for CoreError {
    fn from(err: sumo_api::Error) -> Self {
        if err.is_resolution() {
            Self::FirmwareResolution {
                reason: err.to_string(),
            }
        } else {
            match err {
                sumo_api::Error::Client(message) => Self::Config { message },
                sumo_api::Error::InvalidUrl(e) => Self::FirmwareResolution {
                    reason: format!("invalid firmware link: {e}"),
                },
                other => Self::NetworkFetch {
                    reason: other.to_string(),
                },
            }
        }
    }
}
