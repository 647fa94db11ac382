// ── Device collaborators ──
//
// The orchestrator drives three external pieces it does not implement:
// OS port enumeration, the remote file channel spoken by the running
// MicroPython firmware, and the ROM bootloader used for flashing. All three
// are blocking, synchronous APIs; the workers move them onto the blocking
// pool and bound every call with a timeout.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::config::FlashParams;

/// Errors raised by collaborator implementations.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("cannot open {port}: {reason}")]
    PortUnavailable { port: String, reason: String },

    #[error("no chip detected on {port}: {reason}")]
    ChipNotFound { port: String, reason: String },

    #[error("flash write failed: {0}")]
    Flash(String),

    #[error("no such file: {0}")]
    FileNotFound(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("port enumeration failed: {0}")]
    Enumeration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One entry of the OS serial port list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortDescriptor {
    /// Device path (`/dev/ttyUSB0`, `COM3`).
    pub device_path: String,
    /// Hardware id in `VVVV:PPPP` form, empty for non-USB ports.
    pub vendor_id: String,
}

impl PortDescriptor {
    pub fn new(device_path: impl Into<String>, vendor_id: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
            vendor_id: vendor_id.into(),
        }
    }

    /// Whether the vendor id starts with any of `prefixes` (case-insensitive).
    pub fn matches_vendor<S: AsRef<str>>(&self, prefixes: &[S]) -> bool {
        let id = self.vendor_id.to_ascii_uppercase();
        prefixes
            .iter()
            .any(|p| id.starts_with(&p.as_ref().to_ascii_uppercase()))
    }
}

/// Pick the first port whose vendor id carries a managed prefix.
pub fn select_managed_port<'a, S: AsRef<str>>(
    ports: &'a [PortDescriptor],
    prefixes: &[S],
) -> Option<&'a PortDescriptor> {
    ports.iter().find(|p| p.matches_vendor(prefixes))
}

// ── Traits ───────────────────────────────────────────────────────────

/// Lists the serial ports currently known to the OS.
pub trait PortEnumerator: Send + Sync {
    fn list_ports(&self) -> Result<Vec<PortDescriptor>, DeviceError>;
}

/// An open connection that must be closed explicitly.
pub trait DeviceHandle: Send {
    /// Release the underlying port. Must be safe to call on a broken link.
    fn close(&mut self) -> Result<(), DeviceError>;
}

/// File access to the running application firmware.
pub trait RemoteFileChannel: DeviceHandle {
    fn get(&mut self, name: &str) -> Result<Vec<u8>, DeviceError>;

    /// Write `data` to `name`, replacing any existing file.
    fn put(&mut self, name: &str, data: &[u8]) -> Result<(), DeviceError>;

    /// SSIDs of the WiFi networks in range of the device.
    fn list_networks(&mut self) -> Result<Vec<String>, DeviceError>;
}

/// Opens the serial transport as a remote file channel.
pub trait SerialTransport: Send + Sync {
    fn open_channel(&self, port: &str) -> Result<Box<dyn RemoteFileChannel>, DeviceError>;
}

/// A bootloader session with a detected chip.
pub trait ChipSession: DeviceHandle {
    /// Human-readable chip description (e.g. `ESP32`).
    fn chip(&self) -> &str;

    /// Upload and start the flasher stub.
    fn run_stub(&mut self) -> Result<(), DeviceError>;

    fn change_baud(&mut self, baud: u32) -> Result<(), DeviceError>;

    /// Write `image` according to `params` (offset, geometry, verification).
    fn write_flash(&mut self, image: &[u8], params: &FlashParams) -> Result<(), DeviceError>;

    fn hard_reset(&mut self) -> Result<(), DeviceError>;
}

/// Puts the device into its ROM bootloader.
pub trait BootloaderFlasher: Send + Sync {
    fn detect(&self, port: &str) -> Result<Box<dyn ChipSession>, DeviceError>;
}

/// The full set of collaborators a [`Manager`](crate::Manager) drives.
#[derive(Clone)]
pub struct DeviceBackend {
    pub ports: Arc<dyn PortEnumerator>,
    pub transport: Arc<dyn SerialTransport>,
    pub flasher: Arc<dyn BootloaderFlasher>,
}

impl std::fmt::Debug for DeviceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBackend").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANAGED: [&str; 2] = ["1A86:", "10C4:"];

    #[test]
    fn selects_first_managed_port() {
        let ports = vec![
            PortDescriptor::new("/dev/ttyS0", ""),
            PortDescriptor::new("/dev/ttyACM0", "2341:0043"),
            PortDescriptor::new("/dev/ttyUSB0", "10C4:EA60"),
            PortDescriptor::new("/dev/ttyUSB1", "1A86:7523"),
        ];
        let port = select_managed_port(&ports, &MANAGED).expect("managed port");
        assert_eq!(port.device_path, "/dev/ttyUSB0");
    }

    #[test]
    fn vendor_match_ignores_case() {
        let port = PortDescriptor::new("COM3", "1a86:7523");
        assert!(port.matches_vendor(&MANAGED));
    }

    #[test]
    fn no_managed_port() {
        let ports = vec![PortDescriptor::new("/dev/ttyACM0", "2341:0043")];
        assert!(select_managed_port(&ports, &MANAGED).is_none());
    }
}
