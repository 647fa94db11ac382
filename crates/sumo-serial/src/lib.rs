//! Concrete device collaborators for `sumo-core`.
//!
//! - [`SystemPorts`] lists OS serial ports via `serialport`.
//! - [`RawReplTransport`] opens a port and drives the MicroPython raw REPL,
//!   exposing it as a remote file channel ([`RawReplChannel`]).
//! - [`EsptoolFlasher`] talks to the ROM bootloader through `esptool.py`.
//!
//! [`system_backend`] wires all three into a [`DeviceBackend`].

pub mod esptool;
pub mod ports;
pub mod repl;
pub mod transport;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sumo_core::DeviceBackend;

pub use esptool::{EsptoolFlasher, EsptoolSession};
pub use ports::SystemPorts;
pub use repl::{ExecOutput, RawRepl, RawReplChannel};
pub use transport::RawReplTransport;

/// Link and flasher settings for the real hardware.
#[derive(Debug, Clone)]
pub struct SerialOptions {
    /// REPL baud rate.
    pub baud: u32,
    /// Bound on a single REPL response.
    pub timeout: Duration,
    /// Pause after opening the port before the REPL is interrupted.
    pub raw_delay: Duration,
    pub esptool: PathBuf,
    pub chip: String,
}

impl Default for SerialOptions {
    fn default() -> Self {
        let transport = RawReplTransport::default();
        let flasher = EsptoolFlasher::default();
        Self {
            baud: transport.baud,
            timeout: transport.timeout,
            raw_delay: transport.raw_delay,
            esptool: flasher.program,
            chip: flasher.chip,
        }
    }
}

/// Backend driving real serial ports and `esptool`.
pub fn system_backend(options: &SerialOptions) -> DeviceBackend {
    DeviceBackend {
        ports: Arc::new(SystemPorts),
        transport: Arc::new(RawReplTransport {
            baud: options.baud,
            timeout: options.timeout,
            raw_delay: options.raw_delay,
        }),
        flasher: Arc::new(EsptoolFlasher {
            program: options.esptool.clone(),
            chip: options.chip.clone(),
        }),
    }
}
