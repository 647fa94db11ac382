use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, StopBits};
use sumo_core::{DeviceError, RemoteFileChannel, SerialTransport};
use tracing::debug;

use crate::repl::{RawRepl, RawReplChannel};

/// How long a single port read blocks before the REPL re-checks its deadline.
const READ_POLL: Duration = Duration::from_millis(100);

/// Opens a serial port and puts the MicroPython REPL into raw mode.
///
/// Opening the port toggles DTR/RTS, which resets most ESP32 boards; the
/// `raw_delay` gives the firmware time to boot before it is interrupted.
#[derive(Debug, Clone)]
pub struct RawReplTransport {
    pub baud: u32,
    /// Bound on waiting for any single REPL response.
    pub timeout: Duration,
    pub raw_delay: Duration,
}

impl Default for RawReplTransport {
    fn default() -> Self {
        Self {
            baud: 115_200,
            timeout: Duration::from_secs(10),
            raw_delay: Duration::from_millis(500),
        }
    }
}

impl SerialTransport for RawReplTransport {
    fn open_channel(&self, port: &str) -> Result<Box<dyn RemoteFileChannel>, DeviceError> {
        let serial = serialport::new(port, self.baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_POLL)
            .open()
            .map_err(|e| DeviceError::PortUnavailable {
                port: port.to_owned(),
                reason: e.to_string(),
            })?;
        debug!(port, baud = self.baud, "serial port opened");

        let mut repl = RawRepl::new(serial, self.timeout);
        repl.enter(self.raw_delay)?;
        Ok(Box::new(RawReplChannel::new(repl)))
    }
}
