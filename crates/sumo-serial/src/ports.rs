use serialport::{SerialPortInfo, SerialPortType};
use sumo_core::{DeviceError, PortDescriptor, PortEnumerator};

/// The OS serial port list.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl PortEnumerator for SystemPorts {
    fn list_ports(&self) -> Result<Vec<PortDescriptor>, DeviceError> {
        let ports =
            serialport::available_ports().map_err(|e| DeviceError::Enumeration(e.to_string()))?;
        Ok(ports.into_iter().map(describe).collect())
    }
}

/// USB ports carry `VVVV:PPPP`; everything else an empty vendor id.
pub fn describe(info: SerialPortInfo) -> PortDescriptor {
    let vendor_id = match &info.port_type {
        SerialPortType::UsbPort(usb) => format!("{:04X}:{:04X}", usb.vid, usb.pid),
        _ => String::new(),
    };
    PortDescriptor::new(info.port_name, vendor_id)
}
