//! `sumo ports`: serial port listing.

use serde::Serialize;
use tabled::Tabled;

use sumo_core::{PortDescriptor, PortEnumerator};
use sumo_serial::SystemPorts;

use crate::cli::{GlobalOpts, PortsArgs};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PortEntry {
    #[serde(flatten)]
    port: PortDescriptor,
    managed: bool,
}

#[derive(Tabled)]
struct PortRow {
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Hardware ID")]
    vendor_id: String,
    #[tabled(rename = "SumoRobot")]
    managed: String,
}

impl From<&PortEntry> for PortRow {
    fn from(e: &PortEntry) -> Self {
        Self {
            port: e.port.device_path.clone(),
            vendor_id: e.port.vendor_id.clone(),
            managed: if e.managed { "yes".into() } else { String::new() },
        }
    }
}

pub fn handle(
    args: &PortsArgs,
    cfg: &sumo_config::Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let manager_config = cfg.to_manager_config()?;
    let ports = SystemPorts
        .list_ports()
        .map_err(sumo_core::CoreError::from)?;

    let entries = classify(ports, &manager_config.vendor_prefixes, args.managed);
    let rendered = output::render_list(
        global.output,
        &entries,
        |e| PortRow::from(e),
        |e| e.port.device_path.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn classify(ports: Vec<PortDescriptor>, prefixes: &[String], managed_only: bool) -> Vec<PortEntry> {
    ports
        .into_iter()
        .map(|port| PortEntry {
            managed: port.matches_vendor(prefixes),
            port,
        })
        .filter(|e| e.managed || !managed_only)
        .collect()
}
