//! In-memory device collaborators shared by the manager tests.
#![allow(clippy::unwrap_used, dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sumo_core::{
    BootloaderFlasher, ChipSession, DeviceBackend, DeviceError, DeviceHandle, FlashParams,
    Manager, ManagerConfig, Notification, PortDescriptor, PortEnumerator, RemoteFileChannel,
    SerialTransport,
};
use tokio::sync::broadcast;
use url::Url;

pub const PORT: &str = "/dev/ttyUSB0";
pub const CP2102: &str = "10C4:EA60";

/// Shared state of the fake board and everything done to it.
#[derive(Debug, Default)]
pub struct Board {
    pub ports: Vec<PortDescriptor>,
    pub networks: Vec<String>,
    /// Makes `list_networks` fail with this message.
    pub scan_error: Option<String>,
    pub files: HashMap<String, Vec<u8>>,
    pub fail_open: bool,
    pub fail_put_of: Option<String>,
    pub fail_flash: bool,
    /// Makes `run_stub` fail with a protocol error.
    pub fail_stub: bool,
    pub fail_detect: bool,
    pub get_delay: Option<Duration>,
    /// Every call in order, e.g. `open /dev/ttyUSB0`, `put main.py`.
    pub log: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeBoard {
    pub state: Arc<Mutex<Board>>,
}

impl FakeBoard {
    pub fn new() -> Self {
        let board = Self::default();
        board.with(|b| b.networks = vec!["Office".into(), "Home".into()]);
        board
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut Board) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn plug(&self, path: &str, vendor: &str) {
        self.with(|b| b.ports = vec![PortDescriptor::new(path, vendor)]);
    }

    pub fn unplug(&self) {
        self.with(|b| b.ports.clear());
    }

    pub fn log(&self) -> Vec<String> {
        self.with(|b| b.log.clone())
    }

    pub fn clear_log(&self) {
        self.with(|b| b.log.clear());
    }

    pub fn count(&self, entry: &str) -> usize {
        self.with(|b| b.log.iter().filter(|l| *l == entry).count())
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.with(|b| b.files.get(name).cloned())
    }

    fn record(&self, entry: String) {
        self.with(|b| b.log.push(entry));
    }

    pub fn backend(&self) -> DeviceBackend {
        DeviceBackend {
            ports: Arc::new(self.clone()),
            transport: Arc::new(self.clone()),
            flasher: Arc::new(self.clone()),
        }
    }
}

impl PortEnumerator for FakeBoard {
    fn list_ports(&self) -> Result<Vec<PortDescriptor>, DeviceError> {
        Ok(self.with(|b| b.ports.clone()))
    }
}

impl SerialTransport for FakeBoard {
    fn open_channel(&self, port: &str) -> Result<Box<dyn RemoteFileChannel>, DeviceError> {
        self.record(format!("open {port}"));
        if self.with(|b| b.fail_open) {
            return Err(DeviceError::PortUnavailable {
                port: port.into(),
                reason: "busy".into(),
            });
        }
        Ok(Box::new(FakeChannel {
            board: self.clone(),
        }))
    }
}

impl BootloaderFlasher for FakeBoard {
    fn detect(&self, port: &str) -> Result<Box<dyn ChipSession>, DeviceError> {
        self.record(format!("detect {port}"));
        if self.with(|b| b.fail_detect) {
            return Err(DeviceError::ChipNotFound {
                port: port.into(),
                reason: "no sync".into(),
            });
        }
        Ok(Box::new(FakeChip {
            board: self.clone(),
        }))
    }
}

struct FakeChannel {
    board: FakeBoard,
}

impl DeviceHandle for FakeChannel {
    fn close(&mut self) -> Result<(), DeviceError> {
        self.board.record("close".into());
        Ok(())
    }
}

impl RemoteFileChannel for FakeChannel {
    fn get(&mut self, name: &str) -> Result<Vec<u8>, DeviceError> {
        self.board.record(format!("get {name}"));
        if let Some(delay) = self.board.with(|b| b.get_delay) {
            std::thread::sleep(delay);
        }
        self.board
            .file(name)
            .ok_or_else(|| DeviceError::FileNotFound(name.into()))
    }

    fn put(&mut self, name: &str, data: &[u8]) -> Result<(), DeviceError> {
        self.board.record(format!("put {name}"));
        if self.board.with(|b| b.fail_put_of.as_deref() == Some(name)) {
            return Err(DeviceError::Protocol("write interrupted".into()));
        }
        self.board
            .with(|b| b.files.insert(name.into(), data.to_vec()));
        Ok(())
    }

    fn list_networks(&mut self) -> Result<Vec<String>, DeviceError> {
        self.board.record("scan".into());
        self.board.with(|b| match &b.scan_error {
            Some(e) => Err(DeviceError::Protocol(e.clone())),
            None => Ok(b.networks.clone()),
        })
    }
}

struct FakeChip {
    board: FakeBoard,
}

impl DeviceHandle for FakeChip {
    fn close(&mut self) -> Result<(), DeviceError> {
        self.board.record("chip close".into());
        Ok(())
    }
}

impl ChipSession for FakeChip {
    fn chip(&self) -> &str {
        "ESP32"
    }

    fn run_stub(&mut self) -> Result<(), DeviceError> {
        self.board.record("run stub".into());
        if self.board.with(|b| b.fail_stub) {
            return Err(DeviceError::Protocol("stub did not answer".into()));
        }
        Ok(())
    }

    fn change_baud(&mut self, baud: u32) -> Result<(), DeviceError> {
        self.board.record(format!("baud {baud}"));
        Ok(())
    }

    fn write_flash(&mut self, image: &[u8], params: &FlashParams) -> Result<(), DeviceError> {
        self.board.record(format!(
            "write {} bytes at {:#x} {} {}",
            image.len(),
            params.offset,
            params.flash_mode,
            params.flash_size_label()
        ));
        if self.board.with(|b| b.fail_flash) {
            return Err(DeviceError::Flash("checksum mismatch".into()));
        }
        Ok(())
    }

    fn hard_reset(&mut self) -> Result<(), DeviceError> {
        self.board.record("hard reset".into());
        Ok(())
    }
}

// ── Manager helpers ─────────────────────────────────────────────────

/// Config pointing the firmware endpoints at `base` (a mock server URI).
pub fn config_for(base: &str) -> ManagerConfig {
    let mut config = ManagerConfig {
        poll_interval: Duration::from_millis(20),
        serial_timeout: Duration::from_secs(5),
        flash_timeout: Duration::from_secs(5),
        http_timeout: Duration::from_secs(5),
        ..ManagerConfig::default()
    };
    config.firmware.index_url = Url::parse(&format!("{base}/download")).unwrap();
    config.firmware.source_base_url = Url::parse(&format!("{base}/sources/")).unwrap();
    config
}

pub fn manager(board: &FakeBoard) -> Manager {
    Manager::new(config_for("http://127.0.0.1:9"), board.backend()).unwrap()
}

/// Everything currently queued on the receiver.
pub fn drain(rx: &mut broadcast::Receiver<Arc<Notification>>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push((*n).clone());
    }
    out
}

pub fn dialogs(notes: &[Notification]) -> Vec<&sumo_core::Dialog> {
    notes
        .iter()
        .filter_map(|n| match n {
            Notification::Dialog(d) => Some(d),
            _ => None,
        })
        .collect()
}

pub fn statuses(notes: &[Notification]) -> Vec<String> {
    notes
        .iter()
        .filter_map(|n| match n {
            Notification::Status { severity, text } => Some(format!("{severity}: {text}")),
            _ => None,
        })
        .collect()
}

/// Plug the board in and run one poll so the session is connected.
pub async fn connect(manager: &Manager, board: &FakeBoard) {
    board.plug(PORT, CP2102);
    manager.poll_ports().await;
    assert!(manager.connection_state().borrow().is_connected());
    board.clear_log();
}
