//! Device session orchestrator for a USB-attached SumoRobot.
//!
//! One removable ESP32 board running MicroPython, reached over a
//! half-duplex serial link that only one party may drive at a time:
//!
//! - **[`Manager`]**: facade that owns the [`Session`] and spawns three
//!   periodic workers. The *port monitor* detects arrival and departure of
//!   the managed device and loads its WiFi network list; the *config
//!   update* worker writes WiFi credentials into the device's
//!   `config.json`; the *firmware update* worker downloads and flashes
//!   MicroPython, then uploads the SumoRobot application sources.
//!
//! - **[`Session`]**: the shared record of the bound port, the transport
//!   owner, and each workflow's phase. Transport ownership is taken with
//!   [`Session::lease`] and given back on drop.
//!
//! - **Collaborators** ([`device`]): blocking traits for port enumeration,
//!   the remote file channel, and the ROM bootloader. Workers run them on
//!   the blocking pool under a timeout. Concrete implementations live in
//!   `sumo-serial`.
//!
//! - **Notifications** ([`Notification`]): status lines, dialogs, and port
//!   events on a broadcast channel; device binding on a `watch`.

pub mod config;
pub mod device;
pub mod error;
pub mod manager;
pub mod model;
pub mod notify;
pub mod session;

mod worker;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{
    DialogImages, FirmwareSource, FlashMode, FlashParams, ManagerConfig,
    DEFAULT_COMPANION_FILES, DEFAULT_INDEX_URL, DEFAULT_SOURCE_BASE_URL, DEFAULT_VENDOR_PREFIXES,
};
pub use device::{
    BootloaderFlasher, ChipSession, DeviceBackend, DeviceError, DeviceHandle, PortDescriptor,
    PortEnumerator, RemoteFileChannel, SerialTransport, select_managed_port,
};
pub use error::CoreError;
pub use manager::Manager;
pub use model::{
    Dialog, FirmwareAssets, Notification, PortEvent, RemoteConfig, SSID_PLACEHOLDER, Severity,
    WifiCredential,
};
pub use notify::Notifier;
pub use session::{
    ConnectionState, Session, SessionSnapshot, TransportOwner, UpdateKind, UpdateOutcome,
    UpdatePhase,
};
