// sumo-api: Async Rust client for the SumoRobot firmware distribution endpoints

pub mod error;
pub mod firmware;
pub mod transport;

pub use error::Error;
pub use firmware::{FirmwareClient, find_binary_link};
pub use transport::HttpConfig;
