//! AirWater BLE Controller
//!
//! Binds AirWater devices to a Wi-Fi access point over BLE.
//!
//! # Example
//!
//! ```ignore
//! use airwater_ble_controller::{BindConfig, ble};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Scan for devices
//!     let devices = ble::scan(Duration::from_secs(5)).await?;
//!     for device in &devices {
//!         println!("{} ({})", device.name, device.address);
//!     }
//!
//!     // Bind the first one to an access point
//!     let device = devices.first().ok_or("no device")?;
//!     ble::provision(&device.peripheral, "MySSID", "MyPassword", &BindConfig::default()).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod ble;
mod engine;
mod transport;

pub use engine::{
    BindConfig, COMMAND_CHARACTERISTIC, NOTIFICATION_CHARACTERISTIC, ProvisionError, TransferState,
    bind_ap,
};
pub use transport::{NotificationHandler, Transport, TransportError, WriteMode};
