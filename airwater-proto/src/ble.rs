//! BLE GATT protocol constants for AirWater AP binding
//!
//! UUIDs are kept as `u128` so callers can build a `uuid::Uuid` in a const
//! context with `Uuid::from_u128`.

use std::time::Duration;

/// Command characteristic (write with response): data and ack packets.
pub const COMMAND_UUID: u128 = 0x22210001_554a_4546_5542_46534450464d;

/// Notification characteristic: device pushes the completion signal here.
pub const NOTIFICATION_UUID: u128 = 0x22210002_554a_4546_5542_46534450464d;

/// Maximum number of payload bytes carried by one data packet.
pub const PACKET_SIZE: usize = 16;

/// Type marker following `seq` and `tag` in every data packet.
pub const DATA_MARKER: [u8; 2] = [0x00, 0x15];

/// Marker following the sequence byte of the final ack packet.
pub const ACK_MARKER: [u8; 3] = [0x11, 0x00, 0x16];

/// Notification sent by the device once it has accepted the credentials.
pub const COMPLETION_SIGNAL: [u8; 5] = [0x00, 0x11, 0x00, 0x15, 0x01];

/// Interval between completion checks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Number of checks before the bind attempt is declared timed out.
pub const POLL_ATTEMPTS: u32 = 60;
