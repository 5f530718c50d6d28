//! AirWater BLE provisioning wire format
//!
//! The credential payload codec and the packet framing used to push it over
//! the command characteristic. Nothing in here performs I/O.

pub mod ble;
mod credentials;
mod packet;

pub use credentials::{BindApRequest, DecodeError, EncodingError, encode};
pub use packet::{
    AckPacket, DataPacket, PacketError, is_completion_signal, packet_count, packet_tag, packetize,
};
