//! AP binding: packet transfer, completion wait and final ack

use std::sync::Arc;
use std::time::Duration;

use airwater_proto::ble::{COMMAND_UUID, NOTIFICATION_UUID, POLL_ATTEMPTS, POLL_INTERVAL};
use airwater_proto::{AckPacket, EncodingError, encode, is_completion_signal, packetize};
use data_encoding::HEXLOWER;
use log::{debug, error, warn};
use tokio::sync::watch;
use uuid::Uuid;

use crate::transport::{NotificationHandler, Transport, TransportError, WriteMode};

pub const COMMAND_CHARACTERISTIC: Uuid = Uuid::from_u128(COMMAND_UUID);
pub const NOTIFICATION_CHARACTERISTIC: Uuid = Uuid::from_u128(NOTIFICATION_UUID);

#[derive(thiserror::Error, Debug)]
pub enum ProvisionError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("AP binding timeout")]
    Timeout,
}

/// How long to wait for the device to confirm the credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindConfig {
    pub poll_interval: Duration,
    pub poll_attempts: u32,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            poll_attempts: POLL_ATTEMPTS,
        }
    }
}

impl BindConfig {
    pub fn completion_timeout(&self) -> Duration {
        self.poll_interval.saturating_mul(self.poll_attempts)
    }
}

/// Completion flag for one bind attempt
///
/// Set from the notification handler, awaited by the engine.
#[derive(Debug)]
pub struct TransferState {
    done: watch::Sender<bool>,
}

impl Default for TransferState {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferState {
    pub fn new() -> Self {
        let (done, _) = watch::channel(false);
        Self { done }
    }

    pub fn mark_done(&self) {
        self.done.send_replace(true);
    }

    pub fn is_done(&self) -> bool {
        *self.done.borrow()
    }

    /// Resolves `true` as soon as the flag is set, or `false` after `timeout`.
    pub async fn wait_done(&self, timeout: Duration) -> bool {
        let mut rx = self.done.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|done| *done))
            .await
            .is_ok_and(|changed| changed.is_ok())
    }

    /// Notification handler that sets the flag on the completion signal and
    /// logs anything else.
    fn handler(self: Arc<Self>) -> NotificationHandler {
        Box::new(move |data: &[u8]| {
            debug!("< {}", HEXLOWER.encode(data));
            if is_completion_signal(data) {
                self.mark_done();
            } else {
                error!("Unexpected data: {}", HEXLOWER.encode(data));
            }
        })
    }
}

/// Send Wi-Fi credentials to a connected device and wait for it to accept them.
///
/// The notification subscription is taken before the first packet is written
/// and released on every exit path. A failed unsubscribe is logged and
/// otherwise ignored: the outcome of the attempt is decided by the transfer.
pub async fn bind_ap<T: Transport>(
    transport: &T,
    ssid: &str,
    password: &str,
    config: &BindConfig,
) -> Result<(), ProvisionError> {
    let blob = encode(ssid, password)?;

    let state = Arc::new(TransferState::new());
    let subscription = transport
        .subscribe(NOTIFICATION_CHARACTERISTIC, state.clone().handler())
        .await?;

    let result = transfer(transport, &blob, &state, config).await;

    if let Err(e) = transport.unsubscribe(subscription).await {
        warn!("Ignoring failed unsubscribe: {e}");
    }

    if result.is_ok() {
        debug!("Device confirmed SSID: {ssid}");
    }
    result
}

async fn transfer<T: Transport>(
    transport: &T,
    blob: &[u8],
    state: &TransferState,
    config: &BindConfig,
) -> Result<(), ProvisionError> {
    let packets = packetize(blob);
    debug!("Sending {} bytes in {} packets", blob.len(), packets.len());

    for packet in &packets {
        write_command(transport, &packet.to_bytes()).await?;
    }

    let timeout = config.completion_timeout();
    debug!("Waiting up to {timeout:?} for the device to confirm");
    if !state.wait_done(timeout).await {
        return Err(ProvisionError::Timeout);
    }

    let ack = match packets.last() {
        Some(last) => AckPacket::after(last.seq),
        None => AckPacket { seq: 0 },
    };
    write_command(transport, &ack.to_bytes()).await?;
    Ok(())
}

async fn write_command<T: Transport>(transport: &T, data: &[u8]) -> Result<(), TransportError> {
    debug!("> {}", HEXLOWER.encode(data));
    transport
        .write(COMMAND_CHARACTERISTIC, data, WriteMode::WithResponse)
        .await
}
