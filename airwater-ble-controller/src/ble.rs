//! btleplug backed transport
//!
//! Scans for AirWater devices, opens GATT links and runs [`bind_ap`] over them.

use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::engine::{
    BindConfig, COMMAND_CHARACTERISTIC, NOTIFICATION_CHARACTERISTIC, ProvisionError, bind_ap,
};
use crate::transport::{NotificationHandler, Transport, TransportError, WriteMode};

/// A device seen during a scan
#[derive(Clone)]
pub struct DiscoveredDevice {
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
    pub peripheral: Peripheral,
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, TransportError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(TransportError::NoAdapter)
}

/// Scan for BLE devices for `duration`
pub async fn scan(duration: Duration) -> Result<Vec<DiscoveredDevice>, TransportError> {
    let adapter = get_adapter().await?;

    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(duration).await;

    // Stop scanning even when reading the results failed.
    let devices = discovered(&adapter).await;
    let stopped = adapter.stop_scan().await;
    scan_outcome(devices, stopped.map_err(TransportError::from))
}

/// A failure while reading results wins over a failure to stop the scan.
fn scan_outcome<T>(
    found: Result<T, TransportError>,
    stopped: Result<(), TransportError>,
) -> Result<T, TransportError> {
    let found = found?;
    stopped?;
    Ok(found)
}

async fn discovered(adapter: &Adapter) -> Result<Vec<DiscoveredDevice>, TransportError> {
    let mut devices = Vec::new();

    for peripheral in adapter.peripherals().await? {
        if let Some(props) = peripheral.properties().await? {
            devices.push(DiscoveredDevice {
                name: props.local_name.unwrap_or_else(|| "Unknown".to_string()),
                address: peripheral.address().to_string(),
                rssi: props.rssi,
                peripheral,
            });
        }
    }

    Ok(devices)
}

/// Find the first device whose name or address contains `target`
pub async fn find_device(
    target: &str,
    duration: Duration,
) -> Result<DiscoveredDevice, TransportError> {
    scan(duration)
        .await?
        .into_iter()
        .find(|d| d.name.contains(target) || d.address.contains(target))
        .ok_or(TransportError::DeviceNotFound)
}

/// Bind a device to an access point
///
/// Owns the connection for the whole attempt: the device is disconnected
/// afterwards whatever the outcome. A failed disconnect is only logged.
pub async fn provision(
    peripheral: &Peripheral,
    ssid: &str,
    password: &str,
    config: &BindConfig,
) -> Result<(), ProvisionError> {
    debug!("Connecting to {}...", peripheral.address());
    peripheral.connect().await.map_err(TransportError::from)?;

    let result = match GattLink::open(peripheral).await {
        Ok(link) => bind_ap(&link, ssid, password, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = peripheral.disconnect().await {
        warn!("Ignoring failed disconnect: {e}");
    }
    if result.is_ok() {
        info!("Successfully bound to {} with SSID: {ssid}.", peripheral.address());
    }
    result
}

/// A connected peripheral with the AP binding characteristics resolved
pub struct GattLink {
    peripheral: Peripheral,
    command: Characteristic,
    notification: Characteristic,
}

impl GattLink {
    /// Discover services on an already connected peripheral.
    pub async fn open(peripheral: &Peripheral) -> Result<Self, TransportError> {
        debug!("Discovering services...");
        peripheral.discover_services().await?;

        let characteristics = peripheral.characteristics();
        let find = |uuid: Uuid| {
            characteristics
                .iter()
                .find(|c| c.uuid == uuid)
                .cloned()
                .ok_or(TransportError::CharacteristicNotFound(uuid))
        };

        Ok(Self {
            peripheral: peripheral.clone(),
            command: find(COMMAND_CHARACTERISTIC)?,
            notification: find(NOTIFICATION_CHARACTERISTIC)?,
        })
    }

    fn characteristic(&self, uuid: Uuid) -> Result<&Characteristic, TransportError> {
        [&self.command, &self.notification]
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(TransportError::CharacteristicNotFound(uuid))
    }
}

/// Active notification subscription; dropping it stops delivery to the handler
pub struct NotificationSubscription {
    characteristic: Characteristic,
    forwarder: JoinHandle<()>,
}

impl Drop for NotificationSubscription {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

impl From<WriteMode> for WriteType {
    fn from(mode: WriteMode) -> Self {
        match mode {
            WriteMode::WithResponse => WriteType::WithResponse,
            WriteMode::WithoutResponse => WriteType::WithoutResponse,
        }
    }
}

impl Transport for GattLink {
    type Subscription = NotificationSubscription;

    async fn write(
        &self,
        characteristic: Uuid,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<(), TransportError> {
        let characteristic = self.characteristic(characteristic)?;
        self.peripheral.write(characteristic, data, mode.into()).await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        characteristic: Uuid,
        handler: NotificationHandler,
    ) -> Result<NotificationSubscription, TransportError> {
        let characteristic = self.characteristic(characteristic)?.clone();

        // The stream is multiplexed over every subscribed characteristic.
        // Take it before subscribing so no early notification is missed.
        let mut notifications = self.peripheral.notifications().await?;
        self.peripheral.subscribe(&characteristic).await?;

        let uuid = characteristic.uuid;
        let forwarder = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid == uuid {
                    handler(&notification.value);
                }
            }
        });

        Ok(NotificationSubscription {
            characteristic,
            forwarder,
        })
    }

    async fn unsubscribe(
        &self,
        subscription: NotificationSubscription,
    ) -> Result<(), TransportError> {
        subscription.forwarder.abort();
        self.peripheral.unsubscribe(&subscription.characteristic).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_modes_map_to_btleplug() {
        assert_eq!(WriteType::from(WriteMode::WithResponse), WriteType::WithResponse);
        assert_eq!(WriteType::from(WriteMode::WithoutResponse), WriteType::WithoutResponse);
    }

    #[test]
    fn scan_reports_read_failure_before_stop_failure() {
        let not_connected = || TransportError::Bluetooth(btleplug::Error::NotConnected);

        assert_eq!(scan_outcome(Ok(3), Ok(())).unwrap(), 3);
        assert!(matches!(
            scan_outcome::<u8>(Err(TransportError::DeviceNotFound), Err(not_connected())),
            Err(TransportError::DeviceNotFound)
        ));
        assert!(matches!(
            scan_outcome(Ok(3), Err(not_connected())),
            Err(TransportError::Bluetooth(btleplug::Error::NotConnected))
        ));
    }
}
