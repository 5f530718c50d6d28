//! The GATT operations the bind engine needs from a BLE stack

use uuid::Uuid;

/// Called with the raw value of every notification on a subscribed characteristic.
pub type NotificationHandler = Box<dyn Fn(&[u8]) + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    #[error("no matching BLE device found")]
    DeviceNotFound,
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),
    #[error("bluetooth: {0}")]
    Bluetooth(#[from] btleplug::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Resolve only once the peripheral has acknowledged the write
    WithResponse,
    WithoutResponse,
}

/// A connected GATT peripheral
///
/// Implementations address characteristics by UUID. A subscription stays
/// active, delivering notifications to its handler from any task, until it
/// is passed back to [`Transport::unsubscribe`].
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Subscription;

    async fn write(
        &self,
        characteristic: Uuid,
        data: &[u8],
        mode: WriteMode,
    ) -> Result<(), TransportError>;

    async fn subscribe(
        &self,
        characteristic: Uuid,
        handler: NotificationHandler,
    ) -> Result<Self::Subscription, TransportError>;

    async fn unsubscribe(&self, subscription: Self::Subscription) -> Result<(), TransportError>;
}
