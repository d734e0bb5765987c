use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use crate::Result;
use crate::api::characteristic::CharacteristicHandle;
use crate::api::peripheral_event::{NotifyTarget, PeripheralEvent};
use crate::api::service::Service;

/// The BLE stack as seen by the server: radio, GATT table and event source.
#[async_trait]
pub trait PeripheralStack: Send + Sync {
    async fn enable_radio(&self) -> Result<()>;

    /// Returns one handle per declared characteristic, services concatenated
    /// in declaration order.
    async fn register_services(&self, services: &[Service]) -> Result<Vec<CharacteristicHandle>>;

    fn read_characteristic(&self, characteristic: CharacteristicHandle) -> Result<Vec<u8>>;

    /// Queue a notification. Must not wait for delivery.
    fn notify(
        &self,
        target: NotifyTarget,
        characteristic: CharacteristicHandle,
        value: &[u8],
    ) -> Result<()>;

    fn on_event(&self, sender_tx: Sender<PeripheralEvent>);
}
