//! The peripheral core: session tracking, event dispatch and notifications.
//!
//! [`BluetoothServer`] owns one [`ServerContext`] that is shared with the
//! dispatcher task. Stack events arrive over an mpsc channel and are handled
//! one at a time, so registry updates never interleave.

pub mod characteristic_table;
pub mod dispatcher;
pub mod notifier;
pub mod session;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::mpsc;

use crate::api::peripheral::PeripheralStack;
use crate::api::peripheral_event::ConnectionHandle;
use crate::config::ServerConfig;
use crate::{Error, ErrorType, Result};

use characteristic_table::CharacteristicTable;
use dispatcher::Dispatcher;
use notifier::{Notifier, Sent};
use session::SessionRegistry;

pub type WriteCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type BinaryCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    write: Option<WriteCallback>,
    binary: Option<BinaryCallback>,
}

pub(crate) struct ServerContext {
    pub(crate) stack: Arc<dyn PeripheralStack>,
    sessions: Arc<Mutex<SessionRegistry>>,
    characteristics: CharacteristicTable,
    callbacks: RwLock<Callbacks>,
}

impl ServerContext {
    pub(crate) fn new(stack: Arc<dyn PeripheralStack>, characteristics: CharacteristicTable) -> Self {
        Self {
            stack,
            sessions: Arc::new(Mutex::new(SessionRegistry::new())),
            characteristics,
            callbacks: RwLock::new(Callbacks::default()),
        }
    }

    pub(crate) fn sessions(&self) -> MutexGuard<'_, SessionRegistry> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn notifier(&self) -> Notifier {
        Notifier::new(
            self.stack.clone(),
            self.sessions.clone(),
            self.characteristics.tx,
        )
    }

    // Callbacks are cloned out so none of them runs under the lock.
    pub(crate) fn write_callback(&self) -> Option<WriteCallback> {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .write
            .clone()
    }

    pub(crate) fn binary_callback(&self) -> Option<BinaryCallback> {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .binary
            .clone()
    }

    pub(crate) fn set_write_callback(&self, callback: WriteCallback) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .write = Some(callback);
    }

    pub(crate) fn set_binary_callback(&self, callback: BinaryCallback) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .binary = Some(callback);
    }
}

/// Application facing handle of a running peripheral.
#[derive(Clone)]
pub struct BluetoothServer {
    context: Arc<ServerContext>,
    config: ServerConfig,
}

impl BluetoothServer {
    /// Power the radio, register the GATT table and spawn the dispatcher.
    ///
    /// Fails with [`ErrorType::Registration`] when the stack rejects the
    /// services or returns handles that cannot be mapped to roles. Must be
    /// called from within a tokio runtime.
    pub async fn start(stack: Arc<dyn PeripheralStack>, config: ServerConfig) -> Result<Self> {
        stack.enable_radio().await?;

        let (sender_tx, receiver_rx) = mpsc::channel(config.event_queue_capacity.max(1));
        stack.on_event(sender_tx);

        let services = config.services();
        let handles = stack.register_services(&services).await.map_err(|e| {
            Error::from_string(
                format!("Service registration failed: {}", e.message),
                ErrorType::Registration,
            )
        })?;
        let characteristics = CharacteristicTable::from_registration(&services, &handles)?;
        log::info!(
            "Registered services, name={} rx={} tx={}",
            characteristics.device_name,
            characteristics.rx,
            characteristics.tx
        );

        let context = Arc::new(ServerContext::new(stack, characteristics));
        tokio::spawn(Dispatcher::new(context.clone()).run(receiver_rx));

        Ok(Self { context, config })
    }

    pub fn set_write_callback<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.context.set_write_callback(Arc::new(callback));
    }

    pub fn set_binary_callback<F>(&self, callback: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.context.set_binary_callback(Arc::new(callback));
    }

    pub fn send(&self, payload: impl AsRef<[u8]>) -> Result<Sent> {
        self.context.notifier().send(payload)
    }

    pub fn send_to(&self, connection: ConnectionHandle, payload: impl AsRef<[u8]>) -> Result<Sent> {
        self.context.notifier().send_to(connection, payload)
    }

    pub fn send_data(&self, payload: impl AsRef<[u8]>) -> bool {
        self.context.notifier().send_data(payload)
    }

    pub fn notifier(&self) -> Notifier {
        self.context.notifier()
    }

    pub fn is_connected(&self) -> bool {
        !self.context.sessions().is_empty()
    }

    pub fn connection_count(&self) -> usize {
        self.context.sessions().count()
    }

    pub fn connections(&self) -> Vec<ConnectionHandle> {
        self.context.sessions().connections()
    }

    pub fn characteristics(&self) -> CharacteristicTable {
        self.context.characteristics
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Log the connection state forever, polling faster while idle.
    pub async fn run_status_loop(&self) {
        loop {
            let count = self.connection_count();
            if count > 0 {
                log::info!("Connected clients: {count}");
                tokio::time::sleep(self.config.connected_poll_interval).await;
            } else {
                log::info!("Waiting for connection...");
                tokio::time::sleep(self.config.idle_poll_interval).await;
            }
        }
    }
}
