use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc::Receiver;

use crate::api::characteristic::CharacteristicHandle;
use crate::api::peripheral_event::{ConnectionHandle, PeripheralEvent};
use crate::server::ServerContext;
use crate::{Error, ErrorType};

/// What a single event did to the server. Purely observational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    SessionOpened,
    SessionAlreadyOpen,
    SessionClosed,
    SessionUnknown,
    Delivered,
    NoCallback,
    /// Payload was not UTF-8; the text callback was skipped.
    BinaryReceived,
    EmptyPayload,
    /// Write from a connection that is not registered.
    WriteIgnored,
    CallbackFault,
    PassedThrough,
}

#[derive(Clone)]
pub struct Dispatcher {
    context: Arc<ServerContext>,
}

impl Dispatcher {
    pub(crate) fn new(context: Arc<ServerContext>) -> Self {
        Self { context }
    }

    pub async fn run(self, mut receiver_rx: Receiver<PeripheralEvent>) {
        while let Some(event) = receiver_rx.recv().await {
            let connection = event.connection();
            let outcome = self.handle_event(event);
            log::trace!("Dispatched event for {connection}: {outcome:?}");
        }
        log::info!("Event source closed, dispatcher stopping");
    }

    pub fn handle_event(&self, event: PeripheralEvent) -> DispatchOutcome {
        match event {
            PeripheralEvent::CentralConnected { connection } => self.handle_connect(connection),
            PeripheralEvent::CentralDisconnected { connection } => {
                self.handle_disconnect(connection)
            }
            PeripheralEvent::CharacteristicWrite {
                connection,
                characteristic,
                value,
            } => self.handle_write(connection, characteristic, value),
            PeripheralEvent::CharacteristicReadRequest {
                connection,
                characteristic,
            } => {
                log::trace!("Read request from {connection} on {characteristic}");
                DispatchOutcome::PassedThrough
            }
            PeripheralEvent::SubscriptionUpdate {
                connection,
                characteristic,
                subscribed,
            } => {
                log::debug!("{connection} subscribed={subscribed} on {characteristic}");
                DispatchOutcome::PassedThrough
            }
        }
    }

    fn handle_connect(&self, connection: ConnectionHandle) -> DispatchOutcome {
        let mut sessions = self.context.sessions();
        if sessions.on_connect(connection) {
            log::info!("Connected: {connection} ({} active)", sessions.count());
            DispatchOutcome::SessionOpened
        } else {
            log::debug!("Connect for {connection} which is already registered");
            DispatchOutcome::SessionAlreadyOpen
        }
    }

    fn handle_disconnect(&self, connection: ConnectionHandle) -> DispatchOutcome {
        let mut sessions = self.context.sessions();
        if sessions.on_disconnect(connection) {
            log::info!("Disconnected: {connection} ({} active)", sessions.count());
            DispatchOutcome::SessionClosed
        } else {
            log::warn!("Disconnect for unknown {connection}");
            DispatchOutcome::SessionUnknown
        }
    }

    fn handle_write(
        &self,
        connection: ConnectionHandle,
        characteristic: CharacteristicHandle,
        value: Vec<u8>,
    ) -> DispatchOutcome {
        if !self.context.sessions().contains(&connection) {
            log::trace!("Ignoring write from unregistered {connection}");
            return DispatchOutcome::WriteIgnored;
        }

        if value.is_empty() {
            log::debug!("Empty write from {connection} on {characteristic}");
            return DispatchOutcome::EmptyPayload;
        }

        match std::str::from_utf8(&value) {
            Ok(text) => {
                log::info!("Received from {connection}: {text}");
                let Some(callback) = self.context.write_callback() else {
                    return DispatchOutcome::NoCallback;
                };
                match contain_panic("write", || callback(text)) {
                    Ok(()) => DispatchOutcome::Delivered,
                    Err(e) => {
                        log::error!("{e}");
                        DispatchOutcome::CallbackFault
                    }
                }
            }
            Err(decode) => {
                let e = Error::from_string(
                    format!("Binary data from {connection} ({decode}): {value:02x?}"),
                    ErrorType::Decode,
                );
                log::warn!("{e}");
                let Some(callback) = self.context.binary_callback() else {
                    return DispatchOutcome::BinaryReceived;
                };
                match contain_panic("binary", || callback(&value)) {
                    Ok(()) => DispatchOutcome::BinaryReceived,
                    Err(e) => {
                        log::error!("{e}");
                        DispatchOutcome::CallbackFault
                    }
                }
            }
        }
    }
}

fn contain_panic<F: FnOnce()>(name: &str, f: F) -> Result<(), Error> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Error::from_string(
            format!("{name} callback panicked: {reason}"),
            ErrorType::CallbackFault,
        )
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::api::peripheral::PeripheralStack;
    use crate::api::peripheral_event::NotifyTarget;
    use crate::server::characteristic_table::CharacteristicTable;
    use crate::simulated::SimulatedStack;

    const RX: CharacteristicHandle = CharacteristicHandle(2);

    fn setup() -> (Arc<SimulatedStack>, Arc<ServerContext>, Dispatcher) {
        let stack = Arc::new(SimulatedStack::new());
        let table = CharacteristicTable {
            device_name: CharacteristicHandle(1),
            rx: RX,
            tx: RX,
        };
        let context = Arc::new(ServerContext::new(stack.clone(), table));
        let dispatcher = Dispatcher::new(context.clone());
        (stack, context, dispatcher)
    }

    fn connect(id: u16) -> PeripheralEvent {
        PeripheralEvent::CentralConnected {
            connection: ConnectionHandle(id),
        }
    }

    fn disconnect(id: u16) -> PeripheralEvent {
        PeripheralEvent::CentralDisconnected {
            connection: ConnectionHandle(id),
        }
    }

    fn write(id: u16, value: &[u8]) -> PeripheralEvent {
        PeripheralEvent::CharacteristicWrite {
            connection: ConnectionHandle(id),
            characteristic: RX,
            value: value.to_vec(),
        }
    }

    fn recorder(context: &ServerContext) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        context.set_write_callback(Arc::new(move |text: &str| {
            sink.lock().unwrap().push(text.to_string());
        }));
        seen
    }

    #[test]
    fn connect_and_disconnect_drive_the_registry() {
        let (_, context, dispatcher) = setup();

        assert_eq!(dispatcher.handle_event(connect(1)), DispatchOutcome::SessionOpened);
        assert_eq!(dispatcher.handle_event(connect(1)), DispatchOutcome::SessionAlreadyOpen);
        assert_eq!(dispatcher.handle_event(connect(2)), DispatchOutcome::SessionOpened);
        assert_eq!(context.sessions().count(), 2);

        assert_eq!(dispatcher.handle_event(disconnect(1)), DispatchOutcome::SessionClosed);
        assert_eq!(context.sessions().count(), 1);
    }

    #[test]
    fn unknown_disconnect_changes_nothing() {
        let (_, context, dispatcher) = setup();
        dispatcher.handle_event(connect(1));

        assert_eq!(dispatcher.handle_event(disconnect(5)), DispatchOutcome::SessionUnknown);
        assert_eq!(context.sessions().count(), 1);
    }

    #[test]
    fn utf8_write_reaches_callback_once() {
        let (_, context, dispatcher) = setup();
        let seen = recorder(&context);
        dispatcher.handle_event(connect(1));

        assert_eq!(dispatcher.handle_event(write(1, b"hello")), DispatchOutcome::Delivered);
        assert_eq!(*seen.lock().unwrap(), vec!["hello".to_string()]);
    }

    #[test]
    fn write_without_callback_is_not_an_error() {
        let (_, _, dispatcher) = setup();
        dispatcher.handle_event(connect(1));

        assert_eq!(dispatcher.handle_event(write(1, b"hello")), DispatchOutcome::NoCallback);
    }

    #[test]
    fn write_from_unregistered_connection_is_ignored() {
        let (_, context, dispatcher) = setup();
        let seen = recorder(&context);

        assert_eq!(dispatcher.handle_event(write(3, b"hello")), DispatchOutcome::WriteIgnored);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn binary_write_skips_text_callback() {
        let (_, context, dispatcher) = setup();
        let seen = recorder(&context);
        dispatcher.handle_event(connect(1));

        assert_eq!(
            dispatcher.handle_event(write(1, &[0xff, 0xfe])),
            DispatchOutcome::BinaryReceived
        );
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn binary_callback_gets_raw_bytes() {
        let (_, context, dispatcher) = setup();
        let text = recorder(&context);
        let raw = Arc::new(Mutex::new(Vec::new()));
        let sink = raw.clone();
        context.set_binary_callback(Arc::new(move |bytes: &[u8]| {
            sink.lock().unwrap().extend_from_slice(bytes);
        }));
        dispatcher.handle_event(connect(1));

        assert_eq!(
            dispatcher.handle_event(write(1, &[0xff, 0xfe])),
            DispatchOutcome::BinaryReceived
        );
        assert_eq!(*raw.lock().unwrap(), vec![0xff, 0xfe]);
        assert!(text.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_write_is_skipped() {
        let (_, context, dispatcher) = setup();
        let seen = recorder(&context);
        dispatcher.handle_event(connect(1));

        assert_eq!(dispatcher.handle_event(write(1, b"")), DispatchOutcome::EmptyPayload);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn panicking_callback_is_contained() {
        let (_, context, dispatcher) = setup();
        context.set_write_callback(Arc::new(|text: &str| {
            if text == "boom" {
                panic!("application bug");
            }
        }));
        dispatcher.handle_event(connect(1));

        assert_eq!(dispatcher.handle_event(write(1, b"boom")), DispatchOutcome::CallbackFault);
        // registry untouched and later events still processed
        assert_eq!(context.sessions().count(), 1);
        assert_eq!(dispatcher.handle_event(disconnect(1)), DispatchOutcome::SessionClosed);
        assert!(context.sessions().is_empty());
    }

    #[test]
    fn last_registered_callback_wins() {
        let (_, context, dispatcher) = setup();
        let first = recorder(&context);
        let second = recorder(&context);
        dispatcher.handle_event(connect(1));

        dispatcher.handle_event(write(1, b"x"));
        assert!(first.lock().unwrap().is_empty());
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[test]
    fn callback_can_notify_from_inside_dispatch() {
        let (stack, context, dispatcher) = setup();
        let notifier = context.notifier();
        context.set_write_callback(Arc::new(move |text: &str| {
            notifier.send_data(format!("Echo: {text}"));
        }));
        dispatcher.handle_event(connect(1));

        assert_eq!(dispatcher.handle_event(write(1, b"echo-me")), DispatchOutcome::Delivered);
        let sent = stack.notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, NotifyTarget::Broadcast);
        assert_eq!(sent[0].value, b"Echo: echo-me".to_vec());
    }

    #[test]
    fn read_requests_pass_through() {
        let (_, _, dispatcher) = setup();
        let event = PeripheralEvent::CharacteristicReadRequest {
            connection: ConnectionHandle(1),
            characteristic: CharacteristicHandle(1),
        };
        assert_eq!(dispatcher.handle_event(event), DispatchOutcome::PassedThrough);
    }

    #[tokio::test]
    async fn subscription_updates_leave_sessions_alone() {
        let (stack, context, dispatcher) = setup();
        let (sender_tx, mut receiver_rx) = tokio::sync::mpsc::channel(8);
        stack.on_event(sender_tx);
        dispatcher.handle_event(connect(1));

        stack.subscribe(ConnectionHandle(1), RX, true).unwrap();
        stack.subscribe(ConnectionHandle(7), RX, false).unwrap();
        for _ in 0..2 {
            let event = receiver_rx.recv().await.unwrap();
            assert_eq!(dispatcher.handle_event(event), DispatchOutcome::PassedThrough);
        }
        assert_eq!(context.sessions().connections(), vec![ConnectionHandle(1)]);
    }

    #[tokio::test]
    async fn run_drains_channel_until_closed() {
        let (_, context, dispatcher) = setup();
        let (sender_tx, receiver_rx) = tokio::sync::mpsc::channel(8);
        sender_tx.send(connect(1)).await.unwrap();
        sender_tx.send(connect(2)).await.unwrap();
        sender_tx.send(disconnect(1)).await.unwrap();
        drop(sender_tx);

        dispatcher.run(receiver_rx).await;
        assert_eq!(context.sessions().connections(), vec![ConnectionHandle(2)]);
    }

    #[tokio::test]
    async fn queued_writes_keep_their_own_payloads() {
        let (stack, context, dispatcher) = setup();
        let seen = recorder(&context);
        let (sender_tx, receiver_rx) = tokio::sync::mpsc::channel(8);
        stack.on_event(sender_tx);

        stack.connect(ConnectionHandle(1)).unwrap();
        stack.write(ConnectionHandle(1), RX, b"first").unwrap();
        stack.write(ConnectionHandle(1), RX, b"second").unwrap();
        stack.detach();

        dispatcher.run(receiver_rx).await;
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[tokio::test]
    async fn write_queued_before_disconnect_still_completes() {
        let (_, context, dispatcher) = setup();
        let seen = recorder(&context);
        let (sender_tx, receiver_rx) = tokio::sync::mpsc::channel(8);
        sender_tx.send(connect(1)).await.unwrap();
        sender_tx.send(write(1, b"last words")).await.unwrap();
        sender_tx.send(disconnect(1)).await.unwrap();
        drop(sender_tx);

        dispatcher.run(receiver_rx).await;
        assert_eq!(*seen.lock().unwrap(), vec!["last words".to_string()]);
        assert_eq!(context.sessions().count(), 0);
    }
}
