//! Ordered engine -> host message relay
//!
//! ```text
//! engine thread                       host main context
//! RelaySender::post_*()  ──unbounded mpsc──>  Dispatcher::drain() / run()
//!                                               └─> BridgeEventListener
//! ```
//!
//! The queue is unbounded and strictly FIFO, nothing is dropped on the way.
//! Mode toggles and user messages are checked against the exit flag when
//! they are posted, so whatever the engine sent before finishing still
//! reaches the host.
//!
//! The listener lives in a [`ListenerSlot`] the host clears explicitly at
//! teardown; events delivered to an empty slot are logged and discarded.
//! Listener methods run outside the slot lock, so a long `video_requested`
//! on the engine thread never holds up `drain`, `set` or `clear`.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, warn};

use super::input::ExitFlag;
use super::messages::{
    BridgeEventListener, ControlKind, ControlMessage, ControlMode, HostEvent, NativeScriptError,
};

type SharedListener = Arc<dyn BridgeEventListener>;

/// Registered host listener, shared by the dispatcher and the host view
#[derive(Clone, Default)]
pub struct ListenerSlot(Arc<Mutex<Option<SharedListener>>>);

impl ListenerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<SharedListener>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set(&self, listener: SharedListener) {
        *self.lock() = Some(listener);
    }

    /// Unregister; returns the previous listener
    ///
    /// A call already in progress on another thread runs to completion,
    /// nothing new is delivered.
    pub fn clear(&self) -> Option<SharedListener> {
        self.lock().take()
    }

    pub fn is_set(&self) -> bool {
        self.lock().is_some()
    }

    /// Run `f` against the listener, if one is registered
    pub fn with<R>(&self, f: impl FnOnce(&dyn BridgeEventListener) -> R) -> Option<R> {
        let listener = self.lock().clone()?;
        Some(f(listener.as_ref()))
    }
}

/// Engine-thread side of the relay
#[derive(Clone)]
pub struct RelaySender {
    tx: mpsc::UnboundedSender<HostEvent>,
    exit: ExitFlag,
}

impl RelaySender {
    /// `receiveMessage(mode, flag)` from the engine
    ///
    /// Dropped here, not at delivery, once the exit flag is set.
    pub fn post_control(&self, id: i32, flag: bool) -> bool {
        if self.exit.is_set() {
            debug!(id, flag, "control message after exit ignored");
            return false;
        }
        self.post(HostEvent::Control(ControlMessage::new(id, flag)))
    }

    pub fn post_native_error(&self, error: NativeScriptError) -> bool {
        self.post(HostEvent::NativeError(error))
    }

    pub fn post_game_finished(&self) -> bool {
        self.post(HostEvent::GameFinished)
    }

    /// False only once the dispatcher is gone
    pub fn post(&self, event: HostEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                warn!(?event, "dispatcher closed, event not delivered");
                false
            }
        }
    }
}

/// Main-context side of the relay
pub struct Dispatcher {
    rx: mpsc::UnboundedReceiver<HostEvent>,
    listener: ListenerSlot,
}

/// Create a connected sender/dispatcher pair
pub fn relay(listener: ListenerSlot, exit: ExitFlag) -> (RelaySender, Dispatcher) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RelaySender { tx, exit }, Dispatcher { rx, listener })
}

impl Dispatcher {
    pub fn listener(&self) -> &ListenerSlot {
        &self.listener
    }

    /// Deliver everything queued so far, in post order; returns the count
    ///
    /// For hosts that pump their own main loop.
    pub fn drain(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.deliver(event);
            delivered += 1;
        }
        delivered
    }

    /// Deliver events until every sender is dropped
    ///
    /// For hosts whose main context is a tokio runtime.
    pub async fn run(self) {
        let Dispatcher { rx, listener } = self;
        let mut events = UnboundedReceiverStream::new(rx);
        while let Some(event) = events.next().await {
            deliver(&listener, event);
        }
        debug!("relay closed, dispatcher exiting");
    }

    fn deliver(&self, event: HostEvent) {
        deliver(&self.listener, event);
    }
}

fn deliver(listener: &ListenerSlot, event: HostEvent) {
    match event {
        HostEvent::Control(message) => deliver_control(listener, message),
        HostEvent::NativeError(err) => {
            match &err.current_line {
                Some(line) => error!(
                    "{}\nCurrent line: {}\n{}",
                    err.message, line, err.backtrace
                ),
                None => error!("{}\n{}", err.message, err.backtrace),
            }
            if listener.with(|l| l.on_native_error(&err)).is_none() {
                warn!("native error with no listener registered");
            }
        }
        HostEvent::GameFinished => {
            if listener.with(|l| l.on_game_finished()).is_none() {
                debug!("game finished with no listener registered");
            }
        }
    }
}

fn deliver_control(listener: &ListenerSlot, message: ControlMessage) {
    let delivered = match message.kind() {
        ControlKind::Mode(mode, flag) => listener.with(|l| match mode {
            ControlMode::Auto => l.auto_state_changed(flag),
            ControlMode::Skip => l.skip_state_changed(flag),
            ControlMode::SinglePage => l.single_page_state_changed(flag),
        }),
        ControlKind::User(user) => listener.with(|l| l.on_user_message(user)),
        ControlKind::Unknown(id) => {
            warn!(id, flag = message.flag, "unknown control mode");
            return;
        }
    };
    if delivered.is_none() {
        debug!(id = message.id, "control message with no listener registered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::messages::{UserMessage, MSG_AUTO_MODE, MSG_SKIP_MODE};
    use crate::storage::ResourceLocator;

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        Auto(bool),
        Skip(bool),
        SinglePage(bool),
        User(UserMessage),
        Error(String),
        Finished,
    }

    struct Recorder(Arc<Mutex<Vec<Seen>>>);

    impl BridgeEventListener for Recorder {
        fn auto_state_changed(&self, selected: bool) {
            self.0.lock().unwrap().push(Seen::Auto(selected));
        }
        fn skip_state_changed(&self, selected: bool) {
            self.0.lock().unwrap().push(Seen::Skip(selected));
        }
        fn single_page_state_changed(&self, selected: bool) {
            self.0.lock().unwrap().push(Seen::SinglePage(selected));
        }
        fn video_requested(&self, _: &ResourceLocator, _: bool, _: bool) {}
        fn on_native_error(&self, error: &NativeScriptError) {
            self.0.lock().unwrap().push(Seen::Error(error.message.clone()));
        }
        fn on_user_message(&self, message: UserMessage) {
            self.0.lock().unwrap().push(Seen::User(message));
        }
        fn on_game_finished(&self) {
            self.0.lock().unwrap().push(Seen::Finished);
        }
    }

    fn setup() -> (Arc<Mutex<Vec<Seen>>>, ExitFlag, RelaySender, Dispatcher) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let slot = ListenerSlot::new();
        slot.set(Arc::new(Recorder(seen.clone())));
        let exit = ExitFlag::new();
        let (tx, dispatcher) = relay(slot, exit.clone());
        (seen, exit, tx, dispatcher)
    }

    #[test]
    fn test_order_and_payloads_preserved() {
        let (seen, _, tx, mut dispatcher) = setup();
        tx.post_control(MSG_AUTO_MODE, true);
        tx.post_control(MSG_SKIP_MODE, true);
        tx.post_control(MSG_AUTO_MODE, false);

        assert_eq!(dispatcher.drain(), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Seen::Auto(true), Seen::Skip(true), Seen::Auto(false)]
        );
    }

    #[test]
    fn test_user_messages_mapped() {
        let (seen, _, tx, mut dispatcher) = setup();
        tx.post_control(4, false);
        tx.post_control(3, true);
        tx.post_control(7, false);
        dispatcher.drain();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Seen::User(UserMessage::CorruptSaveFile),
                Seen::SinglePage(true),
                Seen::User(UserMessage::Other(7)),
            ]
        );
    }

    #[test]
    fn test_cleared_listener_receives_nothing() {
        let (seen, _, tx, mut dispatcher) = setup();
        dispatcher.listener().clear();
        tx.post_control(MSG_AUTO_MODE, true);
        tx.post_game_finished();
        assert_eq!(dispatcher.drain(), 2);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_faults_and_finish_delivered_after_exit() {
        let (seen, exit, tx, mut dispatcher) = setup();
        exit.set();
        assert!(!tx.post_control(MSG_SKIP_MODE, true));
        tx.post_native_error(NativeScriptError {
            message: "bad script".to_string(),
            current_line: None,
            backtrace: String::new(),
        });
        tx.post_game_finished();
        dispatcher.drain();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Seen::Error("bad script".to_string()), Seen::Finished]
        );
    }

    #[test]
    fn test_controls_posted_before_finish_survive_it() {
        let (seen, exit, tx, mut dispatcher) = setup();
        tx.post_control(MSG_AUTO_MODE, true);
        tx.post_control(4, false);
        // engine finishes before the host gets to drain
        exit.set();
        tx.post_game_finished();
        tx.post_control(MSG_AUTO_MODE, false);

        assert_eq!(dispatcher.drain(), 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Seen::Auto(true),
                Seen::User(UserMessage::CorruptSaveFile),
                Seen::Finished,
            ]
        );
    }

    #[test]
    fn test_slot_usable_while_listener_call_in_flight() {
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (finish_tx, finish_rx) = std::sync::mpsc::channel::<()>();
        let slot = ListenerSlot::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        slot.set(Arc::new(Recorder(seen.clone())));

        let busy = slot.clone();
        let worker = std::thread::spawn(move || {
            busy.with(|_| {
                started_tx.send(()).unwrap();
                finish_rx.recv().unwrap();
            })
        });
        started_rx.recv().unwrap();

        assert!(slot.is_set());
        assert!(slot.with(|l| l.auto_state_changed(true)).is_some());
        assert!(slot.clear().is_some());
        assert!(slot.with(|l| l.auto_state_changed(false)).is_none());

        finish_tx.send(()).unwrap();
        assert_eq!(worker.join().unwrap(), Some(()));
        assert_eq!(*seen.lock().unwrap(), vec![Seen::Auto(true)]);
    }

    #[tokio::test]
    async fn test_run_delivers_until_senders_drop() {
        let (seen, _, tx, dispatcher) = setup();
        let producer = std::thread::spawn(move || {
            for i in 0..50 {
                tx.post_control(MSG_AUTO_MODE, i % 2 == 0);
            }
        });
        producer.join().unwrap();
        dispatcher.run().await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 50);
        for (i, event) in seen.iter().enumerate() {
            assert_eq!(*event, Seen::Auto(i % 2 == 0));
        }
    }
}
