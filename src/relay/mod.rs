// ControlRelay - engine status messages to the host, host input to the engine

pub mod dispatcher;
pub mod input;
pub mod messages;

pub use dispatcher::{relay, Dispatcher, ListenerSlot, RelaySender};
pub use input::{ExitFlag, InputRelay, KeyPhase, KeyRouting, PointerAction};
pub use messages::{
    BridgeEventListener, ControlKind, ControlMessage, ControlMode, HostEvent, NativeScriptError,
    UserMessage,
};
