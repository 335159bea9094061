// Messages crossing from the engine thread to the host's main context

use std::fmt;

use crate::storage::ResourceLocator;

/// Auto-advance mode toggle
pub const MSG_AUTO_MODE: i32 = 1;
/// Skip mode toggle
pub const MSG_SKIP_MODE: i32 = 2;
/// Single-page mode toggle
pub const MSG_SINGLE_PAGE_MODE: i32 = 3;
/// Ids at or above this are user notifications, below it control toggles
pub const USER_MESSAGE_THRESHOLD: i32 = 4;
/// Save data failed to load
pub const MSG_CORRUPT_SAVE_FILE: i32 = 4;

/// Control mode carried by ids below [`USER_MESSAGE_THRESHOLD`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Auto,
    Skip,
    SinglePage,
}

/// User-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserMessage {
    CorruptSaveFile,
    /// Id the table does not name; still delivered
    Other(i32),
}

impl UserMessage {
    pub fn from_id(id: i32) -> Self {
        match id {
            MSG_CORRUPT_SAVE_FILE => UserMessage::CorruptSaveFile,
            other => UserMessage::Other(other),
        }
    }
}

/// Engine status value: `(id, flag)` as posted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMessage {
    pub id: i32,
    pub flag: bool,
}

/// Decoded form of a [`ControlMessage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Mode(ControlMode, bool),
    User(UserMessage),
    /// Below the threshold but not a known mode
    Unknown(i32),
}

impl ControlMessage {
    pub fn new(id: i32, flag: bool) -> Self {
        Self { id, flag }
    }

    pub fn kind(&self) -> ControlKind {
        if self.id >= USER_MESSAGE_THRESHOLD {
            return ControlKind::User(UserMessage::from_id(self.id));
        }
        match self.id {
            MSG_AUTO_MODE => ControlKind::Mode(ControlMode::Auto, self.flag),
            MSG_SKIP_MODE => ControlKind::Mode(ControlMode::Skip, self.flag),
            MSG_SINGLE_PAGE_MODE => ControlKind::Mode(ControlMode::SinglePage, self.flag),
            other => ControlKind::Unknown(other),
        }
    }
}

/// Fault reported by the engine while running a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeScriptError {
    pub message: String,
    /// Script line being executed, when the engine knows it
    pub current_line: Option<String>,
    pub backtrace: String,
}

impl fmt::Display for NativeScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.current_line {
            Some(line) => write!(f, "{}\nCurrent line: {}\n{}", self.message, line, self.backtrace),
            None => write!(f, "{}\n{}", self.message, self.backtrace),
        }
    }
}

impl std::error::Error for NativeScriptError {}

/// Everything the dispatcher delivers on the main context
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Control(ControlMessage),
    NativeError(NativeScriptError),
    GameFinished,
}

/// Host listener, one method per event
///
/// Called on the host's main sequential context, except
/// `video_requested` which runs synchronously on the engine thread and may
/// overlap with the others. Implementations keep their own state behind
/// interior mutability.
pub trait BridgeEventListener: Send + Sync {
    fn auto_state_changed(&self, selected: bool);
    fn skip_state_changed(&self, selected: bool);
    fn single_page_state_changed(&self, selected: bool);
    fn video_requested(&self, video: &ResourceLocator, click_to_skip: bool, should_loop: bool);
    fn on_native_error(&self, error: &NativeScriptError);
    fn on_user_message(&self, message: UserMessage);
    fn on_game_finished(&self);
}
