pub mod consumer;
pub mod decoder;
/// Event and wire-frame contracts.
pub mod events;
/// Message entities and the request lifecycle state machine.
pub mod message;
pub mod message_input;
pub mod renderer;
pub mod scroll_manager;

pub use consumer::StreamConsumer;
pub use decoder::{FrameSplitter, Utf8StreamDecoder, detect_mode};
pub use events::{StreamFrame, StreamOutcome, Submit};
pub use message::{
    Message, MessageId, MessageStatus, Role, StreamMode, StreamState, StreamTransition,
    StreamTransitionRejection, StreamTransitionResult,
};
pub use message_input::{InputController, InputEvent, Key};
pub use renderer::{DEFAULT_PLACEHOLDER_TEXT, Renderer};
pub use scroll_manager::ScrollFollow;
