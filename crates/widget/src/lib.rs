#![deny(unsafe_code)]

//! Embeddable chat pane: streams backend replies into a transcript and
//! manages documents attached to the conversation.

pub mod attachments;
/// Message model, stream decoding and the reply consumer.
pub mod chat;
pub mod command;
pub mod error;
/// Text to display markup, including reasoning detection.
pub mod formatter;
pub mod session;
/// Persisted widget settings.
pub mod settings;
pub mod surface;
pub mod widget;

#[cfg(test)]
mod testing;

pub use attachments::AttachmentManager;
pub use error::{RenderError, RenderResult, WidgetError, WidgetResult};
pub use session::SessionState;
pub use widget::ChatWidget;
