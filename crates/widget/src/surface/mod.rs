//! Display abstraction the renderer and attachment manager draw into.

use std::cell::RefCell;
use std::rc::Rc;

use chatpane_client::DocumentRef;

use crate::chat::message::{MessageId, Role};

mod html;
mod terminal;

pub use html::{ChipNode, HtmlSurface, MessageNode};
pub use terminal::{TerminalSurface, markup_to_plain_text};

/// Class present on a message while it awaits stream data.
pub const PENDING_CLASS: &str = "pending";
/// Class marking a message that ended in an error.
pub const ERROR_CLASS: &str = "error";

/// Host display. Every call is applied immediately and in order.
pub trait Surface {
    fn append_message(&mut self, id: MessageId, role: Role, markup: &str, classes: &[&str]);
    fn replace_content(&mut self, id: MessageId, markup: &str);
    fn set_class(&mut self, id: MessageId, class: &str, enabled: bool);
    fn scroll_to_bottom(&mut self);
    fn append_chip(&mut self, document: &DocumentRef);
    fn remove_chip(&mut self, document_id: &str);
    /// Blocking, side-channel notification (attachment failures).
    fn alert(&mut self, message: &str);
}

/// Single-threaded shared handle to the display.
pub type SharedSurface = Rc<RefCell<dyn Surface>>;
