use snafu::ensure;

use crate::chat::message::{Message, MessageId, Role};
use crate::chat::scroll_manager::ScrollFollow;
use crate::error::{AlreadyFinalizedSnafu, FinalizedSnafu, RenderResult, UnknownMessageSnafu};
use crate::formatter::{self, escape_html};
use crate::surface::{ERROR_CLASS, PENDING_CLASS, SharedSurface};

pub const DEFAULT_PLACEHOLDER_TEXT: &str = "Thinking...";

/// Owns every message and its node on the surface.
///
/// Callers address messages only through the [`MessageId`] returned by
/// [`Renderer::create_message`].
pub struct Renderer {
    surface: SharedSurface,
    messages: Vec<Message>,
    next_message_id: u64,
    scroll: ScrollFollow,
    placeholder_text: String,
}

impl Renderer {
    pub fn new(surface: SharedSurface) -> Self {
        Self {
            surface,
            messages: Vec::new(),
            next_message_id: 1,
            scroll: ScrollFollow::new(),
            placeholder_text: DEFAULT_PLACEHOLDER_TEXT.to_string(),
        }
    }

    pub fn with_placeholder_text(mut self, placeholder_text: impl Into<String>) -> Self {
        self.placeholder_text = placeholder_text.into();
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn pending_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|message| message.is_pending)
            .count()
    }

    /// Forwards one scroll position report from the host display.
    pub fn observe_scroll(&mut self, offset: f32, max_offset: f32) {
        self.scroll.observe(offset, max_offset);
    }

    pub fn is_following_bottom(&self) -> bool {
        self.scroll.is_following_bottom()
    }

    /// Appends a message node. Pending messages show the placeholder text
    /// instead of formatted content.
    pub fn create_message(&mut self, role: Role, text: &str, pending: bool) -> MessageId {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id += 1;

        let markup = if pending {
            escape_html(&self.placeholder_text)
        } else {
            formatter::format(text)
        };
        let classes: &[&str] = if pending { &[PENDING_CLASS] } else { &[] };

        self.messages.push(Message::new(id, role, text, pending));
        self.surface
            .borrow_mut()
            .append_message(id, role, &markup, classes);

        // Sending always jumps to the tail; assistant output respects manual scroll.
        match role {
            Role::User => self.scroll.request_scroll_to_bottom(),
            Role::Assistant => self.scroll.request_scroll_to_bottom_if_following(),
        }
        self.apply_scroll();

        tracing::debug!(message_id = %id, role = ?role, pending, "created message");
        id
    }

    /// Replaces the rendered content with `format(text)`.
    pub fn update_text(&mut self, id: MessageId, text: &str) -> RenderResult<()> {
        let message = find_mutable(&mut self.messages, id, "update-text")?;
        message.text = text.to_string();

        self.surface
            .borrow_mut()
            .replace_content(id, &formatter::format(text));
        self.scroll.request_scroll_to_bottom_if_following();
        self.apply_scroll();
        Ok(())
    }

    /// Renders `Error: <description>` literally and marks the node errored.
    pub fn show_error(&mut self, id: MessageId, description: &str) -> RenderResult<()> {
        let message = find_mutable(&mut self.messages, id, "show-error")?;
        message.text = format!("Error: {description}");
        message.error = Some(description.to_string());
        let markup = escape_html(&message.text);

        {
            let mut surface = self.surface.borrow_mut();
            surface.replace_content(id, &markup);
            surface.set_class(id, ERROR_CLASS, true);
        }
        self.scroll.request_scroll_to_bottom_if_following();
        self.apply_scroll();

        tracing::warn!(message_id = %id, error = %description, "message ended with an error");
        Ok(())
    }

    /// Clears the pending state. Valid exactly once per pending message.
    pub fn finalize(&mut self, id: MessageId) -> RenderResult<()> {
        let Some(message) = self.messages.iter_mut().find(|message| message.id == id) else {
            return UnknownMessageSnafu {
                stage: "finalize",
                id,
            }
            .fail();
        };
        ensure!(
            message.is_pending,
            AlreadyFinalizedSnafu {
                stage: "finalize",
                id,
            }
        );

        message.is_pending = false;
        self.surface
            .borrow_mut()
            .set_class(id, PENDING_CLASS, false);

        tracing::debug!(message_id = %id, errored = message.error.is_some(), "finalized message");
        Ok(())
    }

    fn apply_scroll(&mut self) {
        if self.scroll.apply_pending_scroll() {
            self.surface.borrow_mut().scroll_to_bottom();
        }
    }
}

fn find_mutable<'a>(
    messages: &'a mut [Message],
    id: MessageId,
    stage: &'static str,
) -> RenderResult<&'a mut Message> {
    let Some(message) = messages.iter_mut().find(|message| message.id == id) else {
        return UnknownMessageSnafu { stage, id }.fail();
    };
    ensure!(message.is_pending, FinalizedSnafu { stage, id });
    Ok(message)
}
