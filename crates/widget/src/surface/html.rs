use std::fmt::Write as _;

use chatpane_client::DocumentRef;

use super::Surface;
use crate::chat::message::{MessageId, Role};
use crate::formatter::escape_html;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageNode {
    pub id: MessageId,
    pub role: Role,
    pub markup: String,
    pub classes: Vec<String>,
}

impl MessageNode {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|candidate| candidate == class)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipNode {
    pub document_id: String,
    pub filename: String,
}

/// In-memory DOM: an ordered message list plus the document chip list.
#[derive(Debug, Default)]
pub struct HtmlSurface {
    messages: Vec<MessageNode>,
    chips: Vec<ChipNode>,
    alerts: Vec<String>,
    scroll_requests: usize,
    content_writes: usize,
}

impl HtmlSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[MessageNode] {
        &self.messages
    }

    pub fn message(&self, id: MessageId) -> Option<&MessageNode> {
        self.messages.iter().find(|node| node.id == id)
    }

    pub fn chips(&self) -> &[ChipNode] {
        &self.chips
    }

    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    pub fn scroll_requests(&self) -> usize {
        self.scroll_requests
    }

    /// Number of `replace_content` calls seen so far.
    pub fn content_writes(&self) -> usize {
        self.content_writes
    }

    fn message_mut(&mut self, id: MessageId) -> Option<&mut MessageNode> {
        self.messages.iter_mut().find(|node| node.id == id)
    }

    /// Serializes the transcript and chip list as an HTML fragment.
    pub fn render_html(&self) -> String {
        let mut html = String::from("<div id=\"chat-output\">");
        for node in &self.messages {
            let mut classes = vec!["message", node.role.css_class()];
            classes.extend(node.classes.iter().map(String::as_str));
            let _ = write!(
                html,
                "<div class=\"{}\" data-message-id=\"{}\">{}</div>",
                classes.join(" "),
                node.id.0,
                node.markup
            );
        }
        html.push_str("</div><div id=\"document-list\">");
        for chip in &self.chips {
            let document_id = escape_html(&chip.document_id);
            let _ = write!(
                html,
                "<span class=\"document-chip\" data-document-id=\"{document_id}\">{}<button class=\"delete-document\" data-document-id=\"{document_id}\">×</button></span>",
                escape_html(&chip.filename),
            );
        }
        html.push_str("</div>");
        html
    }
}

impl Surface for HtmlSurface {
    fn append_message(&mut self, id: MessageId, role: Role, markup: &str, classes: &[&str]) {
        self.messages.push(MessageNode {
            id,
            role,
            markup: markup.to_string(),
            classes: classes.iter().map(|class| class.to_string()).collect(),
        });
    }

    fn replace_content(&mut self, id: MessageId, markup: &str) {
        self.content_writes += 1;
        if let Some(node) = self.message_mut(id) {
            node.markup = markup.to_string();
        }
    }

    fn set_class(&mut self, id: MessageId, class: &str, enabled: bool) {
        let Some(node) = self.message_mut(id) else {
            return;
        };
        let present = node.has_class(class);
        if enabled && !present {
            node.classes.push(class.to_string());
        } else if !enabled && present {
            node.classes.retain(|candidate| candidate != class);
        }
    }

    fn scroll_to_bottom(&mut self) {
        self.scroll_requests += 1;
    }

    fn append_chip(&mut self, document: &DocumentRef) {
        self.chips.push(ChipNode {
            document_id: document.id.clone(),
            filename: document.filename.clone(),
        });
    }

    fn remove_chip(&mut self, document_id: &str) {
        self.chips.retain(|chip| chip.document_id != document_id);
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }
}
