use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::OnceLock;

use chatpane_client::DocumentRef;
use regex::Regex;

use super::{HtmlSurface, PENDING_CLASS, Surface};
use crate::chat::message::{MessageId, Role};
use crate::formatter::REASONING_BLOCK_CLASS;

fn tag_pattern() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]+>").expect("tag pattern is a valid literal regex"))
}

/// Reduces formatter markup to readable terminal text.
pub fn markup_to_plain_text(markup: &str) -> String {
    let opening_block = format!("<div class=\"{REASONING_BLOCK_CLASS}\">");
    let text = markup
        .replace(&opening_block, "(thinking) ")
        .replace("</div>", "\n")
        .replace("<br>", "\n");
    tag_pattern()
        .replace_all(&text, "")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "you",
        Role::Assistant => "assistant",
    }
}

/// Prints transcript changes to a terminal while mirroring them into an
/// [`HtmlSurface`]. Growth of the newest message is printed as a suffix so
/// streamed output appears in place.
pub struct TerminalSurface<W: Write> {
    out: W,
    mirror: HtmlSurface,
    printed: HashMap<MessageId, String>,
    placeholders: HashSet<MessageId>,
    tail: Option<MessageId>,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            mirror: HtmlSurface::new(),
            printed: HashMap::new(),
            placeholders: HashSet::new(),
            tail: None,
        }
    }

    pub fn mirror(&self) -> &HtmlSurface {
        &self.mirror
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(error) = result {
            tracing::warn!(error = %error, "failed to write to terminal");
        }
    }

    fn print_message(&mut self, id: MessageId, role: Role, plain: String) {
        self.emit(&format!("\n{}: {plain}", role_label(role)));
        self.printed.insert(id, plain);
        self.tail = Some(id);
    }
}

impl<W: Write> Surface for TerminalSurface<W> {
    fn append_message(&mut self, id: MessageId, role: Role, markup: &str, classes: &[&str]) {
        self.mirror.append_message(id, role, markup, classes);
        if classes.contains(&PENDING_CLASS) {
            self.placeholders.insert(id);
        }
        self.print_message(id, role, markup_to_plain_text(markup));
    }

    fn replace_content(&mut self, id: MessageId, markup: &str) {
        self.mirror.replace_content(id, markup);
        let Some(role) = self.mirror.message(id).map(|node| node.role) else {
            return;
        };

        let plain = markup_to_plain_text(markup);
        let printed = self.printed.get(&id).cloned().unwrap_or_default();
        // First real content replaces the placeholder line.
        let was_placeholder = self.placeholders.remove(&id);

        if self.tail == Some(id) && !was_placeholder && plain.starts_with(&printed) {
            let suffix = plain[printed.len()..].to_string();
            self.emit(&suffix);
            self.printed.insert(id, plain);
        } else {
            self.print_message(id, role, plain);
        }
    }

    fn set_class(&mut self, id: MessageId, class: &str, enabled: bool) {
        self.mirror.set_class(id, class, enabled);
        if class == PENDING_CLASS && !enabled {
            self.emit("\n");
        }
    }

    fn scroll_to_bottom(&mut self) {
        self.mirror.scroll_to_bottom();
    }

    fn append_chip(&mut self, document: &DocumentRef) {
        self.mirror.append_chip(document);
        self.emit(&format!(
            "\n[attached] {} ({})\n",
            document.filename, document.id
        ));
    }

    fn remove_chip(&mut self, document_id: &str) {
        self.mirror.remove_chip(document_id);
        self.emit(&format!("\n[removed] {document_id}\n"));
    }

    fn alert(&mut self, message: &str) {
        self.mirror.alert(message);
        self.emit(&format!("\n[alert] {message}\n"));
    }
}
