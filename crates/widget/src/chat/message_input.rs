use crate::chat::events::Submit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Backspace,
    Char(char),
}

/// Raw input the host forwards from the text box and send button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// The whole input value changed (typing, paste, programmatic set).
    Edit(String),
    KeyPress { key: Key, shift: bool },
    SendClicked,
}

/// Holds the draft prompt and turns key presses into submissions.
#[derive(Debug, Default)]
pub struct InputController {
    value: String,
    is_streaming: bool,
}

impl InputController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        self.is_streaming = streaming;
    }

    pub fn clear(&mut self) {
        self.value.clear();
    }

    /// Applies one event. Returns a submission when the draft was sent.
    pub fn handle(&mut self, event: InputEvent) -> Option<Submit> {
        match event {
            InputEvent::Edit(value) => {
                self.value = value;
                None
            }
            InputEvent::KeyPress {
                key: Key::Enter,
                shift: true,
            } => {
                if !self.is_streaming {
                    self.value.push('\n');
                }
                None
            }
            InputEvent::KeyPress {
                key: Key::Enter,
                shift: false,
            }
            | InputEvent::SendClicked => self.handle_submit(),
            InputEvent::KeyPress {
                key: Key::Backspace,
                ..
            } => {
                self.value.pop();
                None
            }
            InputEvent::KeyPress {
                key: Key::Char(ch), ..
            } => {
                self.value.push(ch);
                None
            }
        }
    }

    fn handle_submit(&mut self) -> Option<Submit> {
        if self.is_streaming {
            tracing::debug!("submit ignored while a reply is streaming");
            return None;
        }

        let content = self.value.trim();
        if content.is_empty() {
            return None;
        }

        let submit = Submit::new(content);
        self.clear();
        Some(submit)
    }
}
