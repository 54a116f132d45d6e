/// Prefix marking a data frame in the framed protocol.
pub const DATA_PREFIX: &str = "data: ";
/// Payload that terminates a framed stream.
pub const DONE_SENTINEL: &str = "[DONE]";
/// Separator between frames.
pub const FRAME_DELIMITER: &str = "\n\n";

/// Emitted when the user submits a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub content: String,
}

impl Submit {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// One decoded unit of the framed protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Delta(String),
    Done,
}

impl StreamFrame {
    /// Parses one frame. Returns `None` for frames without the data prefix,
    /// which callers skip.
    pub fn parse(frame: &str) -> Option<Self> {
        let frame = frame.trim_start_matches(['\r', '\n']);
        let payload = frame.strip_prefix(DATA_PREFIX)?;

        if payload.trim_end_matches('\r') == DONE_SENTINEL {
            Some(Self::Done)
        } else {
            Some(Self::Delta(payload.to_string()))
        }
    }
}

/// Final result of one chat request, as rendered into its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed { text: String },
    Failed { message: String },
}

impl StreamOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
