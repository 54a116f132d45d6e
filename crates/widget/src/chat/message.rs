use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Handle to one rendered message, returned at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "msg-{}", self.0)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Style class used for the message node.
    pub fn css_class(self) -> &'static str {
        match self {
            Self::User => "user-message",
            Self::Assistant => "bot-message",
        }
    }
}

/// Lifecycle status for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStatus {
    Pending,
    Done,
    Error(String),
}

/// Renderer-owned message model.
///
/// Mutable only while `is_pending`; finalizing freezes text and status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub text: String,
    pub created_at_unix_millis: u64,
    pub is_pending: bool,
    pub error: Option<String>,
}

impl Message {
    pub fn new(id: MessageId, role: Role, text: impl Into<String>, is_pending: bool) -> Self {
        Self {
            id,
            role,
            text: text.into(),
            created_at_unix_millis: unix_millis_now(),
            is_pending,
            error: None,
        }
    }

    pub fn status(&self) -> MessageStatus {
        match (&self.error, self.is_pending) {
            (_, true) => MessageStatus::Pending,
            (Some(error), false) => MessageStatus::Error(error.clone()),
            (None, false) => MessageStatus::Done,
        }
    }
}

fn unix_millis_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// How an open response body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// `data: <payload>\n\n` frames terminated by `data: [DONE]`.
    Framed,
    /// Legacy bodies: every decoded chunk is appended as-is.
    Raw,
}

/// Lifecycle of one chat request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Sending,
    Streaming(Option<StreamMode>),
    Completed,
    Failed(String),
}

/// State transition input for the request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransition {
    Send,
    /// Response accepted as a stream; mode may still be undetected.
    Open(Option<StreamMode>),
    /// Body mode detected after the first bytes arrived.
    Detect(StreamMode),
    Complete,
    Fail(String),
}

/// Rejection reason for illegal lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransitionRejection {
    AlreadyActive { state: StreamState },
    NotSending { state: StreamState },
    NotStreaming { state: StreamState },
    AlreadyTerminal { state: StreamState },
}

/// Result type for lifecycle transition application.
pub type StreamTransitionResult = Result<StreamState, StreamTransitionRejection>;

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Sending | Self::Streaming(_))
    }

    pub fn mode(&self) -> Option<StreamMode> {
        match self {
            Self::Streaming(mode) => *mode,
            Self::Idle | Self::Sending | Self::Completed | Self::Failed(_) => None,
        }
    }

    /// Applies one transition deterministically.
    ///
    /// `Complete` and `Fail` are accepted from `Sending` as well, which is the
    /// JSON compatibility path that never opens a stream.
    pub fn apply(&self, transition: StreamTransition) -> StreamTransitionResult {
        match transition {
            StreamTransition::Send => self.apply_send(),
            StreamTransition::Open(mode) => self.apply_open(mode),
            StreamTransition::Detect(mode) => self.apply_detect(mode),
            StreamTransition::Complete => self.apply_terminal(Self::Completed),
            StreamTransition::Fail(message) => self.apply_terminal(Self::Failed(message)),
        }
    }

    fn apply_send(&self) -> StreamTransitionResult {
        match self {
            Self::Idle => Ok(Self::Sending),
            Self::Sending | Self::Streaming(_) | Self::Completed | Self::Failed(_) => {
                Err(StreamTransitionRejection::AlreadyActive {
                    state: self.clone(),
                })
            }
        }
    }

    fn apply_open(&self, mode: Option<StreamMode>) -> StreamTransitionResult {
        match self {
            Self::Sending => Ok(Self::Streaming(mode)),
            Self::Idle | Self::Streaming(_) | Self::Completed | Self::Failed(_) => {
                Err(StreamTransitionRejection::NotSending {
                    state: self.clone(),
                })
            }
        }
    }

    fn apply_detect(&self, mode: StreamMode) -> StreamTransitionResult {
        match self {
            Self::Streaming(None) => Ok(Self::Streaming(Some(mode))),
            Self::Streaming(Some(active)) if *active == mode => Ok(self.clone()),
            Self::Idle
            | Self::Sending
            | Self::Streaming(Some(_))
            | Self::Completed
            | Self::Failed(_) => Err(StreamTransitionRejection::NotStreaming {
                state: self.clone(),
            }),
        }
    }

    fn apply_terminal(&self, next: Self) -> StreamTransitionResult {
        match self {
            Self::Sending | Self::Streaming(_) => Ok(next),
            Self::Completed | Self::Failed(_) => Err(StreamTransitionRejection::AlreadyTerminal {
                state: self.clone(),
            }),
            Self::Idle => Err(StreamTransitionRejection::NotStreaming {
                state: self.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framed_request_walks_the_happy_path() {
        let state = StreamState::Idle;
        let state = state.apply(StreamTransition::Send).expect("send");
        let state = state.apply(StreamTransition::Open(None)).expect("open");
        let state = state
            .apply(StreamTransition::Detect(StreamMode::Framed))
            .expect("detect");
        assert_eq!(state.mode(), Some(StreamMode::Framed));
        let state = state.apply(StreamTransition::Complete).expect("complete");
        assert_eq!(state, StreamState::Completed);
        assert!(state.is_terminal());
    }

    #[test]
    fn json_path_completes_straight_from_sending() {
        let state = StreamState::Sending;
        assert_eq!(
            state.apply(StreamTransition::Fail("x".to_string())),
            Ok(StreamState::Failed("x".to_string()))
        );
    }

    #[test]
    fn terminal_states_reject_further_transitions() {
        let completed = StreamState::Completed;
        assert!(matches!(
            completed.apply(StreamTransition::Fail("late".to_string())),
            Err(StreamTransitionRejection::AlreadyTerminal { .. })
        ));
        assert!(matches!(
            completed.apply(StreamTransition::Send),
            Err(StreamTransitionRejection::AlreadyActive { .. })
        ));
    }

    #[test]
    fn mode_cannot_switch_once_detected() {
        let state = StreamState::Streaming(Some(StreamMode::Raw));
        assert!(state.apply(StreamTransition::Detect(StreamMode::Raw)).is_ok());
        assert!(matches!(
            state.apply(StreamTransition::Detect(StreamMode::Framed)),
            Err(StreamTransitionRejection::NotStreaming { .. })
        ));
    }

    #[test]
    fn status_reflects_pending_and_error_fields() {
        let mut message = Message::new(MessageId::new(1), Role::Assistant, "", true);
        assert_eq!(message.status(), MessageStatus::Pending);
        message.error = Some("boom".to_string());
        assert_eq!(message.status(), MessageStatus::Pending);
        message.is_pending = false;
        assert_eq!(message.status(), MessageStatus::Error("boom".to_string()));
        let user = Message::new(MessageId::new(2), Role::User, "hi", false);
        assert_eq!(user.status(), MessageStatus::Done);
    }

    #[test]
    fn role_classes_match_display_styles() {
        assert_eq!(Role::User.css_class(), "user-message");
        assert_eq!(Role::Assistant.css_class(), "bot-message");
    }
}
