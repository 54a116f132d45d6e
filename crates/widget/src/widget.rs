use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use chatpane_client::{ChatBackend, DocumentRef, UploadFile};
use snafu::ensure;

use crate::attachments::AttachmentManager;
use crate::chat::{InputController, InputEvent, Renderer, Role, StreamConsumer, StreamOutcome};
use crate::error::{EmptyMessageSnafu, RequestInFlightSnafu, WidgetResult};
use crate::session::SessionState;
use crate::settings::WidgetSettings;
use crate::surface::SharedSurface;

/// Clears the in-flight flag when a send ends, however it ends.
struct InFlightGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a Cell<bool>) -> WidgetResult<Self> {
        ensure!(!flag.get(), RequestInFlightSnafu { stage: "send" });
        flag.set(true);
        Ok(Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// The assembled chat pane: input, transcript, streaming and attachments
/// sharing one surface and one session.
pub struct ChatWidget {
    renderer: Rc<RefCell<Renderer>>,
    session: Rc<SessionState>,
    consumer: StreamConsumer,
    attachments: AttachmentManager,
    input: RefCell<InputController>,
    in_flight: Cell<bool>,
}

impl ChatWidget {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        surface: SharedSurface,
        settings: &WidgetSettings,
    ) -> Self {
        let renderer = Rc::new(RefCell::new(
            Renderer::new(surface.clone()).with_placeholder_text(&settings.placeholder_text),
        ));
        let session = Rc::new(SessionState::new());
        let consumer = StreamConsumer::new(backend.clone(), renderer.clone(), session.clone())
            .with_stream_requests(settings.stream);
        let attachments = AttachmentManager::new(backend, session.clone(), surface);

        Self {
            renderer,
            session,
            consumer,
            attachments,
            input: RefCell::new(InputController::new()),
            in_flight: Cell::new(false),
        }
    }

    pub fn renderer(&self) -> Ref<'_, Renderer> {
        self.renderer.borrow()
    }

    pub fn documents(&self) -> Vec<DocumentRef> {
        self.session.documents()
    }

    pub fn is_request_in_flight(&self) -> bool {
        self.in_flight.get()
    }

    pub fn input_value(&self) -> String {
        self.input.borrow().value().to_string()
    }

    /// Renders the user message and a placeholder, then streams the reply.
    ///
    /// Rejected with `RequestInFlight` while another send is active.
    pub async fn send(&self, text: &str) -> WidgetResult<StreamOutcome> {
        let content = text.trim();
        ensure!(!content.is_empty(), EmptyMessageSnafu { stage: "send" });
        let _guard = InFlightGuard::acquire(&self.in_flight)?;

        let placeholder = {
            let mut renderer = self.renderer.borrow_mut();
            renderer.create_message(Role::User, content, false);
            renderer.create_message(Role::Assistant, "", true)
        };

        Ok(self.consumer.run(content, placeholder).await)
    }

    /// Routes one input event; a resulting submission is sent immediately.
    pub async fn handle_input(&self, event: InputEvent) -> WidgetResult<Option<StreamOutcome>> {
        let submit = {
            let mut input = self.input.borrow_mut();
            input.set_streaming(self.in_flight.get());
            input.handle(event)
        };

        match submit {
            Some(submit) => self.send(&submit.content).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn upload(&self, files: Vec<UploadFile>) -> WidgetResult<Vec<DocumentRef>> {
        self.attachments.upload(files).await
    }

    pub async fn delete_document(&self, document_id: &str) -> WidgetResult<bool> {
        self.attachments.delete(document_id).await
    }

    /// Forwards a scroll position report from the host display.
    pub fn observe_scroll(&self, offset: f32, max_offset: f32) {
        self.renderer.borrow_mut().observe_scroll(offset, max_offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{Key, MessageStatus};
    use crate::error::WidgetError;
    use crate::surface::{HtmlSurface, PENDING_CLASS};
    use crate::testing::{ScriptedBackend, ScriptedChat, http_status};

    fn widget(backend: ScriptedBackend) -> (Rc<RefCell<HtmlSurface>>, Arc<ScriptedBackend>, ChatWidget) {
        let surface = Rc::new(RefCell::new(HtmlSurface::new()));
        let backend = Arc::new(backend);
        let widget = ChatWidget::new(backend.clone(), surface.clone(), &WidgetSettings::default());
        (surface, backend, widget)
    }

    #[tokio::test]
    async fn send_renders_user_message_then_reply() {
        let (surface, _, widget) = widget(
            ScriptedBackend::new()
                .with_chat(ScriptedChat::text_plain(&[b"data: Hi **there**\n\ndata: [DONE]\n\n"])),
        );
        let outcome = widget.send("  hello  ").await.expect("send");
        assert!(!outcome.is_failed());

        let surface = surface.borrow();
        let nodes = surface.messages();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].role, Role::User);
        assert_eq!(nodes[0].markup, "hello");
        assert_eq!(nodes[1].markup, "Hi <strong>there</strong>");
        assert!(!nodes[1].has_class(PENDING_CLASS));
        assert!(!widget.is_request_in_flight());
    }

    #[tokio::test]
    async fn empty_send_is_rejected_without_rendering() {
        let (surface, backend, widget) = widget(ScriptedBackend::new());
        assert!(matches!(
            widget.send("   ").await,
            Err(WidgetError::EmptyMessage { .. })
        ));
        assert!(surface.borrow().messages().is_empty());
        assert!(backend.chat_requests().is_empty());
    }

    #[tokio::test]
    async fn second_send_is_rejected_while_first_is_streaming() {
        let (surface, backend, widget) = widget(ScriptedBackend::new().with_chat(
            ScriptedChat::text_plain(&[b"data: a\n\n", b"data: b\n\n", b"data: [DONE]\n\n"]),
        ));

        let (first, second) = futures::join!(widget.send("one"), widget.send("two"));
        assert!(matches!(
            first,
            Ok(StreamOutcome::Completed { ref text }) if text == "ab"
        ));
        assert!(matches!(second, Err(WidgetError::RequestInFlight { .. })));
        assert_eq!(backend.chat_requests().len(), 1);
        assert_eq!(surface.borrow().messages().len(), 2);
        assert!(!widget.is_request_in_flight());
    }

    #[tokio::test]
    async fn flag_is_released_after_a_failed_send() {
        let (_, _, widget) = widget(
            ScriptedBackend::new()
                .with_chat(ScriptedChat::Fail(http_status(500)))
                .with_chat(ScriptedChat::json(r#"{"response":"ok"}"#)),
        );
        assert!(widget.send("one").await.expect("send").is_failed());
        assert!(!widget.send("two").await.expect("send").is_failed());

        let renderer = widget.renderer();
        let statuses: Vec<_> = renderer
            .messages()
            .iter()
            .filter(|message| message.role == Role::Assistant)
            .map(|message| message.status())
            .collect();
        assert_eq!(
            statuses,
            vec![
                MessageStatus::Error("server responded with status 500".to_string()),
                MessageStatus::Done
            ]
        );
    }

    #[tokio::test]
    async fn enter_key_submits_the_draft() {
        let (_, backend, widget) = widget(
            ScriptedBackend::new().with_chat(ScriptedChat::json(r#"{"response":"pong"}"#)),
        );
        widget
            .handle_input(InputEvent::Edit("ping".to_string()))
            .await
            .expect("edit");
        let outcome = widget
            .handle_input(InputEvent::KeyPress {
                key: Key::Enter,
                shift: false,
            })
            .await
            .expect("submit");

        assert_eq!(
            outcome,
            Some(StreamOutcome::Completed {
                text: "pong".to_string()
            })
        );
        assert_eq!(backend.chat_requests()[0].message, "ping");
        assert_eq!(widget.input_value(), "");
    }
}
