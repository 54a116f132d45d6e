use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use chatpane_client::{ChatBackend, ChatReply, ChatRequest, JsonReply};
use futures::StreamExt;

use crate::chat::decoder::{FrameSplitter, Utf8StreamDecoder, detect_mode};
use crate::chat::events::{StreamFrame, StreamOutcome};
use crate::chat::message::{MessageId, StreamMode, StreamState, StreamTransition};
use crate::chat::renderer::Renderer;
use crate::session::SessionState;

const UNEXPECTED_FORMAT: &str = "Unexpected response format";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Done,
}

/// Drives one chat request from send to a finalized placeholder.
///
/// The consumer holds no lock of its own: two runs may overlap and both
/// write into the shared renderer. Serializing sends is the caller's job.
pub struct StreamConsumer {
    backend: Arc<dyn ChatBackend>,
    renderer: Rc<RefCell<Renderer>>,
    session: Rc<SessionState>,
    stream_requests: bool,
}

impl StreamConsumer {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        renderer: Rc<RefCell<Renderer>>,
        session: Rc<SessionState>,
    ) -> Self {
        Self {
            backend,
            renderer,
            session,
            stream_requests: true,
        }
    }

    /// Sets the `stream` flag sent with every request.
    pub fn with_stream_requests(mut self, stream_requests: bool) -> Self {
        self.stream_requests = stream_requests;
        self
    }

    /// Sends `message` and renders the reply into `placeholder`, which must be
    /// a pending message. The placeholder is finalized exactly once on every
    /// path.
    pub async fn run(&self, message: &str, placeholder: MessageId) -> StreamOutcome {
        let mut run = StreamRun::new(placeholder, &self.renderer);
        run.transition(StreamTransition::Send);

        let request =
            ChatRequest::new(message, self.session.document_ids()).with_stream(self.stream_requests);
        tracing::info!(
            message_id = %placeholder,
            document_count = request.document_ids.len(),
            stream = request.stream,
            "sending chat request"
        );

        let reply = match self.backend.send_chat(request).await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(stage = error.stage(), error = %error, "chat request failed");
                return run.fail(error.to_string());
            }
        };

        if reply.is_streaming() {
            self.consume_stream(run, reply).await
        } else {
            self.consume_json(run, reply).await
        }
    }

    async fn consume_stream(&self, mut run: StreamRun<'_>, reply: ChatReply) -> StreamOutcome {
        let forced = reply.is_event_stream().then_some(StreamMode::Framed);
        run.transition(StreamTransition::Open(forced));

        let mut body = reply.body;
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) => {
                    tracing::warn!(stage = error.stage(), error = %error, "stream read failed");
                    return run.fail(error.to_string());
                }
            };

            let text = run.decoder.decode(&chunk);
            if run.ingest(&text, false) == Flow::Done {
                tracing::debug!(frames = run.frames, "stream finished by done sentinel");
                return run.complete();
            }
        }

        let tail = run.decoder.finish();
        if run.ingest(&tail, true) == Flow::Done {
            return run.complete();
        }
        if run.state.mode() == Some(StreamMode::Framed)
            && let Some(fragment) = run.splitter.finish()
        {
            // A final frame may arrive without its delimiter.
            run.apply_frame(&fragment);
        }
        run.complete()
    }

    async fn consume_json(&self, run: StreamRun<'_>, reply: ChatReply) -> StreamOutcome {
        tracing::debug!(content_type = ?reply.content_type, "reading non-streaming reply");
        match reply.into_json().await {
            Ok(JsonReply {
                response: Some(text),
                ..
            }) if !text.is_empty() => run.complete_with(text),
            Ok(JsonReply {
                error: Some(error), ..
            }) => run.fail(error),
            Ok(_) => run.fail(UNEXPECTED_FORMAT.to_string()),
            Err(error) => {
                tracing::warn!(stage = error.stage(), error = %error, "json reply unreadable");
                run.fail(error.to_string())
            }
        }
    }
}

/// Per-request state: lifecycle, decode buffers and accumulated text.
struct StreamRun<'r> {
    placeholder: MessageId,
    renderer: &'r RefCell<Renderer>,
    state: StreamState,
    decoder: Utf8StreamDecoder,
    splitter: FrameSplitter,
    head: String,
    full_text: String,
    frames: usize,
    rendered: bool,
}

impl<'r> StreamRun<'r> {
    fn new(placeholder: MessageId, renderer: &'r RefCell<Renderer>) -> Self {
        Self {
            placeholder,
            renderer,
            state: StreamState::default(),
            decoder: Utf8StreamDecoder::new(),
            splitter: FrameSplitter::new(),
            head: String::new(),
            full_text: String::new(),
            frames: 0,
            rendered: false,
        }
    }

    fn transition(&mut self, transition: StreamTransition) {
        match self.state.apply(transition) {
            Ok(next) => {
                tracing::trace!(message_id = %self.placeholder, from = ?self.state, to = ?next, "stream transition");
                self.state = next;
            }
            Err(rejection) => {
                tracing::warn!(message_id = %self.placeholder, ?rejection, "stream transition rejected");
            }
        }
    }

    /// Feeds decoded text, detecting the body mode first if still unknown.
    fn ingest(&mut self, text: &str, at_end: bool) -> Flow {
        let (mode, text) = match self.state.mode() {
            Some(mode) => (mode, text.to_string()),
            None => {
                self.head.push_str(text);
                let Some(mode) = detect_mode(&self.head, at_end) else {
                    return Flow::Continue;
                };
                tracing::debug!(message_id = %self.placeholder, ?mode, "detected stream mode");
                self.transition(StreamTransition::Detect(mode));
                (mode, std::mem::take(&mut self.head))
            }
        };

        match mode {
            StreamMode::Raw => {
                if !text.is_empty() {
                    self.full_text.push_str(&text);
                    self.render();
                }
                Flow::Continue
            }
            StreamMode::Framed => {
                for frame in self.splitter.push(&text) {
                    if self.apply_frame(&frame) == Flow::Done {
                        return Flow::Done;
                    }
                }
                Flow::Continue
            }
        }
    }

    fn apply_frame(&mut self, frame: &str) -> Flow {
        match StreamFrame::parse(frame) {
            Some(StreamFrame::Done) => Flow::Done,
            Some(StreamFrame::Delta(payload)) => {
                self.frames += 1;
                self.full_text.push_str(&payload);
                self.render();
                Flow::Continue
            }
            None => {
                tracing::debug!(message_id = %self.placeholder, frame_len = frame.len(), "skipping frame without data prefix");
                Flow::Continue
            }
        }
    }

    fn render(&mut self) {
        let result = self
            .renderer
            .borrow_mut()
            .update_text(self.placeholder, &self.full_text);
        match result {
            Ok(()) => self.rendered = true,
            Err(error) => tracing::warn!(error = %error, "dropping stream update"),
        }
    }

    fn complete_with(mut self, text: String) -> StreamOutcome {
        self.full_text = text;
        self.render();
        self.complete()
    }

    fn complete(mut self) -> StreamOutcome {
        self.transition(StreamTransition::Complete);
        if !self.rendered {
            self.render();
        }
        self.finalize();
        tracing::info!(
            message_id = %self.placeholder,
            frames = self.frames,
            chars = self.full_text.chars().count(),
            "chat reply completed"
        );
        StreamOutcome::Completed {
            text: self.full_text,
        }
    }

    fn fail(mut self, message: String) -> StreamOutcome {
        self.transition(StreamTransition::Fail(message.clone()));
        if let Err(error) = self
            .renderer
            .borrow_mut()
            .show_error(self.placeholder, &message)
        {
            tracing::warn!(error = %error, "could not render stream failure");
        }
        self.finalize();
        StreamOutcome::Failed { message }
    }

    fn finalize(&self) {
        if let Err(error) = self.renderer.borrow_mut().finalize(self.placeholder) {
            tracing::warn!(error = %error, "placeholder finalize failed");
        }
    }
}
