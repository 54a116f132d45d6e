use chatpane_client::ClientError;
use snafu::Snafu;

use crate::chat::message::MessageId;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RenderError {
    #[snafu(display("message {id} does not exist"))]
    UnknownMessage { stage: &'static str, id: MessageId },
    #[snafu(display("message {id} is finalized and can no longer change"))]
    Finalized { stage: &'static str, id: MessageId },
    #[snafu(display("message {id} was already finalized"))]
    AlreadyFinalized { stage: &'static str, id: MessageId },
}

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WidgetError {
    #[snafu(display("a chat request is already in flight"))]
    RequestInFlight { stage: &'static str },
    #[snafu(display("message is empty"))]
    EmptyMessage { stage: &'static str },
    #[snafu(display("{source}"))]
    Client {
        stage: &'static str,
        source: ClientError,
    },
}

pub type WidgetResult<T> = Result<T, WidgetError>;
