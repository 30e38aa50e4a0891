use crate::chat::lifecycle::Ticket;
use crate::core::error::RequestError;
use crate::core::session::ChatId;

/// Sent by a request task back to the UI task.
#[derive(Debug)]
pub enum ChatEvent {
    Answered {
        chat_id: ChatId,
        ticket: Ticket,
        outcome: Result<String, RequestError>,
    },
}

/// What applying a `ChatEvent` did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A bot message was appended.
    Answered(String),
    /// An error notice was shown.
    Failed(RequestError),
    /// The request was cancelled; nothing was shown.
    Cancelled,
    /// The request had been superseded, cancelled or its session deleted.
    Stale,
}
