use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::error::RequestError;

/// Bot text used when the server answers without an `answer` field.
pub const NO_ANSWER_PLACEHOLDER: &str = "\u{26A0}\u{FE0F} No answer returned.";

/// Notice shown when a request fails for any reason other than cancellation.
pub const REQUEST_FAILED_NOTICE: &str = "\u{26A0}\u{FE0F} Error getting response.";

/// A question-answering service.
///
/// Implementations must return `RequestError::Cancelled` promptly once
/// `cancel` fires, and must treat a missing answer as
/// [`NO_ANSWER_PLACEHOLDER`] rather than as a failure.
#[async_trait]
pub trait AnswerBackend: Send + Sync {
    async fn ask(&self, question: &str, cancel: &CancellationToken)
        -> Result<String, RequestError>;

    /// Human-readable target, shown in the header.
    fn describe(&self) -> &str;
}
