//! Streaming view of a running conversation

use super::{ConversationError, ConversationOutcome};
use crate::transcript::Entry;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Entries of a background conversation, in append order.
///
/// The stream ends once the conversation has stopped; `finish` then yields
/// the outcome.
pub struct ConversationStream {
    entries: UnboundedReceiverStream<Entry>,
    handle: JoinHandle<Result<ConversationOutcome, ConversationError>>,
}

impl ConversationStream {
    pub(super) fn new(
        receiver: mpsc::UnboundedReceiver<Entry>,
        handle: JoinHandle<Result<ConversationOutcome, ConversationError>>,
    ) -> Self {
        Self {
            entries: UnboundedReceiverStream::new(receiver),
            handle,
        }
    }

    /// Wait for the conversation to stop and return its outcome
    pub async fn finish(self) -> Result<ConversationOutcome, ConversationError> {
        self.handle
            .await
            .map_err(|e| ConversationError::Aborted(e.to_string()))?
    }
}

impl Stream for ConversationStream {
    type Item = Entry;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.entries).poll_next(cx)
    }
}
