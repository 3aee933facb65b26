//! The conversation store: the ordered transcript and the in-flight flag.

use tracing::{debug, info, warn};

use crate::client::{ChatBackend, ChatRequest};
use crate::error::ChatError;
use crate::state::Message;

/// Number of prior messages sent along with each new one
pub const HISTORY_WINDOW: usize = 10;

/// The only error text a user ever sees
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// A request accepted by the store, tagged with the generation it belongs to
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub generation: u64,
    pub request: ChatRequest,
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
    loading: bool,
    generation: u64,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Accept `text` as the next user message.
    ///
    /// Returns `None` without touching the transcript when the text is blank
    /// or a reply is still pending.
    pub fn begin_send(&mut self, text: &str) -> Option<OutboundRequest> {
        let content = text.trim();
        if content.is_empty() || self.loading {
            return None;
        }

        let start = self.messages.len().saturating_sub(HISTORY_WINDOW);
        let conversation_history = self.messages[start..].to_vec();

        self.messages.push(Message::user(content));
        self.loading = true;

        info!(
            generation = self.generation,
            history = conversation_history.len(),
            "sending message"
        );

        Some(OutboundRequest {
            generation: self.generation,
            request: ChatRequest {
                message: content.to_string(),
                conversation_history,
            },
        })
    }

    /// Apply the outcome of a request started by [`begin_send`].
    ///
    /// The loading flag always clears. The reply is appended only if the
    /// transcript has not been cleared since the request went out.
    ///
    /// [`begin_send`]: ConversationStore::begin_send
    pub fn settle(&mut self, generation: u64, result: Result<String, ChatError>) {
        self.loading = false;

        if generation != self.generation {
            debug!(
                request_generation = generation,
                current_generation = self.generation,
                "discarding reply for a cleared conversation"
            );
            return;
        }

        let reply = match result {
            Ok(text) => {
                info!(chars = text.len(), "reply received");
                Message::assistant(text)
            }
            Err(err) => {
                warn!(error = %err, "chat request failed");
                Message::assistant(FALLBACK_REPLY)
            }
        };
        self.messages.push(reply);
    }

    /// Run a full send cycle against `backend`. Returns false if the send was
    /// rejected.
    pub async fn send_message(&mut self, text: &str, backend: &dyn ChatBackend) -> bool {
        let Some(outbound) = self.begin_send(text) else {
            return false;
        };
        let result = backend.send(&outbound.request).await;
        self.settle(outbound.generation, result);
        true
    }

    /// Empty the transcript. A request already in flight keeps running but its
    /// reply will be dropped.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.generation += 1;
        info!(generation = self.generation, "conversation cleared");
    }
}
