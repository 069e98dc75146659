use std::sync::Arc;

use atelier_llm::{ChatHandle, ChatSessionConfig, GenerativeProvider, Source};
use snafu::ensure;

use crate::error::{
    EmptyInputSnafu, Operation, SessionInactiveSnafu, StreamFailedSnafu, SubmissionInFlightSnafu,
    SuiteError, SuiteResult,
};

use super::citations::CitationAggregator;
use super::message::{RequestId, Role, SessionGeneration, StreamState, StreamTarget, Turn};
use super::stream::{StreamEvent, StreamPayload, StreamingSession};

/// Outcome of feeding one stream event into the conversation.
#[derive(Debug)]
pub enum StreamApplied {
    /// Event belongs to a superseded generation or request.
    Ignored,
    Updated,
    Completed,
    Failed(SuiteError),
}

#[derive(Debug)]
struct InFlight {
    target: StreamTarget,
    placeholder: usize,
    citations: CitationAggregator,
}

/// Multi-turn chat with streamed replies and grounding sources.
///
/// At most one reply streams at a time. `reset` starts a new generation, and
/// every event tagged with an older generation is dropped on arrival.
pub struct ConversationSession {
    provider: Arc<dyn GenerativeProvider>,
    config: ChatSessionConfig,
    chat: Arc<dyn ChatHandle>,
    generation: SessionGeneration,
    next_request: u64,
    turns: Vec<Turn>,
    stream_state: StreamState,
    in_flight: Option<InFlight>,
    active: bool,
}

impl ConversationSession {
    pub fn start(provider: Arc<dyn GenerativeProvider>, config: ChatSessionConfig) -> Self {
        let chat = provider.begin_chat(config.clone());
        tracing::info!(
            provider = provider.id(),
            model = %config.model,
            grounding = config.grounding_enabled,
            "conversation started"
        );

        Self {
            provider,
            config,
            chat,
            generation: SessionGeneration::new(1),
            next_request: 1,
            turns: Vec::new(),
            stream_state: StreamState::Idle,
            in_flight: None,
            active: true,
        }
    }

    /// Appends the user turn and an empty model turn, then opens the reply stream.
    ///
    /// If the stream cannot be opened the placeholder is removed again and the
    /// user turn stays in the transcript.
    pub fn submit(&mut self, text: &str) -> SuiteResult<StreamingSession> {
        ensure!(self.active, SessionInactiveSnafu { stage: "submit" });
        let text = text.trim();
        ensure!(
            !text.is_empty(),
            EmptyInputSnafu {
                stage: "submit",
                operation: Operation::Chat,
            }
        );
        ensure!(
            self.in_flight.is_none(),
            SubmissionInFlightSnafu { stage: "submit" }
        );

        let target = StreamTarget::new(self.generation, RequestId::new(self.next_request));
        self.stream_state = StreamState::Streaming(target);
        self.next_request = self.next_request.saturating_add(1);

        self.turns.push(Turn::user(text));
        self.turns.push(Turn::model_placeholder());
        let placeholder = self.turns.len() - 1;

        match self.chat.send_streaming(target.into(), text.to_string()) {
            Ok(handle) => {
                self.in_flight = Some(InFlight {
                    target,
                    placeholder,
                    citations: CitationAggregator::new(),
                });
                tracing::debug!(stream = ?target, "reply requested");
                Ok(StreamingSession::spawn(handle))
            }
            Err(error) => {
                self.turns.truncate(placeholder);
                self.stream_state = StreamState::Error {
                    target,
                    message: error.to_string(),
                };
                tracing::warn!(error = %error, "failed to open reply stream");
                Err(SuiteError::from_provider("submit", Operation::Chat, error))
            }
        }
    }

    /// Folds one event into the transcript.
    pub fn apply(&mut self, event: StreamEvent) -> StreamApplied {
        if event.target.generation != self.generation {
            tracing::debug!(
                event_generation = event.target.generation.0,
                generation = self.generation.0,
                "dropping event from superseded conversation"
            );
            return StreamApplied::Ignored;
        }
        if !self.stream_state.accepts(event.target) {
            tracing::debug!(stream = ?event.target, "dropping event for inactive request");
            return StreamApplied::Ignored;
        }
        let Some(in_flight) = self.in_flight.as_mut() else {
            return StreamApplied::Ignored;
        };

        match event.payload {
            StreamPayload::Partial(partial) => {
                let Some(turn) = self.turns.get_mut(in_flight.placeholder) else {
                    return StreamApplied::Ignored;
                };
                if let Some(text) = partial.text {
                    turn.text.push_str(&text);
                }
                if in_flight.citations.offer(partial.citations) > 0 {
                    turn.sources = in_flight.citations.snapshot();
                }
                StreamApplied::Updated
            }
            StreamPayload::Done => {
                let target = in_flight.target;
                self.finish(StreamState::Done(target));
                tracing::info!(stream = ?target, turns = self.turns.len(), "reply completed");
                StreamApplied::Completed
            }
            StreamPayload::Failed(message) => {
                let target = in_flight.target;
                let placeholder = in_flight.placeholder;
                if placeholder < self.turns.len() {
                    self.turns.remove(placeholder);
                }
                self.finish(StreamState::Error {
                    target,
                    message: message.clone(),
                });
                tracing::warn!(stream = ?target, message = %message, "reply stream failed");
                StreamApplied::Failed(SuiteError::StreamFailed {
                    stage: "apply-stream-event",
                    message,
                })
            }
        }
    }

    fn finish(&mut self, state: StreamState) {
        self.stream_state = state;
        self.in_flight = None;
    }

    /// Submits `text` and drives the reply to its terminal event.
    pub async fn send(&mut self, text: &str) -> SuiteResult<()> {
        let mut stream = self.submit(text)?;
        while let Some(event) = stream.next().await {
            match self.apply(event) {
                StreamApplied::Completed => return Ok(()),
                StreamApplied::Failed(error) => return Err(error),
                StreamApplied::Updated | StreamApplied::Ignored => {}
            }
        }

        StreamFailedSnafu {
            stage: "send",
            message: "reply stream ended without a terminal event",
        }
        .fail()
    }

    /// Replaces the conversation with a fresh one, discarding any in-flight reply.
    pub fn reset(&mut self) {
        let previous = self.generation;
        self.generation = previous.next();
        self.next_request = 1;
        self.turns.clear();
        self.in_flight = None;
        self.stream_state = StreamState::Idle;
        self.chat = self.provider.begin_chat(self.config.clone());
        self.active = true;
        tracing::info!(
            previous = previous.0,
            generation = self.generation.0,
            "conversation reset"
        );
    }

    /// Stops accepting submissions. Events still arriving are ignored.
    pub fn close(&mut self) {
        self.active = false;
        self.in_flight = None;
        self.stream_state = StreamState::Idle;
        tracing::info!(generation = self.generation.0, "conversation closed");
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Sources of the streaming reply, or of the latest model turn when idle.
    pub fn current_sources(&self) -> Option<&[Source]> {
        if let Some(in_flight) = &self.in_flight {
            return (!in_flight.citations.is_empty()).then(|| in_flight.citations.sources());
        }
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Model)
            .and_then(|turn| turn.sources.as_deref())
    }

    pub fn is_streaming(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn generation(&self) -> SessionGeneration {
        self.generation
    }

    pub fn stream_state(&self) -> &StreamState {
        &self.stream_state
    }
}
