use atelier_llm::{
    PartialResult, ProviderEventStream, ProviderStreamHandle, StreamEventMapped,
    StreamEventPayload,
};
use futures::Stream;

use super::message::StreamTarget;

const CLOSED_EARLY_MESSAGE: &str = "stream ended before a terminal event";

/// Payload of one reply event as seen by the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamPayload {
    Partial(PartialResult),
    Done,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    pub target: StreamTarget,
    pub payload: StreamPayload,
}

impl StreamEvent {
    pub fn new(target: StreamTarget, payload: StreamPayload) -> Self {
        Self { target, payload }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.payload, StreamPayload::Done | StreamPayload::Failed(_))
    }
}

impl From<StreamEventMapped> for StreamEvent {
    fn from(event: StreamEventMapped) -> Self {
        let payload = match event.payload {
            StreamEventPayload::Partial(partial) => StreamPayload::Partial(partial),
            StreamEventPayload::Done => StreamPayload::Done,
            StreamEventPayload::Error(message) => StreamPayload::Failed(message),
        };
        Self::new(event.target.into(), payload)
    }
}

/// Reader for one in-flight reply.
///
/// Yields partial events in arrival order followed by exactly one terminal
/// event. Dropping the session detaches the worker without aborting it.
pub struct StreamingSession {
    target: StreamTarget,
    events: ProviderEventStream,
    finished: bool,
}

impl StreamingSession {
    /// Starts the provider worker on the current tokio runtime.
    pub fn spawn(handle: ProviderStreamHandle) -> Self {
        let ProviderStreamHandle { stream, worker } = handle;
        let target = StreamTarget::from(stream.target());
        tokio::spawn(worker);
        tracing::debug!(stream = ?target, "reply stream worker spawned");

        Self {
            target,
            events: stream,
            finished: false,
        }
    }

    pub fn target(&self) -> StreamTarget {
        self.target
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next event, or `None` once the terminal event was handed out.
    ///
    /// A worker that hangs up without reporting `Done` or an error yields a
    /// synthesized failure.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }

        let event = match self.events.recv().await {
            Some(event) => StreamEvent::from(event),
            None => {
                tracing::warn!(stream = ?self.target, "reply stream closed before a terminal event");
                StreamEvent::new(
                    self.target,
                    StreamPayload::Failed(CLOSED_EARLY_MESSAGE.to_string()),
                )
            }
        };

        if event.is_terminal() {
            self.finished = true;
        }
        Some(event)
    }

    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send {
        futures::stream::unfold(self, |mut session| async move {
            session.next().await.map(|event| (event, session))
        })
    }
}
