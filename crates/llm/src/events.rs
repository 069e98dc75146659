/// Stream routing key used for stale-chunk rejection.
///
/// `generation` identifies the conversation instance that issued the request and
/// changes on every reset; `request` changes on every submit within a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    pub generation: u64,
    pub request: u64,
}

impl StreamTarget {
    pub const fn new(generation: u64, request: u64) -> Self {
        Self {
            generation,
            request,
        }
    }
}

/// A web reference returned alongside generated text. Identity is the `uri`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

impl Source {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
        }
    }
}

/// One incremental piece of a streamed reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartialResult {
    pub text: Option<String>,
    pub citations: Vec<Source>,
}

impl PartialResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            citations: Vec::new(),
        }
    }

    pub fn with_citations(mut self, citations: Vec<Source>) -> Self {
        self.citations = citations;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_deref().is_none_or(str::is_empty) && self.citations.is_empty()
    }
}

/// Provider-agnostic stream payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEventPayload {
    Partial(PartialResult),
    Done,
    Error(String),
}

/// One event read from a provider stream, tagged with the request it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEventMapped {
    pub target: StreamTarget,
    pub payload: StreamEventPayload,
}

impl StreamEventMapped {
    pub fn new(target: StreamTarget, payload: StreamEventPayload) -> Self {
        Self { target, payload }
    }

    /// Returns true for `Done` and `Error`, after which the stream yields nothing.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.payload,
            StreamEventPayload::Done | StreamEventPayload::Error(_)
        )
    }
}
