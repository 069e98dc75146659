use atelier_llm::Source;

/// Tag of one conversation instance.
///
/// This must change on every reset so results from superseded streams can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionGeneration(pub u64);

impl SessionGeneration {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Identifier for one submission within a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl RequestId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Stream routing key used for stale-result rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    pub generation: SessionGeneration,
    pub request: RequestId,
}

impl StreamTarget {
    pub const fn new(generation: SessionGeneration, request: RequestId) -> Self {
        Self {
            generation,
            request,
        }
    }
}

impl From<StreamTarget> for atelier_llm::StreamTarget {
    fn from(target: StreamTarget) -> Self {
        atelier_llm::StreamTarget::new(target.generation.0, target.request.0)
    }
}

impl From<atelier_llm::StreamTarget> for StreamTarget {
    fn from(target: atelier_llm::StreamTarget) -> Self {
        StreamTarget::new(
            SessionGeneration::new(target.generation),
            RequestId::new(target.request),
        )
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Model,
}

/// One message of the transcript.
///
/// `sources` stays `None` until at least one citation arrives, so "no
/// citations" is distinguishable from an empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub sources: Option<Vec<Source>>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            sources: None,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
            sources: None,
        }
    }

    /// Empty model turn filled in while a reply streams.
    pub fn model_placeholder() -> Self {
        Self::model(String::new())
    }
}

/// Where the latest reply of a conversation stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming(StreamTarget),
    Done(StreamTarget),
    Error {
        target: StreamTarget,
        message: String,
    },
}

impl StreamState {
    /// Only events of the request currently streaming are accepted.
    pub fn accepts(&self, target: StreamTarget) -> bool {
        matches!(self, Self::Streaming(active) if *active == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(generation: u64, request: u64) -> StreamTarget {
        StreamTarget::new(SessionGeneration::new(generation), RequestId::new(request))
    }

    #[test]
    fn only_the_streaming_request_is_accepted() {
        let streaming = StreamState::Streaming(target(3, 1));
        assert!(streaming.accepts(target(3, 1)));
        assert!(!streaming.accepts(target(2, 1)));
        assert!(!streaming.accepts(target(3, 2)));

        let finished = [
            StreamState::Idle,
            StreamState::Done(target(3, 1)),
            StreamState::Error {
                target: target(3, 1),
                message: "quota".to_string(),
            },
        ];
        for state in finished {
            assert!(!state.accepts(target(3, 1)));
        }
    }

    #[test]
    fn targets_convert_to_and_from_provider_keys() {
        let provider_target: atelier_llm::StreamTarget = target(4, 9).into();
        assert_eq!(provider_target, atelier_llm::StreamTarget::new(4, 9));
        assert_eq!(StreamTarget::from(provider_target), target(4, 9));
    }
}
