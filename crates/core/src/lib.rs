/// Image artifacts, their version history and the image workflows.
pub mod artifact;
/// Streaming chat with grounding sources.
pub mod chat;
pub mod error;
pub mod locale;

#[cfg(test)]
pub(crate) mod test_support;

pub use artifact::{Artifact, ArtifactVersionStore, HistorySnapshot, ImageEditor, ImageGenerator};
pub use atelier_llm::{AspectRatio, ImageSize, PartialResult, Source};
pub use chat::{
    CitationAggregator, ConversationSession, Role, SessionGeneration, StreamApplied, StreamEvent,
    StreamPayload, StreamingSession, Turn,
};
pub use error::{ErrorKind, Operation, SuiteError, SuiteResult};
pub use locale::{Locale, UnsupportedLocale};
