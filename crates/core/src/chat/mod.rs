pub mod citations;
/// Transcript entities and stream routing keys.
pub mod message;
pub mod session;
pub mod stream;

pub use citations::CitationAggregator;
pub use message::{RequestId, Role, SessionGeneration, StreamState, StreamTarget, Turn};
pub use session::{ConversationSession, StreamApplied};
pub use stream::{StreamEvent, StreamPayload, StreamingSession};
