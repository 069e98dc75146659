use std::sync::Arc;

mod events;
mod gemini;
mod model;
mod provider;

pub use events::{PartialResult, Source, StreamEventMapped, StreamEventPayload, StreamTarget};
pub use gemini::{GEMINI_PROVIDER_ID, GeminiChat, GeminiProvider};
pub use model::{
    AspectRatio, DEFAULT_CHAT_MODEL, DEFAULT_IMAGE_CONTENT_TYPE, DEFAULT_IMAGE_MODEL,
    ImagePayload, ImageSize, ModelOptionError,
};
pub use provider::{
    BoxFuture, ChatHandle, ChatSessionConfig, DEFAULT_ENDPOINT, DEFAULT_PROVIDER_ID, EditRequest,
    GenerativeProvider, ImageRequest, ProviderConfig, ProviderError, ProviderEventStream,
    ProviderResult, ProviderStreamHandle, ProviderWorker, make_event_stream,
};

pub fn create_provider(mut config: ProviderConfig) -> ProviderResult<Arc<dyn GenerativeProvider>> {
    if config.provider_id.trim().is_empty() {
        config.provider_id = GEMINI_PROVIDER_ID.to_string();
    }

    match config.provider_id.as_str() {
        "gemini" | "google" => {
            config.provider_id = GEMINI_PROVIDER_ID.to_string();
            Ok(Arc::new(GeminiProvider::new(config)?))
        }
        _ => Err(ProviderError::UnsupportedProvider {
            stage: "create-provider",
            provider_id: config.provider_id,
        }),
    }
}
