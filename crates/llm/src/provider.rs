use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use snafu::Snafu;
use tokio::sync::mpsc;

use super::events::{StreamEventMapped, StreamTarget};
use super::model::{
    AspectRatio, DEFAULT_CHAT_MODEL, DEFAULT_IMAGE_MODEL, ImagePayload, ImageSize,
};

pub const DEFAULT_PROVIDER_ID: &str = "gemini";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Client configuration injected into whichever component issues remote calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub api_key: String,
    pub endpoint: String,
    pub chat_model: String,
    pub image_model: String,
    pub grounding_enabled: bool,
    pub image_size: ImageSize,
}

impl ProviderConfig {
    pub fn new(provider_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            grounding_enabled: true,
            image_size: ImageSize::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim().trim_end_matches('/').to_string();
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into().trim().to_string();
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into().trim().to_string();
        self
    }

    pub fn with_grounding(mut self, enabled: bool) -> Self {
        self.grounding_enabled = enabled;
        self
    }

    pub fn with_image_size(mut self, image_size: ImageSize) -> Self {
        self.image_size = image_size;
        self
    }

    /// Chat options derived from this configuration.
    pub fn chat_session(&self) -> ChatSessionConfig {
        ChatSessionConfig {
            model: self.chat_model.clone(),
            grounding_enabled: self.grounding_enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSessionConfig {
    pub model: String,
    pub grounding_enabled: bool,
}

impl Default for ChatSessionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_CHAT_MODEL.to_string(),
            grounding_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, aspect_ratio: AspectRatio) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    pub prompt: String,
    pub base: ImagePayload,
    pub aspect_ratio: AspectRatio,
}

impl EditRequest {
    pub fn new(prompt: impl Into<String>, base: ImagePayload, aspect_ratio: AspectRatio) -> Self {
        Self {
            prompt: prompt.into(),
            base,
            aspect_ratio,
        }
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ProviderWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("missing API key for provider '{provider_id}'"))]
    MissingApiKey {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("provider '{provider_id}' is not supported"))]
    UnsupportedProvider {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("request for {target:?} has an empty prompt"))]
    EmptyPrompt {
        stage: &'static str,
        target: Option<StreamTarget>,
    },
    #[snafu(display("failed to build http client on `{stage}`, {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("http request failed on `{stage}`, {source}"))]
    Http {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("failed to open event stream on `{stage}`, {source}"))]
    OpenStream {
        stage: &'static str,
        source: reqwest_eventsource::CannotCloneRequestError,
    },
    #[snafu(display("event stream failed on `{stage}`, {source}"))]
    EventStream {
        stage: &'static str,
        source: reqwest_eventsource::Error,
    },
    #[snafu(display("provider returned status {status} on `{stage}`: {message}"))]
    Status {
        stage: &'static str,
        status: u16,
        message: String,
    },
    #[snafu(display("failed to decode provider payload on `{stage}`, {source}"))]
    DecodePayload {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to decode inline image data on `{stage}`, {source}"))]
    DecodeImage {
        stage: &'static str,
        source: base64::DecodeError,
    },
    #[snafu(display("provider produced no image on `{stage}`"))]
    NoImageProduced { stage: &'static str },
}

/// Receiving side of one streamed request.
///
/// Dropping it stops delivery but never aborts the remote call; the worker
/// keeps running until the service finishes.
pub struct ProviderEventStream {
    target: StreamTarget,
    events: mpsc::UnboundedReceiver<StreamEventMapped>,
}

pub struct ProviderStreamHandle {
    pub stream: ProviderEventStream,
    pub worker: ProviderWorker,
}

impl ProviderEventStream {
    pub(crate) fn new(
        target: StreamTarget,
        events: mpsc::UnboundedReceiver<StreamEventMapped>,
    ) -> Self {
        Self { target, events }
    }

    pub fn target(&self) -> StreamTarget {
        self.target
    }

    pub async fn recv(&mut self) -> Option<StreamEventMapped> {
        self.events.recv().await
    }
}

/// Stateful chat conversation kept by the provider.
///
/// Prior turns are only recorded once a reply stream completes, so a failed
/// send leaves the handle's history as it was.
pub trait ChatHandle: Send + Sync {
    fn send_streaming(
        &self,
        target: StreamTarget,
        text: String,
    ) -> ProviderResult<ProviderStreamHandle>;
}

pub trait GenerativeProvider: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn begin_chat(&self, config: ChatSessionConfig) -> Arc<dyn ChatHandle>;
    fn generate_image<'a>(
        &'a self,
        request: ImageRequest,
    ) -> BoxFuture<'a, ProviderResult<ImagePayload>>;
    fn edit_image<'a>(&'a self, request: EditRequest) -> BoxFuture<'a, ProviderResult<ImagePayload>>;
}

/// Creates the channel pair shared by a stream worker and its reader.
///
/// Exposed so alternative providers can reuse the same event plumbing.
pub fn make_event_stream(
    target: StreamTarget,
) -> (mpsc::UnboundedSender<StreamEventMapped>, ProviderEventStream) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    (event_tx, ProviderEventStream::new(target, event_rx))
}
