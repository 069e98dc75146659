use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use futures::StreamExt;
use reqwest::{Client, Response};
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource, retry};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};
use tokio::sync::mpsc;

use super::events::{PartialResult, Source, StreamEventMapped, StreamEventPayload, StreamTarget};
use super::model::{AspectRatio, ImagePayload, ImageSize};
use super::provider::{
    BoxFuture, BuildClientSnafu, ChatHandle, ChatSessionConfig, DecodeImageSnafu,
    DecodePayloadSnafu, EditRequest, EmptyPromptSnafu, GenerativeProvider, HttpSnafu,
    ImageRequest, MissingApiKeySnafu, NoImageProducedSnafu, OpenStreamSnafu, ProviderConfig,
    ProviderError, ProviderResult, ProviderStreamHandle, ProviderWorker, StatusSnafu,
    make_event_stream,
};

pub const GEMINI_PROVIDER_ID: &str = "gemini";

const API_KEY_HEADER: &str = "x-goog-api-key";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Gemini REST implementation of [`GenerativeProvider`].
pub struct GeminiProvider {
    config: ProviderConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "gemini-provider-new",
                provider_id: config.provider_id.clone(),
            }
        );

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context(BuildClientSnafu {
                stage: "build-client",
            })?;

        Ok(Self { config, client })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint, self.config.image_model
        )
    }

    fn image_request_body(
        &self,
        parts: Vec<WirePart>,
        aspect_ratio: AspectRatio,
    ) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![WireContent::new(WireRole::User, parts)],
            tools: grounding_tools(self.config.grounding_enabled),
            generation_config: Some(GenerationConfig::image(
                aspect_ratio,
                self.config.image_size,
            )),
        }
    }

    async fn request_image(
        &self,
        body: GenerateContentRequest,
        stage: &'static str,
    ) -> ProviderResult<ImagePayload> {
        let response = self
            .client
            .post(self.generate_url())
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&body)
            .send()
            .await
            .context(HttpSnafu { stage })?;

        let response = ensure_success(response, stage).await?;
        let payload = response.text().await.context(HttpSnafu { stage })?;
        let parsed = serde_json::from_str::<GenerateContentResponse>(&payload)
            .context(DecodePayloadSnafu { stage })?;

        extract_image(parsed, stage)
    }
}

impl GenerativeProvider for GeminiProvider {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn name(&self) -> &str {
        "Gemini"
    }

    fn begin_chat(&self, config: ChatSessionConfig) -> Arc<dyn ChatHandle> {
        tracing::debug!(
            model = %config.model,
            grounding = config.grounding_enabled,
            "opening gemini chat"
        );

        Arc::new(GeminiChat {
            client: self.client.clone(),
            endpoint: self.config.endpoint.clone(),
            api_key: self.config.api_key.clone(),
            config,
            history: Arc::new(Mutex::new(Vec::new())),
        })
    }

    fn generate_image<'a>(
        &'a self,
        request: ImageRequest,
    ) -> BoxFuture<'a, ProviderResult<ImagePayload>> {
        Box::pin(async move {
            ensure!(
                !request.prompt.trim().is_empty(),
                EmptyPromptSnafu {
                    stage: "generate-image",
                    target: None,
                }
            );

            let body = self.image_request_body(
                vec![WirePart::text(request.prompt)],
                request.aspect_ratio,
            );
            self.request_image(body, "generate-image").await
        })
    }

    fn edit_image<'a>(&'a self, request: EditRequest) -> BoxFuture<'a, ProviderResult<ImagePayload>> {
        Box::pin(async move {
            ensure!(
                !request.prompt.trim().is_empty(),
                EmptyPromptSnafu {
                    stage: "edit-image",
                    target: None,
                }
            );

            // The base image goes first so the instruction reads as applying to it.
            let parts = vec![
                WirePart::inline(&request.base),
                WirePart::text(request.prompt),
            ];
            let body = self.image_request_body(parts, request.aspect_ratio);
            self.request_image(body, "edit-image").await
        })
    }
}

/// Chat conversation whose history lives client-side and is replayed on each send.
pub struct GeminiChat {
    client: Client,
    endpoint: String,
    api_key: String,
    config: ChatSessionConfig,
    history: Arc<Mutex<Vec<WireContent>>>,
}

impl GeminiChat {
    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.endpoint, self.config.model
        )
    }

    fn history_snapshot(&self) -> Vec<WireContent> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn emit_error_event(
        event_tx: &mpsc::UnboundedSender<StreamEventMapped>,
        target: StreamTarget,
        error: ProviderError,
    ) {
        let _ = event_tx.send(StreamEventMapped::new(
            target,
            StreamEventPayload::Error(error.to_string()),
        ));
    }

    async fn run_stream_worker(
        client: Client,
        url: String,
        api_key: String,
        body: GenerateContentRequest,
        history: Arc<Mutex<Vec<WireContent>>>,
        target: StreamTarget,
        event_tx: mpsc::UnboundedSender<StreamEventMapped>,
    ) {
        let request = client.post(&url).header(API_KEY_HEADER, &api_key).json(&body);
        let mut events = match EventSource::new(request).context(OpenStreamSnafu {
            stage: "open-stream",
        }) {
            Ok(events) => events,
            Err(error) => {
                tracing::error!(stream = ?target, error = %error, "failed to open gemini stream");
                Self::emit_error_event(&event_tx, target, error);
                return;
            }
        };
        // A finished reply must not be re-requested.
        events.set_retry_policy(Box::new(retry::Never));

        let mut reply = String::new();
        while let Some(event) = events.next().await {
            let message = match event {
                Ok(Event::Open) => {
                    tracing::debug!(stream = ?target, "gemini stream opened");
                    continue;
                }
                Ok(Event::Message(message)) => message,
                Err(EventSourceError::StreamEnded) => break,
                Err(error) => {
                    events.close();
                    let error = match error {
                        EventSourceError::InvalidStatusCode(_, response) => {
                            status_error(response, "open-stream").await
                        }
                        source => ProviderError::EventStream {
                            stage: "stream-event",
                            source,
                        },
                    };
                    tracing::warn!(stream = ?target, error = %error, "gemini stream failed");
                    Self::emit_error_event(&event_tx, target, error);
                    return;
                }
            };

            match parse_stream_chunk(&message.data) {
                Ok(partial) => {
                    if let Some(text) = &partial.text {
                        reply.push_str(text);
                    }
                    // A dropped reader only stops delivery; the reply is still recorded.
                    if !partial.is_empty() {
                        let _ = event_tx.send(StreamEventMapped::new(
                            target,
                            StreamEventPayload::Partial(partial),
                        ));
                    }
                }
                Err(error) => {
                    events.close();
                    tracing::warn!(stream = ?target, error = %error, "malformed gemini stream chunk");
                    Self::emit_error_event(&event_tx, target, error);
                    return;
                }
            }
        }
        events.close();

        // Record the exchange only after the service finished it.
        if let Some(user_turn) = body.contents.last().cloned() {
            let mut history = history.lock().unwrap_or_else(PoisonError::into_inner);
            history.push(user_turn);
            history.push(WireContent::new(
                WireRole::Model,
                vec![WirePart::text(reply)],
            ));
        }

        let _ = event_tx.send(StreamEventMapped::new(target, StreamEventPayload::Done));
    }
}

impl ChatHandle for GeminiChat {
    fn send_streaming(
        &self,
        target: StreamTarget,
        text: String,
    ) -> ProviderResult<ProviderStreamHandle> {
        ensure!(
            !text.trim().is_empty(),
            EmptyPromptSnafu {
                stage: "send-streaming",
                target: Some(target),
            }
        );

        let mut contents = self.history_snapshot();
        contents.push(WireContent::new(WireRole::User, vec![WirePart::text(text)]));
        let body = GenerateContentRequest {
            contents,
            tools: grounding_tools(self.config.grounding_enabled),
            generation_config: None,
        };

        let (event_tx, stream) = make_event_stream(target);
        let worker: ProviderWorker = Box::pin(Self::run_stream_worker(
            self.client.clone(),
            self.stream_url(),
            self.api_key.clone(),
            body,
            self.history.clone(),
            target,
            event_tx,
        ));

        Ok(ProviderStreamHandle { stream, worker })
    }
}

async fn ensure_success(response: Response, stage: &'static str) -> ProviderResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(status_error(response, stage).await)
}

async fn status_error(response: Response, stage: &'static str) -> ProviderError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "failed to read gemini error body".to_string());

    StatusSnafu {
        stage,
        status: status.as_u16(),
        message: error_message(&body),
    }
    .build()
}

/// Prefers the API's structured `status: message` over the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .and_then(|wrapper| {
            let message = wrapper.error.message?;
            Some(match wrapper.error.status {
                Some(status) if !status.is_empty() => format!("{status}: {message}"),
                _ => message,
            })
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn grounding_tools(enabled: bool) -> Vec<WireTool> {
    if enabled {
        vec![WireTool {
            google_search: GoogleSearch {},
        }]
    } else {
        Vec::new()
    }
}

/// Parses one SSE `data:` payload into the text and citations it carries.
pub(crate) fn parse_stream_chunk(data: &str) -> ProviderResult<PartialResult> {
    let chunk = serde_json::from_str::<GenerateContentResponse>(data).context(
        DecodePayloadSnafu {
            stage: "parse-stream-chunk",
        },
    )?;

    let mut partial = PartialResult::default();
    let Some(candidate) = chunk.candidates.into_iter().next() else {
        return Ok(partial);
    };

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();
    if !text.is_empty() {
        partial.text = Some(text);
    }

    if let Some(metadata) = candidate.grounding_metadata {
        partial.citations = metadata
            .grounding_chunks
            .into_iter()
            .filter_map(|chunk| chunk.web)
            .filter_map(|web| {
                let uri = web.uri?.trim().to_string();
                if uri.is_empty() {
                    return None;
                }
                let title = web
                    .title
                    .map(|title| title.trim().to_string())
                    .filter(|title| !title.is_empty())
                    .unwrap_or_else(|| uri.clone());
                Some(Source::new(title, uri))
            })
            .collect();
    }

    Ok(partial)
}

/// Returns the first inline image of the response.
pub(crate) fn extract_image(
    response: GenerateContentResponse,
    stage: &'static str,
) -> ProviderResult<ImagePayload> {
    let inline = response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .find_map(|part| part.inline_data);

    let Some(inline) = inline else {
        return NoImageProducedSnafu { stage }.fail();
    };

    let bytes = BASE64_STANDARD
        .decode(inline.data.as_bytes())
        .context(DecodeImageSnafu { stage })?;
    if bytes.is_empty() {
        return NoImageProducedSnafu { stage }.fail();
    }

    Ok(ImagePayload::new(bytes, inline.mime_type.unwrap_or_default()))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
enum WireRole {
    User,
    Model,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct WireContent {
    role: WireRole,
    parts: Vec<WirePart>,
}

impl WireContent {
    fn new(role: WireRole, parts: Vec<WirePart>) -> Self {
        Self { role, parts }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum WirePart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: WireInlineData,
    },
}

impl WirePart {
    fn text(text: impl Into<String>) -> Self {
        WirePart::Text { text: text.into() }
    }

    fn inline(image: &ImagePayload) -> Self {
        WirePart::InlineData {
            inline_data: WireInlineData {
                mime_type: image.content_type.clone(),
                data: BASE64_STANDARD.encode(&image.bytes),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool {
    google_search: GoogleSearch,
}

#[derive(Debug, Clone, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    image_config: ImageConfig,
}

impl GenerationConfig {
    fn image(aspect_ratio: AspectRatio, image_size: ImageSize) -> Self {
        Self {
            response_modalities: vec!["TEXT", "IMAGE"],
            image_config: ImageConfig {
                aspect_ratio: aspect_ratio.as_str(),
                image_size: image_size.as_str(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: &'static str,
    image_size: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<ResponseInlineData>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseInlineData {
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    struct CannedResponse {
        status_line: &'static str,
        content_type: &'static str,
        pieces: Vec<&'static str>,
    }

    impl CannedResponse {
        fn event_stream(pieces: Vec<&'static str>) -> Self {
            Self {
                status_line: "200 OK",
                content_type: "text/event-stream",
                pieces,
            }
        }
    }

    /// Serves one canned response per connection and hands back each request body.
    async fn serve(responses: Vec<CannedResponse>) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let endpoint = format!("http://{}", listener.local_addr().expect("local addr"));
        let (body_tx, body_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for response in responses {
                let (mut socket, _) = listener.accept().await.expect("accept");
                let body = read_request_body(&mut socket).await;
                let _ = body_tx.send(body);

                let head = format!(
                    "HTTP/1.1 {}\r\ncontent-type: {}\r\nconnection: close\r\n\r\n",
                    response.status_line, response.content_type
                );
                // The client may hang up early once it has seen enough.
                let _ = socket.write_all(head.as_bytes()).await;
                for piece in response.pieces {
                    let _ = socket.write_all(piece.as_bytes()).await;
                    let _ = socket.flush().await;
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                let _ = socket.shutdown().await;
            }
        });

        (endpoint, body_rx)
    }

    async fn read_request_body(socket: &mut tokio::net::TcpStream) -> String {
        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 4096];
        loop {
            let read = socket.read(&mut chunk).await.expect("read request");
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);

            let text = String::from_utf8_lossy(&buffer);
            let Some(head_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buffer.len() >= head_end + 4 + length {
                return String::from_utf8_lossy(&buffer[head_end + 4..head_end + 4 + length])
                    .into_owned();
            }
        }
        String::new()
    }

    fn chat_for(endpoint: &str) -> Arc<dyn ChatHandle> {
        let provider = GeminiProvider::new(
            ProviderConfig::new(GEMINI_PROVIDER_ID, "key").with_endpoint(endpoint),
        )
        .expect("provider builds");
        provider.begin_chat(ChatSessionConfig::default())
    }

    async fn run_to_end(handle: ProviderStreamHandle) -> Vec<StreamEventPayload> {
        let ProviderStreamHandle { mut stream, worker } = handle;
        worker.await;

        let mut payloads = Vec::new();
        while let Some(event) = stream.recv().await {
            payloads.push(event.payload);
        }
        payloads
    }

    #[tokio::test]
    async fn worker_reassembles_split_events_and_crlf_lines() {
        let (endpoint, mut bodies) = serve(vec![
            CannedResponse::event_stream(vec![
                "data: {\"candidates\": [{\"content\": {\"pa",
                "rts\": [{\"text\": \"Hel\"}]}}]}\r",
                "\n\r\ndata: {\"candidates\": [{\"content\": {\"parts\": [{\"text\": \"lo\"}]},\r\n",
                "data: \"groundingMetadata\": {\"groundingChunks\": [{\"web\": {\"uri\": \"https://a.example\", \"title\": \"A\"}}]}}]}\r\n\r\n",
                "data: {\"usageMetadata\": {\"totalTokenCount\": 3}}\n\n",
            ]),
            CannedResponse::event_stream(vec![
                "data: {\"candidates\": [{\"content\": {\"parts\": [{\"text\": \"again\"}]}}]}\n\n",
            ]),
        ])
        .await;
        let chat = chat_for(&endpoint);
        let target = StreamTarget::new(1, 1);

        let payloads = run_to_end(
            chat.send_streaming(target, "hi".to_string())
                .expect("stream opens"),
        )
        .await;

        assert_eq!(
            payloads,
            vec![
                StreamEventPayload::Partial(PartialResult::text("Hel")),
                StreamEventPayload::Partial(
                    PartialResult::text("lo")
                        .with_citations(vec![Source::new("A", "https://a.example")])
                ),
                StreamEventPayload::Done,
            ]
        );
        let first = bodies.recv().await.expect("first request");
        let first = serde_json::from_str::<serde_json::Value>(&first).expect("json body");
        assert_eq!(first["contents"].as_array().map(Vec::len), Some(1));
        assert_eq!(first["tools"][0]["googleSearch"], serde_json::json!({}));

        let payloads = run_to_end(
            chat.send_streaming(StreamTarget::new(1, 2), "more".to_string())
                .expect("stream opens"),
        )
        .await;
        assert_eq!(payloads.last(), Some(&StreamEventPayload::Done));

        let second = bodies.recv().await.expect("second request");
        let second = serde_json::from_str::<serde_json::Value>(&second).expect("json body");
        assert_eq!(second["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(second["contents"][1]["role"], "model");
        assert_eq!(second["contents"][1]["parts"][0]["text"], "Hello");
        assert_eq!(second["contents"][2]["parts"][0]["text"], "more");
    }

    #[tokio::test]
    async fn worker_reports_error_status_with_service_message() {
        let (endpoint, _bodies) = serve(vec![CannedResponse {
            status_line: "429 Too Many Requests",
            content_type: "application/json",
            pieces: vec![
                r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#,
            ],
        }])
        .await;

        let payloads = run_to_end(
            chat_for(&endpoint)
                .send_streaming(StreamTarget::new(1, 1), "hi".to_string())
                .expect("stream opens"),
        )
        .await;

        assert_eq!(payloads.len(), 1);
        let StreamEventPayload::Error(message) = &payloads[0] else {
            panic!("expected an error event, got {payloads:?}");
        };
        assert!(message.contains("429"));
        assert!(message.contains("RESOURCE_EXHAUSTED: Quota exceeded"));
    }

    #[tokio::test]
    async fn malformed_event_stops_the_reply_without_recording_it() {
        let (endpoint, mut bodies) = serve(vec![
            CannedResponse::event_stream(vec![
                "data: {\"candidates\": [{\"content\": {\"parts\": [{\"text\": \"ok\"}]}}]}\n\n",
                "data: {not json\n\n",
            ]),
            CannedResponse::event_stream(vec![]),
        ])
        .await;
        let chat = chat_for(&endpoint);

        let payloads = run_to_end(
            chat.send_streaming(StreamTarget::new(1, 1), "hi".to_string())
                .expect("stream opens"),
        )
        .await;

        assert_eq!(payloads[0], StreamEventPayload::Partial(PartialResult::text("ok")));
        assert!(matches!(payloads.last(), Some(StreamEventPayload::Error(_))));
        assert_eq!(payloads.len(), 2);

        let _ = bodies.recv().await;
        run_to_end(
            chat.send_streaming(StreamTarget::new(1, 2), "retry".to_string())
                .expect("stream opens"),
        )
        .await;
        let second = bodies.recv().await.expect("second request");
        let second = serde_json::from_str::<serde_json::Value>(&second).expect("json body");
        assert_eq!(second["contents"].as_array().map(Vec::len), Some(1));
        assert_eq!(second["contents"][0]["parts"][0]["text"], "retry");
    }

    #[test]
    fn stream_chunk_yields_text_and_grounding_sources() {
        let data = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "thinking", "thought": true},
                    {"text": "Rust 1.85 "},
                    {"text": "shipped edition 2024."}
                ]},
                "groundingMetadata": {"groundingChunks": [
                    {"web": {"uri": "https://blog.rust-lang.org", "title": "Rust Blog"}},
                    {"web": {"uri": "https://doc.rust-lang.org"}},
                    {"web": {"uri": "  "}},
                    {"retrievedContext": {}}
                ]}
            }]
        }"#;

        let partial = parse_stream_chunk(data).expect("chunk parses");
        assert_eq!(
            partial.text.as_deref(),
            Some("Rust 1.85 shipped edition 2024.")
        );
        assert_eq!(
            partial.citations,
            vec![
                Source::new("Rust Blog", "https://blog.rust-lang.org"),
                Source::new("https://doc.rust-lang.org", "https://doc.rust-lang.org"),
            ]
        );
    }

    #[test]
    fn usage_only_chunk_is_empty() {
        let partial = parse_stream_chunk(r#"{"usageMetadata": {"totalTokenCount": 12}}"#)
            .expect("chunk parses");
        assert!(partial.is_empty());
    }

    #[test]
    fn malformed_chunk_is_a_decode_error() {
        let error = parse_stream_chunk("{not json").expect_err("must fail");
        assert!(matches!(error, ProviderError::DecodePayload { .. }));
    }

    #[test]
    fn image_is_decoded_from_first_inline_part() {
        let encoded = BASE64_STANDARD.encode([0x89, b'P', b'N', b'G']);
        let body = format!(
            r#"{{"candidates": [{{"content": {{"parts": [
                {{"text": "Here you go"}},
                {{"inlineData": {{"mimeType": "image/jpeg", "data": "{encoded}"}}}}
            ]}}}}]}}"#
        );
        let response = serde_json::from_str::<GenerateContentResponse>(&body).expect("parses");

        let image = extract_image(response, "test").expect("image present");
        assert_eq!(image.bytes, vec![0x89, b'P', b'N', b'G']);
        assert_eq!(image.content_type, "image/jpeg");
    }

    #[test]
    fn text_only_response_means_no_image() {
        let response = serde_json::from_str::<GenerateContentResponse>(
            r#"{"candidates": [{"content": {"parts": [{"text": "I cannot draw that."}]}}]}"#,
        )
        .expect("parses");

        let error = extract_image(response, "test").expect_err("no image");
        assert!(matches!(error, ProviderError::NoImageProduced { .. }));
    }

    #[test]
    fn error_body_prefers_structured_status() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(error_message(body), "RESOURCE_EXHAUSTED: Quota exceeded");
        assert_eq!(error_message(" upstream timeout "), "upstream timeout");
    }

    #[test]
    fn edit_request_serializes_image_before_prompt() {
        let provider = GeminiProvider::new(ProviderConfig::new(GEMINI_PROVIDER_ID, "key"))
            .expect("provider builds");
        let base = ImagePayload::new(vec![1, 2, 3], "image/png");
        let body = provider.image_request_body(
            vec![WirePart::inline(&base), WirePart::text("make it blue")],
            AspectRatio::Landscape,
        );

        let json = serde_json::to_value(&body).expect("serializes");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["contents"][0]["parts"][1]["text"], "make it blue");
        assert_eq!(json["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        assert_eq!(json["generationConfig"]["imageConfig"]["imageSize"], "1K");
        assert_eq!(json["tools"][0]["googleSearch"], serde_json::json!({}));
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let result = GeminiProvider::new(ProviderConfig::new(GEMINI_PROVIDER_ID, "  "));
        assert!(matches!(
            result,
            Err(ProviderError::MissingApiKey { .. })
        ));
    }
}
