use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use atelier_llm::{
    BoxFuture, ChatHandle, ChatSessionConfig, EditRequest, GenerativeProvider, ImagePayload,
    ImageRequest, ProviderError, ProviderResult, ProviderStreamHandle, StreamEventMapped,
    StreamEventPayload, StreamTarget, make_event_stream,
};

/// Reply for the next `send_streaming` call.
pub(crate) enum ScriptedReply {
    Events(Vec<StreamEventPayload>),
    Refuse(ProviderError),
}

impl ScriptedReply {
    pub(crate) fn events(events: Vec<StreamEventPayload>) -> Self {
        Self::Events(events)
    }
}

/// In-memory provider that replays queued results and records requests.
#[derive(Default)]
pub(crate) struct ScriptedProvider {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    sent: Arc<Mutex<Vec<String>>>,
    images: Mutex<VecDeque<ProviderResult<ImagePayload>>>,
    image_requests: Mutex<Vec<ImageRequest>>,
    edit_requests: Mutex<Vec<EditRequest>>,
    chats_opened: AtomicUsize,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn push_reply(&self, reply: ScriptedReply) {
        self.replies.lock().expect("replies lock").push_back(reply);
    }

    pub(crate) fn push_image(&self, result: ProviderResult<ImagePayload>) {
        self.images.lock().expect("images lock").push_back(result);
    }

    pub(crate) fn sent_messages(&self) -> Vec<String> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub(crate) fn image_requests(&self) -> Vec<ImageRequest> {
        self.image_requests.lock().expect("requests lock").clone()
    }

    pub(crate) fn edit_requests(&self) -> Vec<EditRequest> {
        self.edit_requests.lock().expect("requests lock").clone()
    }

    pub(crate) fn chats_opened(&self) -> usize {
        self.chats_opened.load(Ordering::SeqCst)
    }

    fn next_image(&self) -> ProviderResult<ImagePayload> {
        self.images
            .lock()
            .expect("images lock")
            .pop_front()
            .unwrap_or(Err(ProviderError::NoImageProduced {
                stage: "scripted-image",
            }))
    }
}

struct ScriptedChat {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl ChatHandle for ScriptedChat {
    fn send_streaming(
        &self,
        target: StreamTarget,
        text: String,
    ) -> ProviderResult<ProviderStreamHandle> {
        let reply = self
            .replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .unwrap_or(ScriptedReply::Events(vec![StreamEventPayload::Done]));
        let events = match reply {
            ScriptedReply::Events(events) => events,
            ScriptedReply::Refuse(error) => return Err(error),
        };
        self.sent.lock().expect("sent lock").push(text);

        let (event_tx, stream) = make_event_stream(target);
        let worker = Box::pin(async move {
            for payload in events {
                if event_tx.send(StreamEventMapped::new(target, payload)).is_err() {
                    break;
                }
                tokio::task::yield_now().await;
            }
        });
        Ok(ProviderStreamHandle { stream, worker })
    }
}

impl GenerativeProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "Scripted"
    }

    fn begin_chat(&self, _config: ChatSessionConfig) -> Arc<dyn ChatHandle> {
        self.chats_opened.fetch_add(1, Ordering::SeqCst);
        Arc::new(ScriptedChat {
            replies: self.replies.clone(),
            sent: self.sent.clone(),
        })
    }

    fn generate_image<'a>(
        &'a self,
        request: ImageRequest,
    ) -> BoxFuture<'a, ProviderResult<ImagePayload>> {
        Box::pin(async move {
            self.image_requests
                .lock()
                .expect("requests lock")
                .push(request);
            self.next_image()
        })
    }

    fn edit_image<'a>(&'a self, request: EditRequest) -> BoxFuture<'a, ProviderResult<ImagePayload>> {
        Box::pin(async move {
            self.edit_requests
                .lock()
                .expect("requests lock")
                .push(request);
            self.next_image()
        })
    }
}
