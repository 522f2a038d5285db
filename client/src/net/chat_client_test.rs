use super::*;
use crate::net::api::{ByteStream, TransportError};
use crate::state::chat::Role;
use crate::state::locale::MemoryLocaleStore;
use frames::RelayRequest;
use futures::channel::mpsc;
use std::time::Duration;

type Chunk = Result<Vec<u8>, TransportError>;

enum Script {
    Chunks(Vec<Chunk>),
    Channel(Mutex<Option<mpsc::UnboundedReceiver<Chunk>>>),
    Refuse(u16),
}

struct ScriptedTransport {
    script: Script,
    requests: Mutex<Vec<RelayRequest>>,
}

impl ScriptedTransport {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self { script, requests: Mutex::new(Vec::new()) })
    }

    fn chunks(chunks: &[&str]) -> Arc<Self> {
        Self::new(Script::Chunks(chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect()))
    }

    fn channel() -> (Arc<Self>, mpsc::UnboundedSender<Chunk>) {
        let (tx, rx) = mpsc::unbounded();
        (Self::new(Script::Channel(Mutex::new(Some(rx)))), tx)
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl RelayTransport for ScriptedTransport {
    async fn open(&self, request: &RelayRequest) -> Result<ByteStream, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.script {
            Script::Refuse(status) => Err(TransportError::Status(*status)),
            Script::Chunks(chunks) => {
                let items: Vec<Chunk> = chunks
                    .iter()
                    .map(|c| match c {
                        Ok(bytes) => Ok(bytes.clone()),
                        Err(e) => Err(TransportError::Body(e.to_string())),
                    })
                    .collect();
                Ok(futures::stream::iter(items).boxed())
            }
            Script::Channel(rx) => {
                let rx = rx.lock().unwrap().take().expect("channel script opened once");
                Ok(rx.boxed())
            }
        }
    }
}

fn client(transport: Arc<ScriptedTransport>) -> ChatClient {
    ChatClient::new(transport, Arc::new(MemoryLocaleStore::default()))
}

fn last(client: &ChatClient) -> ChatMessage {
    client.messages().last().cloned().expect("conversation is never empty")
}

const EN_FAILURE: &str = "Sorry, I encountered an error. Please try again.";

// =============================================================
// happy path
// =============================================================

#[tokio::test]
async fn end_to_end_reply_concatenates_fragments() {
    let transport = ScriptedTransport::chunks(&[
        "data: {\"content\":\"She\"}\n\n",
        "data: {\"content\":\" studied\"}\n\n",
        "data: {\"content\":\" CSE.\"}\n\n",
        "data: [DONE]\n\n",
    ]);
    let client = client(transport.clone());

    let outcome = client.send_message("What university did she attend?").await;
    assert_eq!(outcome, SendOutcome::Done);
    assert!(!client.is_loading());

    let messages = client.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].content, "What university did she attend?");
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(messages[2].content, "She studied CSE.");

    let sent = transport.requests.lock().unwrap()[0].clone();
    assert_eq!(sent.message.as_deref(), Some("What university did she attend?"));
    assert_eq!(sent.language.as_deref(), Some("en"));
}

#[tokio::test]
async fn reply_independent_of_read_boundaries() {
    let body = "data: {\"content\":\"学歴は\"}\n\ndata: {\"content\":\"CSEです。\"}\n\ndata: [DONE]\n\n";
    let bytes = body.as_bytes();

    for split in [1, 3, 7, 13, 22, bytes.len() - 1] {
        let chunks = vec![Ok(bytes[..split].to_vec()), Ok(bytes[split..].to_vec())];
        let client = client(ScriptedTransport::new(Script::Chunks(chunks)));
        assert_eq!(client.send_message("q").await, SendOutcome::Done, "split at {split}");
        assert_eq!(last(&client).content, "学歴はCSEです。", "split at {split}");
    }
}

#[tokio::test]
async fn malformed_line_is_skipped() {
    let transport = ScriptedTransport::chunks(&[
        "data: {\"content\":\"A\"}\n\n",
        "data: {not json\n\n",
        "event: ping\n\n",
        "data: {\"content\":\"B\"}\n\n",
        "data: [DONE]\n\n",
    ]);
    let client = client(transport);
    assert_eq!(client.send_message("q").await, SendOutcome::Done);
    assert_eq!(last(&client).content, "AB");
}

#[tokio::test]
async fn second_sentinel_is_harmless() {
    let transport = ScriptedTransport::chunks(&["data: {\"content\":\"Hi\"}\n\ndata: [DONE]\n\ndata: [DONE]\n\n"]);
    let client = client(transport);
    assert_eq!(client.send_message("q").await, SendOutcome::Done);
    assert!(!client.is_loading());
    assert_eq!(last(&client).content, "Hi");
}

#[tokio::test]
async fn end_of_body_without_sentinel_clears_loading() {
    let transport = ScriptedTransport::chunks(&["data: {\"content\":\"Partial\"}\n\n"]);
    let client = client(transport);
    assert_eq!(client.send_message("q").await, SendOutcome::Ended);
    assert!(!client.is_loading());
    assert_eq!(last(&client).content, "Partial");
}

#[tokio::test]
async fn unterminated_sentinel_at_end_of_body_counts() {
    let transport = ScriptedTransport::chunks(&["data: {\"content\":\"Hi\"}\n\ndata: [DONE]"]);
    let client = client(transport);
    assert_eq!(client.send_message("q").await, SendOutcome::Done);
}

// =============================================================
// ignored sends
// =============================================================

#[tokio::test]
async fn blank_text_is_ignored() {
    let transport = ScriptedTransport::chunks(&["data: [DONE]\n\n"]);
    let client = client(transport.clone());
    assert_eq!(client.send_message("   ").await, SendOutcome::Ignored);
    assert_eq!(client.messages().len(), 1);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn placeholder_exists_before_body_arrives_and_concurrent_send_ignored() {
    let (transport, tx) = ScriptedTransport::channel();
    let client = client(transport.clone());

    let (outcome, ()) = tokio::join!(client.send_message("first"), async {
        let messages = client.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "first");
        assert_eq!(messages[2].content, "");
        assert!(client.is_loading());

        assert_eq!(client.send_message("second").await, SendOutcome::Ignored);

        tx.unbounded_send(Ok(b"data: {\"content\":\"ok\"}\n\ndata: [DONE]\n\n".to_vec())).unwrap();
    });

    assert_eq!(outcome, SendOutcome::Done);
    assert_eq!(client.messages().len(), 3);
    assert_eq!(last(&client).content, "ok");
    assert_eq!(transport.calls(), 1);
}

// =============================================================
// failures
// =============================================================

#[tokio::test]
async fn refused_request_shows_failure_text() {
    let client = client(ScriptedTransport::new(Script::Refuse(500)));
    assert_eq!(client.send_message("q").await, SendOutcome::Failed);
    assert!(!client.is_loading());
    assert_eq!(last(&client).content, EN_FAILURE);
    assert_eq!(last(&client).role, Role::Assistant);
}

#[tokio::test]
async fn failure_text_follows_locale() {
    let store = Arc::new(MemoryLocaleStore::new(Some(Locale::Ja)));
    let client = ChatClient::new(ScriptedTransport::new(Script::Refuse(502)), store);
    assert_eq!(client.messages()[0].content, LocaleStrings::for_locale(Locale::Ja).greeting);
    client.send_message("質問").await;
    assert_eq!(last(&client).content, LocaleStrings::for_locale(Locale::Ja).failure);
}

#[tokio::test]
async fn mid_stream_error_keeps_partial_reply() {
    let transport = ScriptedTransport::new(Script::Chunks(vec![
        Ok(b"data: {\"content\":\"She\"}\n\n".to_vec()),
        Err(TransportError::Body("reset".into())),
    ]));
    let client = client(transport);
    assert_eq!(client.send_message("q").await, SendOutcome::Failed);
    assert!(!client.is_loading());
    assert_eq!(last(&client).content, "She");
}

#[tokio::test]
async fn abort_ends_in_flight_send() {
    let (transport, tx) = ScriptedTransport::channel();
    let client = client(transport);

    let (outcome, ()) = tokio::join!(client.send_message("q"), async {
        tx.unbounded_send(Ok(b"data: {\"content\":\"She\"}\n\n".to_vec())).unwrap();
        while last(&client).content != "She" {
            tokio::task::yield_now().await;
        }
        client.abort();
    });

    assert_eq!(outcome, SendOutcome::Failed);
    assert!(!client.is_loading());
    assert_eq!(last(&client).content, "She");
    drop(tx);
}

#[tokio::test]
async fn dropping_send_future_releases_client() {
    let (transport, _tx) = ScriptedTransport::channel();
    let client = client(transport);

    let timed_out = tokio::time::timeout(Duration::from_millis(20), client.send_message("q")).await;
    assert!(timed_out.is_err());
    assert!(!client.is_loading());
    assert_eq!(last(&client).content, EN_FAILURE);
}

#[tokio::test]
async fn abort_when_idle_is_noop() {
    let client = client(ScriptedTransport::chunks(&[]));
    client.abort();
    assert!(!client.is_loading());
}

// =============================================================
// options
// =============================================================

#[tokio::test]
async fn renderer_sees_updates_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let transport = ScriptedTransport::chunks(&["data: {\"content\":\"A\"}\n\ndata: {\"content\":\"B\"}\n\ndata: [DONE]\n\n"]);
    let client = client(transport).on_update(move |update| sink.lock().unwrap().push(update.clone()));

    client.send_message("q").await;
    let id = last(&client).id;
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ChatUpdate::Fragment { id: id.clone(), text: "A".into() },
            ChatUpdate::Fragment { id: id.clone(), text: "B".into() },
            ChatUpdate::Finished { id },
        ]
    );
}

#[tokio::test]
async fn history_sent_only_when_enabled() {
    let transport = ScriptedTransport::chunks(&["data: [DONE]\n\n"]);
    let client = client(transport.clone()).with_history(true);
    client.send_message("q").await;
    let sent = transport.requests.lock().unwrap()[0].clone();
    assert_eq!(sent.messages.len(), 1);
    assert_eq!(sent.messages[0].role, "assistant");

    let plain_transport = ScriptedTransport::chunks(&["data: [DONE]\n\n"]);
    let plain = self::client(plain_transport.clone());
    plain.send_message("q").await;
    assert!(plain_transport.requests.lock().unwrap()[0].messages.is_empty());
}

#[tokio::test]
async fn set_locale_changes_request_language() {
    let transport = ScriptedTransport::chunks(&["data: [DONE]\n\n"]);
    let client = client(transport.clone());
    client.set_locale(Locale::Ja).unwrap();
    assert_eq!(client.locale(), Locale::Ja);
    client.send_message("q").await;
    assert_eq!(transport.requests.lock().unwrap()[0].language.as_deref(), Some("ja"));
}
