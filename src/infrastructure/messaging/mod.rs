use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

const SUBSCRIPTION_BUFFER: usize = 64;
const INBOX_PREFIX: &str = "_INBOX";

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("message bus is closed")]
    Closed,

    #[error("no subscribers for subject '{0}'")]
    NoResponders(String),

    #[error("no reply received within {0:?}")]
    Timeout(Duration),

    #[error("invalid message encoding: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("message bus I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    pub subject: String,
    pub payload: Vec<u8>,
    /// Subject the sender expects a reply on, if any
    pub reply: Option<String>,
}

impl BusMessage {
    pub fn new(subject: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
            reply: None,
        }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }
}

/// Receiving end of a subject subscription. Ends when the bus shuts down.
pub struct Subscription {
    subject: String,
    receiver: mpsc::Receiver<BusMessage>,
}

impl Subscription {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub async fn next(&mut self) -> Option<BusMessage> {
        self.receiver.recv().await
    }
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn subscribe(&self, subject: &str) -> Result<Subscription, BusError>;

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError>;
}

/// Subject to subscriber fan-out shared by the bus implementations
#[derive(Default)]
struct Router {
    routes: Mutex<HashMap<String, Vec<mpsc::Sender<BusMessage>>>>,
}

impl Router {
    async fn add(&self, subject: &str) -> Subscription {
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.routes
            .lock()
            .await
            .entry(subject.to_string())
            .or_default()
            .push(sender);

        Subscription {
            subject: subject.to_string(),
            receiver,
        }
    }

    async fn senders(&self, subject: &str) -> Vec<mpsc::Sender<BusMessage>> {
        let mut routes = self.routes.lock().await;
        let Some(senders) = routes.get_mut(subject) else {
            return Vec::new();
        };
        senders.retain(|s| !s.is_closed());
        senders.clone()
    }

    /// Fans out without waiting. A subscriber with a full buffer misses the
    /// message. Returns the number of subscribers the message reached.
    async fn deliver(&self, message: BusMessage) -> usize {
        let mut delivered = 0;
        for sender in self.senders(&message.subject).await {
            match sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => tracing::warn!(
                    subject = %message.subject,
                    "Subscriber buffer full, dropping message"
                ),
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Waits for buffer space in every subscriber. Stream readers use this so
    /// a slow consumer pauses reading instead of losing inbound messages.
    async fn forward(&self, message: BusMessage) -> usize {
        let mut delivered = 0;
        for sender in self.senders(&message.subject).await {
            if sender.send(message.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    async fn count(&self, subject: &str) -> usize {
        self.routes
            .lock()
            .await
            .get(subject)
            .map_or(0, |senders| senders.iter().filter(|s| !s.is_closed()).count())
    }

    async fn close(&self) {
        self.routes.lock().await.clear();
    }
}

/// Process-local bus with request/reply over generated inbox subjects.
#[derive(Default)]
pub struct InMemoryMessageBus {
    router: Router,
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish_message(&self, message: BusMessage) -> Result<usize, BusError> {
        Ok(self.router.deliver(message).await)
    }

    /// Publish with a fresh reply inbox and wait for the first reply.
    pub async fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> Result<BusMessage, BusError> {
        let inbox = format!("{}.{}", INBOX_PREFIX, Uuid::new_v4());
        let mut replies = self.router.add(&inbox).await;

        let message = BusMessage::new(subject, payload).with_reply(&inbox);
        if self.router.deliver(message).await == 0 {
            return Err(BusError::NoResponders(subject.to_string()));
        }

        tokio::time::timeout(timeout, replies.next())
            .await
            .map_err(|_| BusError::Timeout(timeout))?
            .ok_or(BusError::Closed)
    }

    pub async fn subscriber_count(&self, subject: &str) -> usize {
        self.router.count(subject).await
    }

    /// Ends every open subscription.
    pub async fn close(&self) {
        self.router.close().await;
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn subscribe(&self, subject: &str) -> Result<Subscription, BusError> {
        Ok(self.router.add(subject).await)
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.router
            .deliver(BusMessage::new(subject, payload))
            .await;
        Ok(())
    }
}

/// One message per line on the wire
#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reply: Option<String>,
    data: serde_json::Value,
}

type BoxedReader = Box<dyn AsyncBufRead + Unpin + Send>;
type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Bus over a pair of byte streams carrying JSON lines, e.g. stdin/stdout.
///
/// Inbound lines are `{"subject", "reply"?, "data"}` and are routed to local
/// subscribers. Published messages are written as lines in the same shape.
pub struct JsonLinesBus {
    router: Arc<Router>,
    reader: Mutex<Option<BoxedReader>>,
    writer: Mutex<BoxedWriter>,
}

impl JsonLinesBus {
    pub fn new(
        reader: impl AsyncBufRead + Unpin + Send + 'static,
        writer: impl AsyncWrite + Unpin + Send + 'static,
    ) -> Self {
        Self {
            router: Arc::new(Router::default()),
            reader: Mutex::new(Some(Box::new(reader))),
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdio() -> Self {
        Self::new(
            tokio::io::BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
    }

    /// Starts routing inbound lines on first use.
    async fn ensure_reading(&self) {
        let Some(reader) = self.reader.lock().await.take() else {
            return;
        };

        let router = self.router.clone();
        tokio::spawn(async move {
            let mut lines = reader.lines();
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read from message stream");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                match decode_line(&line) {
                    Ok(message) => {
                        let subject = message.subject.clone();
                        if router.forward(message).await == 0 {
                            tracing::warn!(subject = %subject, "Dropping message without subscribers");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Dropping malformed message line"),
                }
            }

            tracing::info!("Message stream closed");
            router.close().await;
        });
    }
}

#[async_trait]
impl MessageBus for JsonLinesBus {
    async fn subscribe(&self, subject: &str) -> Result<Subscription, BusError> {
        let subscription = self.router.add(subject).await;
        self.ensure_reading().await;
        Ok(subscription)
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let mut line = encode_line(&BusMessage::new(subject, payload))?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

fn decode_line(line: &str) -> Result<BusMessage, BusError> {
    let wire: WireMessage = serde_json::from_str(line)?;
    Ok(BusMessage {
        subject: wire.subject,
        payload: serde_json::to_vec(&wire.data)?,
        reply: wire.reply,
    })
}

/// Payloads that are not JSON travel as a JSON string.
fn encode_line(message: &BusMessage) -> Result<String, BusError> {
    let data = serde_json::from_slice(&message.payload).unwrap_or_else(|_| {
        serde_json::Value::String(String::from_utf8_lossy(&message.payload).into_owned())
    });

    Ok(serde_json::to_string(&WireMessage {
        subject: message.subject.clone(),
        reply: message.reply.clone(),
        data,
    })?)
}
