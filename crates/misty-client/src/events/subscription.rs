//! Event subscription implementation

use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use super::payload::{decode_frame, EventMessage, Frame};
use super::types::{
    EventType, SubscribeFrame, SubscriptionOptions, SubscriptionState, UnsubscribeFrame,
};
use crate::error::{MistyClientError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// One named WebSocket event channel
///
/// Holds at most one message: every inbound event overwrites the previous
/// one, so callers poll for the latest state rather than consume a queue.
///
/// # Lifecycle
///
/// - Created unsubscribed via `MistyClient::register_subscription()`
/// - `subscribe()` opens the socket and starts buffering events
/// - `get_message()` returns the latest event, never blocks
/// - `unsubscribe()` tells the robot, closes the socket and clears the buffer
///
/// # Example
///
/// ```ignore
/// let slam = client.register_subscription("slam", EventType::SlamStatus, 100)?;
/// slam.subscribe().await?;
///
/// if let Some(msg) = slam.get_message() {
///     println!("{:?}", msg.as_slam_status());
/// }
///
/// slam.unsubscribe().await?;
/// ```
pub struct EventSubscription {
    name: String,
    options: SubscriptionOptions,
    ws_url: Url,
    handshake_timeout: Duration,
    channel: Option<Channel>,
}

/// Open socket plus the task draining it
struct Channel {
    writer: WsWriter,
    latest: watch::Receiver<Option<EventMessage>>,
    reader: JoinHandle<()>,
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl EventSubscription {
    pub(crate) fn new(
        name: String,
        options: SubscriptionOptions,
        ws_url: Url,
        handshake_timeout: Duration,
    ) -> Self {
        Self {
            name,
            options,
            ws_url,
            handshake_timeout,
            channel: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn event_type(&self) -> &EventType {
        &self.options.event_type
    }

    pub fn debounce_ms(&self) -> u32 {
        self.options.debounce_ms
    }

    pub fn options(&self) -> &SubscriptionOptions {
        &self.options
    }

    pub fn state(&self) -> SubscriptionState {
        if self.channel.is_some() {
            SubscriptionState::Subscribed
        } else {
            SubscriptionState::Unsubscribed
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.channel.is_some()
    }

    /// Open the socket and register with the robot
    ///
    /// Waits for the robot's registration reply before returning. The
    /// connect, upgrade and registration share one deadline, the client's
    /// connect timeout. Fails with `AlreadySubscribed` if the channel is
    /// already open.
    pub async fn subscribe(&mut self) -> Result<()> {
        if self.channel.is_some() {
            return Err(MistyClientError::AlreadySubscribed(self.name.clone()));
        }

        let (writer, reader, first) = tokio::time::timeout(self.handshake_timeout, self.open())
            .await
            .map_err(|_| {
                MistyClientError::Connection(format!(
                    "No registration reply for {} within {:?}",
                    self.name, self.handshake_timeout
                ))
            })??;

        let (tx, rx) = watch::channel(first);
        let reader = tokio::spawn(read_events(
            reader,
            tx,
            self.name.clone(),
            self.options.event_type.clone(),
        ));

        self.channel = Some(Channel {
            writer,
            latest: rx,
            reader,
        });

        info!(
            subscription = %self.name,
            event_type = %self.options.event_type,
            "Subscribed"
        );
        Ok(())
    }

    /// Connect, send the subscribe frame and wait for the acknowledgement
    async fn open(&self) -> Result<(WsWriter, WsReader, Option<EventMessage>)> {
        debug!("Connecting to event stream: {}", self.ws_url);

        let (stream, _response) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| MistyClientError::Connection(format!("{}: {}", self.ws_url, e)))?;
        let (mut writer, mut reader) = stream.split();

        let conditions = &self.options.conditions;
        let frame = SubscribeFrame {
            operation: "subscribe",
            event_type: &self.options.event_type,
            debounce_ms: self.options.debounce_ms,
            event_name: &self.name,
            return_property: self.options.return_property.as_deref(),
            event_conditions: (!conditions.is_empty()).then_some(conditions.as_slice()),
        };
        let text = serde_json::to_string(&frame)
            .map_err(|e| MistyClientError::Parse(e.to_string()))?;
        writer
            .send(Message::text(text))
            .await
            .map_err(|e| MistyClientError::Connection(e.to_string()))?;

        let first = self.await_registration(&mut reader).await?;
        Ok((writer, reader, first))
    }

    /// Read until the robot acknowledges the subscription.
    ///
    /// An event arriving first also proves the registration; it seeds the
    /// buffer instead of being lost.
    async fn await_registration(&self, reader: &mut WsReader) -> Result<Option<EventMessage>> {
        while let Some(message) = reader.next().await {
            match message.map_err(|e| MistyClientError::Connection(e.to_string()))? {
                Message::Text(text) => {
                    return match decode_frame(text.as_str(), &self.options.event_type) {
                        Ok(Frame::Registration(reply)) => {
                            debug!("Registration reply for {}: {}", self.name, reply);
                            Ok(None)
                        }
                        Ok(Frame::Event(msg)) => Ok(Some(msg)),
                        Err(e) => Err(MistyClientError::Connection(format!(
                            "WebSocket stream exception: {}",
                            e
                        ))),
                    };
                }
                Message::Close(_) => break,
                _ => continue,
            }
        }
        Err(MistyClientError::Connection(format!(
            "Stream closed before {} was registered",
            self.name
        )))
    }

    /// Latest event received, or `None` if none has arrived
    ///
    /// Never blocks and never queues: polling twice without a new frame in
    /// between returns the same message. Always `None` while unsubscribed.
    pub fn get_message(&mut self) -> Option<EventMessage> {
        self.channel
            .as_mut()
            .and_then(|channel| channel.latest.borrow_and_update().clone())
    }

    /// Whether an event arrived since the last `get_message()`
    pub fn has_new_message(&self) -> bool {
        self.channel
            .as_ref()
            .map(|channel| channel.latest.has_changed().unwrap_or(false))
            .unwrap_or(false)
    }

    /// Poll until the latest event satisfies `predicate` or `timeout` elapses
    pub async fn wait_for<F>(&mut self, predicate: F, timeout: Duration) -> Result<EventMessage>
    where
        F: Fn(&EventMessage) -> bool,
    {
        let name = self.name.clone();
        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| MistyClientError::NotSubscribed(name.clone()))?;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(msg) = channel.latest.borrow_and_update().as_ref() {
                if predicate(msg) {
                    return Ok(msg.clone());
                }
            }

            match tokio::time::timeout_at(deadline, channel.latest.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) => {
                    return Err(MistyClientError::Connection(format!(
                        "Event stream for {} ended",
                        name
                    )))
                }
                Err(_) => return Err(MistyClientError::Timeout),
            }
        }
    }

    /// Unregister from the robot and close the socket
    ///
    /// The buffered message is discarded. Fails with `NotSubscribed` if the
    /// channel is not open.
    pub async fn unsubscribe(&mut self) -> Result<()> {
        let Some(mut channel) = self.channel.take() else {
            return Err(MistyClientError::NotSubscribed(self.name.clone()));
        };

        let frame = UnsubscribeFrame {
            operation: "unsubscribe",
            event_name: &self.name,
        };
        let text = serde_json::to_string(&frame)
            .map_err(|e| MistyClientError::Parse(e.to_string()))?;

        if let Err(e) = channel.writer.send(Message::text(text)).await {
            warn!("Failed to send unsubscribe for {}: {}", self.name, e);
        }
        if let Err(e) = channel.writer.close().await {
            debug!("Close handshake for {} failed: {}", self.name, e);
        }

        info!(subscription = %self.name, "Unsubscribed");
        Ok(())
    }
}

impl std::fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSubscription")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}

/// Drain the socket into the single-slot buffer until it closes
async fn read_events(
    mut reader: WsReader,
    latest: watch::Sender<Option<EventMessage>>,
    name: String,
    event_type: EventType,
) {
    while let Some(message) = reader.next().await {
        match message {
            Ok(Message::Text(text)) => match decode_frame(text.as_str(), &event_type) {
                Ok(Frame::Event(msg)) => {
                    latest.send_replace(Some(msg));
                }
                Ok(Frame::Registration(reply)) => {
                    debug!("{}: {}", name, reply);
                }
                Err(e) => {
                    warn!("Dropping undecodable frame on {}: {}", name, e);
                }
            },
            Ok(Message::Close(_)) => {
                debug!("Event stream {} closed by robot", name);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Event stream {} failed: {}", name, e);
                break;
            }
        }
    }
}
