//! RTM websocket feed buffering events until the harness drains them.

use futures_util::StreamExt;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::{SlackError, SlackEvent};

/// Live RTM connection. A reader task decodes frames into [`SlackEvent`]s and
/// buffers them; [`RtmFeed::drain`] hands back whatever has arrived so far.
///
/// Once the socket fails or ends the feed is closed for good: buffered events
/// are still returned, after which every drain is an error.
pub struct RtmFeed {
    receiver: mpsc::UnboundedReceiver<FeedItem>,
    reader: JoinHandle<()>,
    closed: Option<String>,
}

enum FeedItem {
    Event(SlackEvent),
    Closed(String),
}

impl RtmFeed {
    pub async fn connect(url: &str) -> Result<Self, SlackError> {
        let (mut stream, _response) = connect_async(url).await?;
        let (sender, receiver) = mpsc::unbounded_channel();

        let reader = tokio::spawn(async move {
            let reason = loop {
                let message = match stream.next().await {
                    Some(Ok(message)) => message,
                    Some(Err(error)) => {
                        tracing::warn!(%error, "rtm websocket read failed");
                        break format!("websocket read failed: {error}");
                    }
                    None => break "websocket stream ended".to_string(),
                };
                match parse_rtm_frame(message) {
                    Ok(Some(event)) => {
                        if sender.send(FeedItem::Event(event)).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(error) => tracing::warn!(%error, "skipping undecodable rtm frame"),
                }
            };
            tracing::debug!(%reason, "rtm reader finished");
            let _ = sender.send(FeedItem::Closed(reason));
        });

        Ok(Self {
            receiver,
            reader,
            closed: None,
        })
    }

    /// Returns every buffered event without waiting for new ones.
    ///
    /// Fails with [`SlackError::FeedClosed`] once the socket is gone and the
    /// buffer is empty.
    pub fn drain(&mut self) -> Result<Vec<SlackEvent>, SlackError> {
        let mut events = Vec::new();
        while self.closed.is_none() {
            match self.receiver.try_recv() {
                Ok(FeedItem::Event(event)) => events.push(event),
                Ok(FeedItem::Closed(reason)) => self.closed = Some(reason),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = Some("rtm reader stopped".to_string());
                }
            }
        }
        match &self.closed {
            Some(reason) if events.is_empty() => Err(SlackError::FeedClosed(reason.clone())),
            _ => Ok(events),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.closed.is_none() && !self.reader.is_finished()
    }
}

impl Drop for RtmFeed {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn parse_rtm_frame(message: WsMessage) -> Result<Option<SlackEvent>, SlackError> {
    match message {
        WsMessage::Text(text) => Ok(Some(SlackEvent::from_json(&text)?)),
        WsMessage::Binary(bytes) => Ok(Some(serde_json::from_slice::<SlackEvent>(&bytes)?)),
        WsMessage::Ping(_) | WsMessage::Pong(_) => Ok(None),
        WsMessage::Close(_) | WsMessage::Frame(_) => Ok(None),
    }
}
