//! Transport seam between connections and the socket library.
//!
//! A [`Transport`] opens one receive-only message stream per call. The stream
//! yields text payloads; it ends when the peer closes and yields an error on
//! transport failure. Dropping the stream closes the socket.

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio_tungstenite::connect_async_with_config;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;

use super::config::StreamConfig;
use super::error::WsError;

/// Inbound text frames of one open transport session.
pub type FrameStream = BoxStream<'static, Result<String, WsError>>;

/// Opens transport sessions toward stream endpoints.
pub trait Transport: Send + Sync + 'static {
    /// Opens a session to `url`. Resolves once the session is open.
    fn open(&self, url: String) -> BoxFuture<'static, Result<FrameStream, WsError>>;
}

/// WebSocket transport backed by `tokio-tungstenite`.
#[derive(Debug, Clone)]
pub struct TungsteniteTransport {
    ws_config: WebSocketConfig,
}

impl TungsteniteTransport {
    /// Creates a transport sized by the given stream configuration.
    #[must_use]
    pub fn new(config: &StreamConfig) -> Self {
        let ws_config = WebSocketConfig::default()
            .max_message_size(Some(config.max_message_size))
            .max_frame_size(Some(config.max_message_size));
        Self { ws_config }
    }
}

impl Default for TungsteniteTransport {
    fn default() -> Self {
        Self::new(&StreamConfig::default())
    }
}

impl Transport for TungsteniteTransport {
    fn open(&self, url: String) -> BoxFuture<'static, Result<FrameStream, WsError>> {
        let ws_config = self.ws_config;
        Box::pin(async move {
            let (stream, _) = connect_async_with_config(url, Some(ws_config), true)
                .await
                .map_err(|e| WsError::Connection(e.to_string()))?;

            let frames = stream.filter_map(|message| async move {
                match message {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(Message::Binary(data)) => Some(
                        String::from_utf8(data.to_vec())
                            .map_err(|e| WsError::Deserialization(e.to_string())),
                    ),
                    // Ping/pong replies are queued by tungstenite on read.
                    Ok(_) => None,
                    Err(e) => Some(Err(WsError::from(e))),
                }
            });

            Ok(frames.boxed())
        })
    }
}


#[cfg(test)]
mod tests {
    use super::scripted::ScriptedTransport;
    use super::*;

    #[test]
    fn test_tungstenite_transport_default() {
        let transport = TungsteniteTransport::default();
        assert_eq!(
            transport.ws_config.max_message_size,
            Some(super::super::config::DEFAULT_MAX_MESSAGE_SIZE)
        );
    }

    #[tokio::test]
    async fn test_scripted_transport_accept_delivers_frames() {
        let (transport, mut opens) = ScriptedTransport::new();
        let open = transport.open("wss://example.com/ws/btcusdt@ticker".to_string());

        let pending = opens.recv().await.expect("pending open");
        assert_eq!(pending.url, "wss://example.com/ws/btcusdt@ticker");
        let frames_tx = pending.accept();

        let mut frames = open.await.expect("opened");
        frames_tx.send(Ok("hello".to_string())).expect("send");
        drop(frames_tx);

        assert_eq!(frames.next().await, Some(Ok("hello".to_string())));
        assert_eq!(frames.next().await, None);
    }

    #[tokio::test]
    async fn test_scripted_transport_reject() {
        let (transport, mut opens) = ScriptedTransport::new();
        let open = transport.open("wss://example.com/ws".to_string());

        let pending = opens.recv().await.expect("pending open");
        pending.reject(WsError::Connection("refused".to_string()));

        assert!(matches!(open.await, Err(WsError::Connection(_))));
    }

    #[test]
    fn test_scripted_open_waits_for_reply() {
        let (transport, mut opens) = ScriptedTransport::new();
        let mut open = tokio_test::task::spawn(transport.open("wss://example.com/ws".to_string()));
        tokio_test::assert_pending!(open.poll().map(Result::err));

        let pending = opens.try_recv().expect("pending open");
        assert!(!pending.is_abandoned());
        drop(pending);

        assert!(open.is_woken());
        let err = tokio_test::assert_ready!(open.poll().map(Result::err));
        assert_eq!(err, Some(WsError::Connection("open dropped".to_string())));
    }
}
