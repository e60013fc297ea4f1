// WebSocket hub: accepts viewer connections, forwards their messages to
// the app loop, and fans replication events out to every connected socket.

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

/// Events emitted by the WebSocket hub to the application layer.
#[derive(Debug, Clone, PartialEq)]
pub enum WsEvent {
    /// A viewer connected.
    Connected { addr: String },
    /// A viewer disconnected.
    Disconnected { addr: String },
    /// A text message was received from a viewer (raw JSON string).
    Message { addr: String, text: String },
}

/// What to do with one incoming WebSocket frame. Pure classification so
/// frame handling is unit-testable without sockets.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameAction {
    /// Forward the text payload to the app layer.
    Forward(String),
    /// The peer is closing; stop the connection task.
    Close,
    /// Binary/ping/pong frames carry nothing for us.
    Ignore,
}

/// Classify a single frame from a viewer connection.
pub fn classify_frame(msg: &Message) -> FrameAction {
    match msg {
        Message::Text(text) => FrameAction::Forward(text.to_string()),
        Message::Close(_) => FrameAction::Close,
        _ => FrameAction::Ignore,
    }
}

/// Bind the hub listener on `127.0.0.1:{port}`.
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    info!("WebSocket hub listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Run the hub: accept connections forever, spawning one task per viewer.
///
/// Inbound text frames are forwarded through `tx`; everything published on
/// `outbound` is delivered to every connected viewer. Returns when the app
/// side of `tx` is dropped.
pub async fn run(
    listener: TcpListener,
    tx: mpsc::Sender<WsEvent>,
    outbound: broadcast::Sender<String>,
) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        if tx.is_closed() {
            return Ok(());
        }
        info!("Accepted TCP connection from {addr}");
        tokio::spawn(handle_connection(
            stream,
            addr.to_string(),
            tx.clone(),
            outbound.subscribe(),
        ));
    }
}

/// Serve one viewer connection until it closes or errors.
async fn handle_connection(
    stream: TcpStream,
    addr: String,
    tx: mpsc::Sender<WsEvent>,
    mut outbound: broadcast::Receiver<String>,
) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {addr}: {e}");
            return;
        }
    };

    if tx
        .send(WsEvent::Connected { addr: addr.clone() })
        .await
        .is_err()
    {
        return;
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            frame = read.next() => {
                match frame {
                    Some(Ok(msg)) => match classify_frame(&msg) {
                        FrameAction::Forward(text) => {
                            let event = WsEvent::Message { addr: addr.clone(), text };
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                        FrameAction::Close => {
                            info!("Viewer {addr} sent close frame");
                            break;
                        }
                        FrameAction::Ignore => {}
                    },
                    Some(Err(e)) => {
                        warn!("WebSocket error from {addr}: {e}");
                        break;
                    }
                    None => break,
                }
            }
            event = outbound.recv() => {
                match event {
                    Ok(json) => {
                        if write.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Dropped events are recoverable: the viewer can
                        // reconcile from storage at any time.
                        warn!("Viewer {addr} lagged, skipped {skipped} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    let _ = tx.send(WsEvent::Disconnected { addr }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    #[test]
    fn text_frames_are_forwarded() {
        let action = classify_frame(&Message::text("hello"));
        assert_eq!(action, FrameAction::Forward("hello".to_string()));
    }

    #[test]
    fn json_payload_preserved_exactly() {
        let payload = r#"{"type":"BID","teamId":"MUM","bidAmount":5000}"#;
        let action = classify_frame(&Message::text(payload));
        assert_eq!(action, FrameAction::Forward(payload.to_string()));
    }

    #[test]
    fn close_frames_stop_the_connection() {
        assert_eq!(classify_frame(&Message::Close(None)), FrameAction::Close);
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "bye".into(),
        };
        assert_eq!(
            classify_frame(&Message::Close(Some(frame))),
            FrameAction::Close
        );
    }

    #[test]
    fn binary_and_ping_pong_are_ignored() {
        assert_eq!(
            classify_frame(&Message::Binary(vec![1, 2, 3].into())),
            FrameAction::Ignore
        );
        assert_eq!(
            classify_frame(&Message::Ping(vec![].into())),
            FrameAction::Ignore
        );
        assert_eq!(
            classify_frame(&Message::Pong(vec![].into())),
            FrameAction::Ignore
        );
    }

    #[tokio::test]
    async fn broadcast_reaches_multiple_subscribers() {
        let (outbound, _) = broadcast::channel::<String>(16);
        let mut rx_a = outbound.subscribe();
        let mut rx_b = outbound.subscribe();

        outbound.send("event-1".to_string()).unwrap();

        assert_eq!(rx_a.recv().await.unwrap(), "event-1");
        assert_eq!(rx_b.recv().await.unwrap(), "event-1");
    }
}
