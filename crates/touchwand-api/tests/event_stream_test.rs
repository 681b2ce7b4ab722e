#![allow(clippy::unwrap_used)]
// Integration tests for `EventStream` against a local WebSocket hub.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use url::Url;

use touchwand_api::{EventStream, StreamConfig, StreamState, UnitRecord, UnitStatusListener};

const WAIT: Duration = Duration::from_secs(5);

// ── Fake hub ────────────────────────────────────────────────────────

/// What the hub observed from the client.
#[derive(Debug, PartialEq)]
enum Seen {
    Text(String),
    Closed,
}

struct FakeHub {
    url: Url,
    /// Sub-protocol offered by the client during the handshake.
    protocol: Arc<Mutex<Option<String>>>,
    outgoing: mpsc::UnboundedSender<Message>,
    seen: mpsc::UnboundedReceiver<Seen>,
}

impl FakeHub {
    async fn next_seen(&mut self) -> Seen {
        tokio::time::timeout(WAIT, self.seen.recv())
            .await
            .expect("hub saw nothing")
            .expect("hub task ended")
    }

    fn send(&self, text: impl Into<String>) {
        let text: String = text.into();
        self.outgoing.send(Message::Text(text.into())).unwrap();
    }
}

/// Accept one connection on `/async`, echo `relay_protocol`, then relay
/// frames both ways until either side closes.
async fn start_hub() -> FakeHub {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let protocol = Arc::new(Mutex::new(None));
    let (outgoing, mut to_client) = mpsc::unbounded_channel::<Message>();
    let (seen_tx, seen) = mpsc::unbounded_channel();

    let offered = Arc::clone(&protocol);
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let callback = move |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
            let value = req
                .headers()
                .get("Sec-WebSocket-Protocol")
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            if value.as_deref() == Some("relay_protocol") {
                resp.headers_mut()
                    .insert("Sec-WebSocket-Protocol", HeaderValue::from_static("relay_protocol"));
            }
            *offered.lock().unwrap() = value;
            Ok(resp)
        };
        let ws = tokio_tungstenite::accept_hdr_async(tcp, callback).await.unwrap();
        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                out = to_client.recv() => match out {
                    Some(msg) => {
                        if write.send(msg).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let _ = seen_tx.send(Seen::Text(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                        let _ = seen_tx.send(Seen::Closed);
                        break;
                    }
                    Some(Ok(_)) => {}
                },
            }
        }
    });

    FakeHub {
        url: Url::parse(&format!("ws://127.0.0.1:{port}/async")).unwrap(),
        protocol,
        outgoing,
        seen,
    }
}

struct Forward(mpsc::UnboundedSender<UnitRecord>);

impl UnitStatusListener for Forward {
    fn on_unit_status(&self, unit: &UnitRecord) {
        let _ = self.0.send(unit.clone());
    }
}

async fn wait_for_state(stream: &EventStream, wanted: StreamState) {
    let mut state = stream.state();
    tokio::time::timeout(WAIT, state.wait_for(|s| *s == wanted))
        .await
        .unwrap_or_else(|_| panic!("stream never reached {wanted:?}"))
        .unwrap();
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unit_changed_frame_reaches_listener() {
    let mut hub = start_hub().await;
    let stream = EventStream::new(StreamConfig::new(hub.url.clone()));
    let (tx, mut units) = mpsc::unbounded_channel();
    stream.register_listener(Arc::new(Forward(tx)));

    stream.connect().await;
    wait_for_state(&stream, StreamState::Connected).await;
    assert_eq!(hub.protocol.lock().unwrap().as_deref(), Some("relay_protocol"));

    hub.send("garbage");
    hub.send(
        json!({
            "type": "UNIT_CHANGED",
            "unit": { "id": 7, "name": "Switch A", "type": "Switch", "currStatus": 255 }
        })
        .to_string(),
    );

    let unit = tokio::time::timeout(WAIT, units.recv()).await.unwrap().unwrap();
    assert_eq!(unit.id, "7");
    assert_eq!(unit.level(), Some(255));
    assert_eq!(stream.current_state(), StreamState::Connected);

    stream.dispose().await;
    assert_eq!(stream.current_state(), StreamState::Disconnected);
    assert_eq!(hub.next_seen().await, Seen::Closed);
}

#[tokio::test]
async fn test_keepalive_frame_is_sent_while_connected() {
    let mut hub = start_hub().await;
    let mut config = StreamConfig::new(hub.url.clone());
    config.keepalive_interval = Duration::from_millis(50);
    let stream = EventStream::new(config);

    stream.connect().await;
    let text = match hub.next_seen().await {
        Seen::Text(text) => text,
        other => panic!("expected keep-alive text, got {other:?}"),
    };
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value, json!({ "myopenhab": "echo" }));

    stream.dispose().await;
}

#[tokio::test]
async fn test_hub_close_ends_stream_without_reconnect() {
    let hub = start_hub().await;
    let stream = EventStream::new(StreamConfig::new(hub.url.clone()));

    stream.connect().await;
    wait_for_state(&stream, StreamState::Connected).await;

    hub.outgoing.send(Message::Close(None)).unwrap();
    wait_for_state(&stream, StreamState::Disconnected).await;

    // Reconnect is off: the state stays put.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(stream.current_state(), StreamState::Disconnected);
    stream.dispose().await;
}

#[tokio::test]
async fn test_refused_connection_settles_disconnected() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let url = Url::parse(&format!("ws://127.0.0.1:{port}/async")).unwrap();
    let stream = EventStream::new(StreamConfig::new(url));

    stream.connect().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(stream.current_state(), StreamState::Disconnected);
    stream.dispose().await;
}
