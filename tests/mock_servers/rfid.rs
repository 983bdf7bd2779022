//! Mock RFID reader for testing
//!
//! Accepts WebSocket connections and pushes scripted text frames to every
//! connected client.

use futures::SinkExt;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// Mock RFID reader
pub struct MockRfidReader {
    addr: SocketAddr,
    frames: broadcast::Sender<String>,
    connected: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl MockRfidReader {
    /// Start a mock reader on a random port
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (frames, _) = broadcast::channel::<String>(16);
        let (connected, _) = broadcast::channel::<()>(16);

        let frames_tx = frames.clone();
        let connected_tx = connected.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let mut rx = frames_tx.subscribe();
                let connected_tx = connected_tx.clone();
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    let _ = connected_tx.send(());
                    while let Ok(text) = rx.recv().await {
                        if ws.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        Self {
            addr,
            frames,
            connected,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Subscribe before the client connects to be told when it has
    pub fn connections(&self) -> broadcast::Receiver<()> {
        self.connected.subscribe()
    }

    /// Push a text frame to every connected client
    pub fn send(&self, text: &str) {
        let _ = self.frames.send(text.to_string());
    }

    /// Stop the mock reader
    pub async fn stop(self) {
        self.handle.abort();
    }
}
