// SPDX-FileCopyrightText: 2026 Deskline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process WebSocket server for realtime channel tests.
//!
//! Every accepted socket becomes a [`ServerConnection`] delivered through
//! [`MockSocketServer::accept`]. Tests push frames with
//! [`ServerConnection::send_json`], read client frames with
//! [`ServerConnection::recv_json`], and drop the link with
//! [`ServerConnection::close`].

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tracing::debug;

const WAIT: Duration = Duration::from_secs(5);

enum ServerFrame {
    Text(String),
    Close,
}

/// One accepted client socket.
pub struct ServerConnection {
    /// Request path and query of the handshake, e.g. `/ws/chat/?token=abc`.
    pub path: String,
    outbound: mpsc::UnboundedSender<ServerFrame>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl ServerConnection {
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.outbound.send(ServerFrame::Text(text.into()));
    }

    pub fn send_json(&self, value: &Value) {
        self.send_text(value.to_string());
    }

    /// Close the socket from the server side.
    pub fn close(&self) {
        let _ = self.outbound.send(ServerFrame::Close);
    }

    /// Next text frame from the client, or `None` after the wait elapses.
    pub async fn recv_text(&mut self) -> Option<String> {
        tokio::time::timeout(WAIT, self.inbound.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next client frame parsed as JSON.
    pub async fn recv_json(&mut self) -> Option<Value> {
        let text = self.recv_text().await?;
        serde_json::from_str(&text).ok()
    }

    /// Non-blocking check for an already-received client frame.
    pub fn try_recv_text(&mut self) -> Option<String> {
        self.inbound.try_recv().ok()
    }
}

/// A WebSocket server bound to an ephemeral localhost port.
pub struct MockSocketServer {
    addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<ServerConnection>,
    task: JoinHandle<()>,
}

impl MockSocketServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, connections) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut path = String::new();
                    let record_path =
                        |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                            path = req.uri().to_string();
                            Ok(resp)
                        };
                    let handshake = tokio_tungstenite::accept_hdr_async(stream, record_path).await;
                    let Ok(socket) = handshake else {
                        return;
                    };
                    debug!(%path, "mock socket accepted");

                    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
                    let (in_tx, in_rx) = mpsc::unbounded_channel();
                    if tx
                        .send(ServerConnection {
                            path,
                            outbound: out_tx,
                            inbound: in_rx,
                        })
                        .is_err()
                    {
                        return;
                    }

                    let (mut sink, mut stream) = socket.split();
                    loop {
                        tokio::select! {
                            frame = out_rx.recv() => match frame {
                                Some(ServerFrame::Text(text)) => {
                                    if sink.send(Message::text(text)).await.is_err() {
                                        break;
                                    }
                                }
                                Some(ServerFrame::Close) | None => {
                                    let _ = sink.close().await;
                                    break;
                                }
                            },
                            incoming = stream.next() => match incoming {
                                Some(Ok(Message::Text(text))) => {
                                    let _ = in_tx.send(text.as_str().to_owned());
                                }
                                Some(Ok(_)) => {}
                                Some(Err(_)) | None => break,
                            },
                        }
                    }
                });
            }
        });

        Ok(Self {
            addr,
            connections,
            task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// REST base URL on the same host, from which socket URLs are derived.
    pub fn api_base_url(&self) -> String {
        format!("http://{}/api/cuentas", self.addr)
    }

    /// Next accepted connection, or `None` after the wait elapses.
    pub async fn accept(&mut self) -> Option<ServerConnection> {
        self.accept_within(WAIT).await
    }

    pub async fn accept_within(&mut self, wait: Duration) -> Option<ServerConnection> {
        tokio::time::timeout(wait, self.connections.recv())
            .await
            .ok()
            .flatten()
    }
}

impl Drop for MockSocketServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
