// Shared test helpers: an in-memory stats socket and a scripted session.

#![allow(dead_code)]

use bytes::Bytes;
use edgemax_stats::client::{Heartbeat, SESSION_COOKIE, Session};
use edgemax_stats::codec::PayloadType;
use edgemax_stats::transport::{Connector, FrameSink, FrameSource, TlsSettings};
use edgemax_stats::{Error, Result};
use reqwest::Url;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_tungstenite::tungstenite;
use tokio::sync::{mpsc, watch};

pub struct FakeSession {
    base: Url,
    session_id: Option<String>,
    fail_heartbeat: bool,
    tls: TlsSettings,
    heartbeats: AtomicUsize,
}

impl FakeSession {
    pub fn new(session_id: &str) -> Self {
        Self {
            base: Url::parse("https://192.168.1.1").unwrap(),
            session_id: Some(session_id.to_string()),
            fail_heartbeat: false,
            tls: TlsSettings {
                insecure_skip_verify: true,
            },
            heartbeats: AtomicUsize::new(0),
        }
    }

    pub fn failing(session_id: &str) -> Self {
        Self {
            fail_heartbeat: true,
            ..Self::new(session_id)
        }
    }

    pub fn heartbeats(&self) -> usize {
        self.heartbeats.load(Ordering::SeqCst)
    }
}

impl Session for FakeSession {
    fn base_url(&self) -> &Url {
        &self.base
    }

    fn cookie(&self, name: &str) -> Option<String> {
        if name == SESSION_COOKIE {
            self.session_id.clone()
        } else {
            None
        }
    }

    async fn heartbeat(&self) -> Result<Heartbeat> {
        self.heartbeats.fetch_add(1, Ordering::SeqCst);
        if self.fail_heartbeat {
            return Err(Error::Url("heartbeat refused".into()));
        }
        Ok(Heartbeat {
            success: true,
            ping: true,
            session: true,
        })
    }

    fn tls_settings(&self) -> TlsSettings {
        self.tls
    }
}

/// The appliance's end of an in-memory socket.
pub struct Peer {
    /// Frames written by the client, in order.
    pub sent: mpsc::UnboundedReceiver<Bytes>,
    /// Frames (or read failures) to deliver to the client.
    pub incoming: mpsc::UnboundedSender<Result<Bytes>>,
    closed: watch::Receiver<bool>,
    hung_up: Arc<AtomicBool>,
}

impl Peer {
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    pub fn push(&self, frame: &str) {
        self.incoming
            .send(Ok(Bytes::copy_from_slice(frame.as_bytes())))
            .unwrap();
    }

    /// Queues one failed read, like a reset mid-stream.
    pub fn push_error(&self) {
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        self.incoming
            .send(Err(Error::WebSocket(tungstenite::Error::Io(reset))))
            .unwrap();
    }

    /// Drops the connection from the appliance side. Every later read fails
    /// straight away without suspending, as an ended websocket stream does.
    pub fn hang_up(&self) {
        self.hung_up.store(true, Ordering::SeqCst);
    }
}

pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Bytes>,
    closed: watch::Sender<bool>,
}

pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Result<Bytes>>,
    closed: watch::Receiver<bool>,
    hung_up: Arc<AtomicBool>,
}

impl FrameSink for ChannelSink {
    async fn send(&mut self, frame: Bytes, payload_type: PayloadType) -> Result<()> {
        assert_eq!(payload_type, PayloadType::Text);
        let closed = *self.closed.borrow();
        if closed {
            return Err(Error::Closed);
        }
        self.tx.send(frame).map_err(|_| Error::Closed)
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.closed.send(true);
        Ok(())
    }
}

impl FrameSource for ChannelSource {
    async fn recv(&mut self) -> Result<Bytes> {
        let closed = *self.closed.borrow();
        if closed || self.hung_up.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        tokio::select! {
            r = self.rx.recv() => r.unwrap_or(Err(Error::Closed)),
            _ = self.closed.changed() => Err(Error::Closed),
        }
    }
}

/// Hands out one in-memory socket, recording every dial.
pub struct ChannelConnector {
    halves: Mutex<Option<(ChannelSink, ChannelSource)>>,
    refuse: bool,
    pub dialed: Mutex<Vec<(Url, Url, TlsSettings)>>,
}

impl ChannelConnector {
    pub fn refusing() -> Self {
        Self {
            halves: Mutex::new(None),
            refuse: true,
            dialed: Mutex::new(Vec::new()),
        }
    }
}

pub fn channel_socket() -> (ChannelConnector, Peer) {
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
    let (closed_tx, closed_rx) = watch::channel(false);
    let hung_up = Arc::new(AtomicBool::new(false));

    let sink = ChannelSink {
        tx: sent_tx,
        closed: closed_tx,
    };
    let source = ChannelSource {
        rx: incoming_rx,
        closed: closed_rx.clone(),
        hung_up: hung_up.clone(),
    };
    let connector = ChannelConnector {
        halves: Mutex::new(Some((sink, source))),
        refuse: false,
        dialed: Mutex::new(Vec::new()),
    };
    let peer = Peer {
        sent: sent_rx,
        incoming: incoming_tx,
        closed: closed_rx,
        hung_up,
    };
    (connector, peer)
}

impl Connector for ChannelConnector {
    type Sink = ChannelSink;
    type Source = ChannelSource;

    async fn connect(
        &self,
        url: &Url,
        origin: &Url,
        tls: TlsSettings,
    ) -> Result<(ChannelSink, ChannelSource)> {
        self.dialed
            .lock()
            .unwrap()
            .push((url.clone(), origin.clone(), tls));
        if self.refuse {
            return Err(Error::Closed);
        }
        self.halves.lock().unwrap().take().ok_or(Error::Closed)
    }
}

pub const SYSTEM_STATS_JSON: &str = r#"{"cpu":"10","uptime":"20","mem":"30"}"#;

/// Wraps `body` in a length-prefixed frame.
pub fn framed(body: &str) -> String {
    format!("{}\n{}", body.len(), body)
}
