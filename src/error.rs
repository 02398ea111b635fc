// Library error type

use std::num::ParseIntError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid integer: {0}")]
    ParseInt(#[from] ParseIntError),

    #[error("invalid hardware address: {0:?}")]
    HardwareAddr(String),

    #[error("invalid CIDR address: {0:?}")]
    Cidr(String),

    #[error("invalid stat type: {0:?}")]
    InvalidStatType(String),

    /// DPI entry key that is not exactly one `Type|Category` pair.
    #[error("invalid DPI stat key: {0:?}")]
    InvalidDpiKey(String),

    #[error("incorrect number of elements in websocket message: {0}")]
    FrameElements(usize),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("tls: {0}")]
    Tls(#[from] rustls::Error),

    #[error("invalid url: {0}")]
    Url(String),

    #[error("websocket closed")]
    Closed,

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
