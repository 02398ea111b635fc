// Socket transport: frame sink/source seams and the tungstenite-backed connector.

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::ORIGIN};
use tokio_tungstenite::{Connector as TlsConnector, MaybeTlsStream, WebSocketStream};

use crate::codec::PayloadType;
use crate::error::{Error, Result};

/// TLS settings carried over from the HTTP session to the socket dial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TlsSettings {
    /// Skip certificate chain and hostname verification (self-signed appliances).
    pub insecure_skip_verify: bool,
}

/// Write half of a stats socket.
pub trait FrameSink: Send + 'static {
    fn send(
        &mut self,
        frame: Bytes,
        payload_type: PayloadType,
    ) -> impl Future<Output = Result<()>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Read half of a stats socket. Each call yields one whole message.
pub trait FrameSource: Send + 'static {
    fn recv(&mut self) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Dials a stats socket and hands back its two halves.
pub trait Connector: Send + Sync {
    type Sink: FrameSink;
    type Source: FrameSource;

    fn connect(
        &self,
        url: &Url,
        origin: &Url,
        tls: TlsSettings,
    ) -> impl Future<Output = Result<(Self::Sink, Self::Source)>> + Send;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector for real appliances (tokio-tungstenite over rustls).
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

pub struct WsSink(SplitSink<WsStream, Message>);

pub struct WsSource(SplitStream<WsStream>);

impl Connector for WsConnector {
    type Sink = WsSink;
    type Source = WsSource;

    async fn connect(&self, url: &Url, origin: &Url, tls: TlsSettings) -> Result<(WsSink, WsSource)> {
        let mut request = url.as_str().into_client_request()?;
        let origin =
            HeaderValue::from_str(origin.as_str()).map_err(|e| Error::Url(e.to_string()))?;
        request.headers_mut().insert(ORIGIN, origin);

        let connector = if url.scheme() == "wss" {
            Some(TlsConnector::Rustls(Arc::new(tls_config(tls)?)))
        } else {
            None
        };

        let (ws, _) =
            tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector)
                .await?;
        tracing::debug!(operation = "connect", url = %url, "stats websocket connected");

        let (sink, source) = ws.split();
        Ok((WsSink(sink), WsSource(source)))
    }
}

impl FrameSink for WsSink {
    async fn send(&mut self, frame: Bytes, payload_type: PayloadType) -> Result<()> {
        let msg = match payload_type {
            PayloadType::Text => Message::text(String::from_utf8_lossy(&frame).into_owned()),
        };
        self.0.send(msg).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match self.0.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl FrameSource for WsSource {
    async fn recv(&mut self) -> Result<Bytes> {
        loop {
            match self.0.next().await {
                Some(Ok(Message::Text(t))) => return Ok(Bytes::copy_from_slice(t.as_str().as_bytes())),
                Some(Ok(Message::Binary(b))) => return Ok(b),
                Some(Ok(Message::Close(_))) | None => return Err(Error::Closed),
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

/// rustls client config for `wss` dials.
pub fn tls_config(tls: TlsSettings) -> Result<ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;

    let config = if tls.insecure_skip_verify {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification(provider)))
            .with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    };
    Ok(config)
}

/// Accepts any server certificate; signatures are still checked.
#[derive(Debug)]
struct NoVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
