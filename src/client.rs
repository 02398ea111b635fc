// Authenticated HTTP session against an EdgeMAX appliance

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{REFERER, USER_AGENT};
use reqwest::{Method, RequestBuilder, Url};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::transport::TlsSettings;
use crate::version::{NAME, VERSION};

/// Cookie holding the appliance session identifier.
pub const SESSION_COOKIE: &str = "PHPSESSID";

const HEARTBEAT_PATH: &str = "/api/edge/heartbeat.json";

/// Heartbeat acknowledgment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Heartbeat {
    #[serde(default)]
    pub success: bool,
    #[serde(rename = "PING", default)]
    pub ping: bool,
    #[serde(rename = "SESSION", default)]
    pub session: bool,
}

/// What the stats stream needs from an authenticated session.
pub trait Session: Send + Sync + 'static {
    fn base_url(&self) -> &Url;

    /// Value of the named cookie for the base address, if set.
    fn cookie(&self, name: &str) -> Option<String>;

    fn heartbeat(&self) -> impl Future<Output = Result<Heartbeat>> + Send;

    fn tls_settings(&self) -> TlsSettings;
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub insecure_skip_verify: bool,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            insecure_skip_verify: false,
            user_agent: format!("{NAME}/{VERSION}"),
        }
    }
}

/// HTTP client for one appliance. `login` must succeed before anything else is useful.
pub struct Client {
    api_url: Url,
    http: reqwest::Client,
    jar: Arc<Jar>,
    user_agent: String,
    tls: TlsSettings,
}

impl Client {
    pub fn new(addr: &str, options: ClientOptions) -> Result<Self> {
        let api_url = Url::parse(addr.trim_end_matches('/')).map_err(|e| Error::Url(e.to_string()))?;
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .cookie_provider(jar.clone())
            .danger_accept_invalid_certs(options.insecure_skip_verify)
            .build()?;

        Ok(Self {
            api_url,
            http,
            jar,
            user_agent: options.user_agent,
            tls: TlsSettings {
                insecure_skip_verify: options.insecure_skip_verify,
            },
        })
    }

    /// Client that skips certificate verification. Only for self-hosted appliances.
    pub fn insecure(addr: &str, timeout: Duration) -> Result<Self> {
        Self::new(
            addr,
            ClientOptions {
                timeout,
                insecure_skip_verify: true,
                ..Default::default()
            },
        )
    }

    #[instrument(skip(self, password), fields(operation = "login"))]
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        self.http
            .post(self.api_url.clone())
            .header(REFERER, self.api_url.as_str())
            .header(USER_AGENT, &self.user_agent)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        tracing::debug!(has_session = self.cookie(SESSION_COOKIE).is_some(), "logged in");
        Ok(())
    }

    fn request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self
            .api_url
            .join(endpoint)
            .map_err(|e| Error::Url(e.to_string()))?;
        Ok(self
            .http
            .request(method, url)
            .header(REFERER, self.api_url.as_str())
            .header(USER_AGENT, &self.user_agent))
    }
}

impl Session for Client {
    fn base_url(&self) -> &Url {
        &self.api_url
    }

    fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.api_url)?;
        let header = header.to_str().ok()?;
        header.split(';').find_map(|pair| {
            let (k, v) = pair.trim().split_once('=')?;
            (k == name).then(|| v.to_string())
        })
    }

    #[instrument(skip(self), fields(operation = "heartbeat"))]
    async fn heartbeat(&self) -> Result<Heartbeat> {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let hb = self
            .request(Method::GET, &format!("{HEARTBEAT_PATH}?_={nanos}"))?
            .send()
            .await?
            .json::<Heartbeat>()
            .await?;
        Ok(hb)
    }

    fn tls_settings(&self) -> TlsSettings {
        self.tls
    }
}
