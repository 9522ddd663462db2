use crate::config::{ProxyMode, Settings};
use crate::error::{OverlayError, OverlayResult};
use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Host capability performing a GET outside of any cross-origin restriction.
///
/// Returns the response body, or a message describing why there is none.
pub trait ProxyBridge: Send + Sync {
    fn fetch_with_proxy<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, String>>;
}

/// Bridge performing the request itself with a desktop browser user-agent.
pub struct HttpBridge {
    http_client: Client,
}

impl HttpBridge {
    pub fn new(timeout: Duration) -> OverlayResult<Self> {
        let http_client = Client::builder()
            .user_agent(DESKTOP_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(HttpBridge { http_client })
    }
}

impl ProxyBridge for HttpBridge {
    fn fetch_with_proxy<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, String>> {
        Box::pin(async move {
            debug!("Bridge: GET {url}");
            let response = self
                .http_client
                .get(url)
                .send()
                .await
                .map_err(|e| format!("HTTP request failed: {e}"))?;

            let status = response.status();
            if !status.is_success() {
                return Err(format!("HTTP {}", status));
            }

            let text = response
                .text()
                .await
                .map_err(|e| format!("Failed to read response text: {e}"))?;
            debug!("Bridge: fetched {} characters from {url}", text.len());
            Ok(text)
        })
    }
}

/// Uniform response whichever route served the request.
#[derive(Debug)]
pub struct ProxyResponse {
    pub ok: bool,
    pub status: u16,
    pub status_text: String,
    body: Result<String, String>,
}

impl ProxyResponse {
    fn success(body: String) -> Self {
        ProxyResponse {
            ok: true,
            status: StatusCode::OK.as_u16(),
            status_text: "OK".to_string(),
            body: Ok(body),
        }
    }

    fn failure(message: String) -> Self {
        ProxyResponse {
            ok: false,
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            status_text: message.clone(),
            body: Err(message),
        }
    }

    async fn from_reqwest(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.map_err(|e| e.to_string());
        ProxyResponse {
            ok: status.is_success(),
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        }
    }

    /// Body of the response. Fails for synthesized failures.
    pub fn text(self) -> OverlayResult<String> {
        self.body.map_err(OverlayError::Http)
    }

    /// Body of a successful response, an HTTP error otherwise.
    pub fn into_ok_text(self) -> OverlayResult<String> {
        match self.ok {
            true => self.text(),
            false => Err(OverlayError::Http(format!(
                "{}: {}",
                self.status, self.status_text
            ))),
        }
    }
}

enum Route {
    Bridge(Arc<dyn ProxyBridge>),
    Relay {
        http_client: Client,
        relay_prefix: String,
    },
}

/// GET requests through the bridge when there is one, through the public relay
/// then directly otherwise.
#[derive(Clone)]
pub struct ProxyFetch {
    route: Arc<Route>,
}

impl ProxyFetch {
    pub fn from_settings(settings: &Settings) -> OverlayResult<Self> {
        match settings.proxy_mode {
            ProxyMode::Bridge => Ok(Self::with_bridge(Arc::new(HttpBridge::new(
                settings.request_timeout(),
            )?))),
            ProxyMode::Relay => {
                let http_client = Client::builder()
                    .timeout(settings.request_timeout())
                    .build()?;
                Ok(Self::with_relay(
                    http_client,
                    settings.cors_relay_prefix.clone(),
                ))
            }
        }
    }

    pub fn with_bridge(bridge: Arc<dyn ProxyBridge>) -> Self {
        ProxyFetch {
            route: Arc::new(Route::Bridge(bridge)),
        }
    }

    pub fn with_relay(http_client: Client, relay_prefix: String) -> Self {
        ProxyFetch {
            route: Arc::new(Route::Relay {
                http_client,
                relay_prefix,
            }),
        }
    }

    pub async fn fetch(&self, url: &str) -> ProxyResponse {
        match self.route.as_ref() {
            Route::Bridge(bridge) => match bridge.fetch_with_proxy(url).await {
                Ok(body) => ProxyResponse::success(body),
                Err(message) => {
                    error!("Proxy bridge failed for {url}: {message}");
                    ProxyResponse::failure(message)
                }
            },
            Route::Relay {
                http_client,
                relay_prefix,
            } => {
                info!("No bridge available, going through the public relay");
                let relayed = format!("{relay_prefix}{url}");
                match Self::get(http_client, &relayed).await {
                    Ok(response) => return ProxyResponse::from_reqwest(response).await,
                    Err(e) => debug!("Relay failed for {url}: {e}, trying direct request"),
                }
                match Self::get(http_client, url).await {
                    Ok(response) => ProxyResponse::from_reqwest(response).await,
                    Err(e) => {
                        error!("Direct request failed for {url}: {e}");
                        ProxyResponse::failure(e.to_string())
                    }
                }
            }
        }
    }

    async fn get(http_client: &Client, url: &str) -> Result<reqwest::Response, reqwest::Error> {
        http_client
            .get(url)
            .header(reqwest::header::ACCEPT, HTML_ACCEPT)
            .header(reqwest::header::USER_AGENT, DESKTOP_USER_AGENT)
            .send()
            .await
    }
}
