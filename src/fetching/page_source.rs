use crate::fetching::error::FetchError;
use futures_util::TryStreamExt;
use log::{info, warn};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;

pub const USER_AGENT: &str = concat!("xema-rs/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const APP_TOKEN_HEADER: &str = "X-App-Token";

/// Transport used by the paginated fetcher: returns the raw body for one page URL.
///
/// Implementations report transport failures (connection errors, non-2xx statuses)
/// as [`FetchError`]; the fetcher decides how to recover from them.
pub trait PageSource {
    fn get_page(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

/// [`PageSource`] backed by `reqwest`.
///
/// Gzip and deflate encoded responses are decompressed transparently. Every request
/// carries an identifying user agent, and the `X-App-Token` header when a token is set.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: Client,
    app_token: Option<String>,
}

impl HttpPageSource {
    pub fn new(app_token: Option<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(FetchError::ClientBuild)?;
        Ok(Self {
            client,
            app_token: app_token.filter(|token| !token.is_empty()),
        })
    }

    pub fn has_app_token(&self) -> bool {
        self.app_token.is_some()
    }
}

impl PageSource for HttpPageSource {
    async fn get_page(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.app_token {
            request = request.header(APP_TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::NetworkRequest(url.to_string(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(match e.status() {
                    Some(status) => FetchError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    },
                    None => FetchError::NetworkRequest(url.to_string(), e),
                });
            }
        };

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let mut reader = StreamReader::new(stream);
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .await
            .map_err(|e| FetchError::DownloadIo {
                url: url.to_string(),
                source: e,
            })?;
        info!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
