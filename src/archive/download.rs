use crate::uri_tools::{resolve_location, same_origin};

use base64::Engine;
use hyper::body::{Body, Bytes};
use hyper::client::connect::Connect;
use hyper::client::Client;
use hyper::header::{HeaderValue, AUTHORIZATION, LOCATION};
use hyper::http::uri::Uri;
use hyper::StatusCode;
use hyper_tls::HttpsConnector;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
    #[error(transparent)]
    Http(#[from] hyper::http::Error),
    #[error("non-200 return code {}", .0.as_u16())]
    NonSuccess(StatusCode),
    #[error("Download did not finish in {0:?}")]
    Timeout(Duration),
    #[error("Cannot start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl From<StatusCode> for DownloadError {
    fn from(status_code: StatusCode) -> Self {
        DownloadError::NonSuccess(status_code)
    }
}

/// Account ID and license key for HTTP basic auth
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    user: String,
    key: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            key: key.into(),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    fn authorization(&self) -> Result<HeaderValue, hyper::http::Error> {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.user, self.key));
        let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("key", &"***")
            .finish()
    }
}

/// GET the archive, following redirects.
///
/// Credentials are sent to the origin of `permalink` only, the vendor redirects to a pre-signed
/// storage URL which must not see them.
pub async fn download_archive<C>(
    client: &Client<C>,
    permalink: &Uri,
    credentials: &Credentials,
) -> Result<Bytes, DownloadError>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    const MAX_ATTEMPTS: usize = 8;
    let mut uri = permalink.clone();
    let mut attempt = 0;
    let response = loop {
        let mut request_builder = hyper::Request::builder().uri(&uri);
        if same_origin(&uri, permalink) {
            request_builder = request_builder.header(AUTHORIZATION, credentials.authorization()?);
        }
        let request = request_builder.body(Body::empty())?;
        let response = client.request(request).await?;

        if response.status().is_success() {
            break response;
        } else if response.status().is_redirection() {
            uri = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|location| resolve_location(&uri, location))
                .ok_or_else(|| response.status())?;
            log::debug!(
                "{} redirect to {}",
                response.status(),
                uri.host().unwrap_or("-")
            );
        } else {
            return Err(response.status().into());
        }

        attempt += 1;
        if attempt == MAX_ATTEMPTS {
            return Err(response.status().into());
        }
    };
    let body = response.into_body();
    Ok(hyper::body::to_bytes(body).await?)
}

/// Blocking download on a single-threaded runtime, bounded by `timeout`
pub fn fetch_archive(
    permalink: &Uri,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<Bytes, DownloadError> {
    let https = HttpsConnector::new();
    let client = Client::builder().build::<_, Body>(https);
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(DownloadError::Runtime)?;
    rt.block_on(async {
        tokio::time::timeout(timeout, download_archive(&client, permalink, credentials))
            .await
            .map_err(|_| DownloadError::Timeout(timeout))?
    })
}
