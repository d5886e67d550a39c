use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::error::{BoxError, Error};
use crate::util::{DEFAULT_TIMEOUT, http_client};

/// Query-string parameters, passed through to the transport by reference.
pub type Query = BTreeMap<String, String>;

/// One outgoing GET, as handed to a [`Transport`].
#[derive(Debug)]
pub struct HttpRequest<'a> {
    pub url: &'a str,
    pub headers: HeaderMap,
    /// The caller's own query map; never copied on the way down.
    pub query: Option<&'a Query>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, content_type: &'static str, body: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// Sends a request and returns the response, if any.
///
/// `Ok(None)` means the exchange finished without a response object; the
/// request pipeline reports it as [`Error::NoResponse`].
pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest<'_>) -> Result<Option<HttpResponse>, BoxError>;
}

/// Production transport on top of a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, Error> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, Error> {
        Ok(Self {
            http: http_client(timeout)?,
        })
    }

    /// Wraps an already configured client (proxies, custom TLS, ...).
    pub fn from_client(http: reqwest::blocking::Client) -> Self {
        Self { http }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &HttpRequest<'_>) -> Result<Option<HttpResponse>, BoxError> {
        let mut req = self.http.get(request.url).headers(request.headers.clone());
        if let Some(query) = request.query {
            req = req.query(query);
        }

        let resp = req.send()?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.text()?;

        Ok(Some(HttpResponse {
            status,
            headers,
            body,
        }))
    }
}
