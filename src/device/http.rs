//! Blocking `reqwest` implementation of [`HttpTransport`].

use std::time::Duration;

use reqwest::Method;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

use super::HttpTransport;
use crate::error::{KeypadError, Result};

/// Request state between `begin` and `end`.
#[derive(Debug, Default)]
struct Pending {
    url: Option<Url>,
    timeout: Option<Duration>,
    headers: HeaderMap,
}

/// HTTP session backed by a shared blocking client.
#[derive(Debug)]
pub struct ReqwestTransport {
    client: Client,
    pending: Pending,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("keypad/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KeypadError::Http(e.to_string()))?;
        Ok(Self {
            client,
            pending: Pending::default(),
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn begin(&mut self, url: &str) -> bool {
        self.pending = Pending::default();
        match Url::parse(url) {
            Ok(parsed) => {
                self.pending.url = Some(parsed);
                true
            }
            Err(e) => {
                warn!(url, error = %e, "Rejected request URL");
                false
            }
        }
    }

    fn set_timeout(&mut self, timeout_ms: u32) {
        self.pending.timeout =
            (timeout_ms > 0).then(|| Duration::from_millis(u64::from(timeout_ms)));
    }

    fn add_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.pending.headers.insert(name, value);
            }
            _ => warn!(header = name, "Skipping invalid header"),
        }
    }

    fn send_request(&mut self, method: &str, body: Option<&str>) -> i32 {
        let Some(url) = self.pending.url.clone() else {
            warn!("send_request called without begin");
            return -1;
        };
        let Ok(method) = Method::from_bytes(method.as_bytes()) else {
            warn!(method, "Invalid HTTP method");
            return -1;
        };

        let mut request = self
            .client
            .request(method, url)
            .headers(self.pending.headers.clone());
        if let Some(timeout) = self.pending.timeout {
            request = request.timeout(timeout);
        }
        if let Some(body) = body {
            request = request.body(body.to_string());
        }

        match request.send() {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(status, "HTTP response");
                i32::from(status)
            }
            Err(e) => {
                warn!(error = %e, "HTTP request failed");
                -1
            }
        }
    }

    fn end(&mut self) {
        self.pending = Pending::default();
    }
}
