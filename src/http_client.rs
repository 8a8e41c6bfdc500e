//! Thin wrapper around a shared `reqwest::Client`.
//!
//! Exposes exactly the one operation the rest of the core depends on:
//! a conditional GET that surfaces 304 as data, not an exception, and
//! normalises transport failures into [`SourceError`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::SourceError;

pub const USER_AGENT: &str = "TrendMonitor/1.1 (+https://example.com/trend-monitor)";

/// Capability interface for "one concurrent HTTP GET with timeout,
/// conditional headers, status interpretation". Source adapters depend on
/// this trait, not on `reqwest` directly, so tests can substitute a fake
/// transport instead of hitting the network.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<HttpResponse, SourceError>;
}

/// Outcome of one conditional GET.
#[derive(Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn not_modified(&self) -> bool {
        self.status == 304
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_ascii_lowercase() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Decode the body as text using the charset advertised in `Content-Type`
    /// (default utf-8), replacing undecodable bytes rather than failing.
    pub fn text_lossy(&self) -> String {
        let content_type = self.header("content-type").unwrap_or("");
        let charset = content_type
            .split(';')
            .map(|part| part.trim())
            .find_map(|part| part.strip_prefix("charset="))
            .unwrap_or("utf-8");

        let encoding = encoding_rs::Encoding::for_label(charset.as_bytes())
            .unwrap_or(encoding_rs::UTF_8);
        let (decoded, _, _) = encoding.decode(&self.body);
        decoded.into_owned()
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("reqwest client builds with a static configuration");
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for HttpClient {
    /// GET `url` with `headers` applied, bounded by `timeout`. Status >= 400
    /// and transport failures both surface as `SourceError`; a 304 is
    /// returned as a normal `HttpResponse` so the caller can branch on it.
    async fn get(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<HttpResponse, SourceError> {
        let mut request = self.client.get(url).timeout(timeout);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(SourceError::from)?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(SourceError::http(status.as_u16(), url));
        }

        let mut out_headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                out_headers.insert(name.as_str().to_string(), v.to_string());
            }
        }
        let status_code = status.as_u16();
        let body = if status_code == 304 {
            Vec::new()
        } else {
            response
                .bytes()
                .await
                .map_err(SourceError::from)?
                .to_vec()
        };

        Ok(HttpResponse {
            status: status_code,
            headers: out_headers,
            body,
        })
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    /// Canned-response transport for source-adapter tests; records every
    /// request's headers so conditional-request behaviour can be asserted.
    pub struct FakeTransport {
        responses: Mutex<Vec<HttpResponse>>,
        pub requests: Mutex<Vec<HashMap<String, String>>>,
    }

    impl FakeTransport {
        pub fn new(responses: Vec<HttpResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpTransport for FakeTransport {
        async fn get(
            &self,
            _url: &str,
            headers: &HashMap<String, String>,
            _timeout: Duration,
        ) -> Result<HttpResponse, SourceError> {
            self.requests.lock().unwrap().push(headers.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("unexpected HTTP call in test");
            }
            Ok(responses.remove(0))
        }
    }
}
