// 🌐 Page Fetcher - one GET per page, no retries
//
// Some provider sites reject default client identifiers, so every request
// carries a browser-like User-Agent.

use crate::error::FetchError;
use reqwest::header::USER_AGENT;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

/// Source of page bodies
///
/// The driver only sees this trait, so runs can be replayed against saved
/// pages without touching the network.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Blocking HTTP fetcher (client default redirect policy and timeouts)
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        HttpFetcher {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let resp = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .map_err(transport)?;

        let status = resp.status();
        tracing::debug!(url, status = status.as_u16(), "page fetched");

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text().map_err(transport)
    }
}
