use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::config::MonitorSettings;

/// Page fetch and field extraction boundary.
///
/// Returns the extracted element text, or `None` on network error,
/// non-success HTTP status, or no element match. Implementations must not
/// let lower-level errors escape; absence is the only failure signal.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, selector: &str) -> Option<String>;
}

/// HTTP fetcher over reqwest with CSS-selector extraction.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(settings: &MonitorSettings) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, selector: &str) -> Option<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url, error = %e, "request failed");
                return None;
            }
        };

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url, error = %e, "non-success response status");
                return None;
            }
        };

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(url, error = %e, "failed to read response body");
                return None;
            }
        };

        extract_text(&body, selector, url)
    }
}

/// Extract the first selector match from an HTML document, with whitespace
/// collapsed the way a browser renders it.
fn extract_text(html: &str, selector: &str, url: &str) -> Option<String> {
    let parsed = match Selector::parse(selector) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(url, selector, error = ?e, "invalid selector");
            return None;
        }
    };

    let document = Html::parse_document(html);
    let Some(element) = document.select(&parsed).next() else {
        tracing::debug!(url, selector, "selector matched no element");
        return None;
    };

    let text = element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    Some(text)
}
