//! Broadcast server statistics
//!
//! The admin endpoint returns an XML document with a `<listeners>` element.
//! Anything unexpected counts as zero listeners.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Duration;
use tracing::debug;

/// Listener count from a statistics document; 0 when absent or malformed
pub fn parse_listeners(xml: &str) -> i64 {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_listeners = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                in_listeners = e.name().as_ref() == b"listeners";
            }
            Ok(Event::Text(e)) if in_listeners => {
                return e
                    .decode()
                    .ok()
                    .and_then(|text| text.trim().parse::<i64>().ok())
                    .map(|n| n.max(0))
                    .unwrap_or(0);
            }
            Ok(Event::End(_)) => in_listeners = false,
            Ok(Event::Eof) | Err(_) => return 0,
            _ => {}
        }
    }
}

/// Polls the statistics endpoint
#[derive(Debug, Clone)]
pub struct StatsClient {
    http_client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl StatsClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }

    /// Listener count, or None when the endpoint could not be read
    pub async fn fetch_listeners(&self) -> Option<i64> {
        let response = match self.http_client.get(&self.url).timeout(self.timeout).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(status = %r.status(), "Statistics endpoint returned error");
                return None;
            }
            Err(e) => {
                debug!(error = %e, "Statistics endpoint unreachable");
                return None;
            }
        };

        match response.text().await {
            Ok(body) => Some(parse_listeners(&body)),
            Err(e) => {
                debug!(error = %e, "Statistics body unreadable");
                Some(0)
            }
        }
    }
}
