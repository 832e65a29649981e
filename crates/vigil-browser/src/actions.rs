use crate::error::Result;
use crate::telemetry::{BrowserCookie, TelemetrySnapshot};
use serde::{Deserialize, Serialize};
use url::Url;

/// Result of loading one page and letting it settle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedPage {
    /// Rendered DOM serialized as HTML
    pub html: String,
    /// Cookie jar at settle time
    pub cookie_jar: Vec<BrowserCookie>,
    /// Requests and `Set-Cookie` headers observed before settle
    pub telemetry: TelemetrySnapshot,
    /// Time from navigation start to the load event
    pub load_time_ms: u64,
}

/// Something that can load a page and capture its telemetry.
///
/// Implemented by [`crate::BrowserEngine`]; audits depend on this trait so they
/// can run against scripted pages in tests.
#[async_trait::async_trait]
pub trait PageLoader: Send + Sync {
    /// Navigate to `url`, wait for load plus the settle delay, and capture.
    async fn load(&self, url: &Url) -> Result<LoadedPage>;

    /// Release any browser resources. Safe to call more than once.
    async fn shutdown(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loaded_page_serializes_camel_case() {
        let page = LoadedPage {
            load_time_ms: 420,
            ..LoadedPage::default()
        };
        let json = serde_json::to_value(&page).expect("serialize");
        assert_eq!(json["html"], "");
        assert_eq!(json["loadTimeMs"], 420);
        assert!(json["cookieJar"].as_array().is_some());
    }
}
