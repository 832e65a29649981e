//! Passive network and cookie telemetry captured while a page loads.
//!
//! Listeners are attached before navigation and forward Chrome DevTools
//! Protocol events into an append-only channel. The capture window closes when
//! [`TelemetryCollector::finish`] is called, which yields an immutable
//! [`TelemetrySnapshot`].

use crate::error::{BrowserError, Result};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventRequestWillBeSent, EventResponseReceived, EventResponseReceivedExtraInfo,
    ResourceType,
};
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// An outgoing request observed during the capture window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEvent {
    pub request_id: String,
    pub url: String,
    pub resource_type: String,
    pub captured_at_millis: i64,
}

/// A `Set-Cookie` header observed on a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieCapture {
    pub source_url: String,
    pub raw_set_cookie_header: String,
    pub captured_at_millis: i64,
}

impl CookieCapture {
    /// Names of every cookie set by this header.
    ///
    /// CDP folds repeated `Set-Cookie` headers into one value separated by
    /// newlines.
    pub fn cookie_names(&self) -> Vec<String> {
        self.raw_set_cookie_header
            .lines()
            .filter_map(parse_cookie_name)
            .collect()
    }
}

/// A cookie present in the browser jar when the capture window closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserCookie {
    pub name: String,
    pub domain: String,
    pub captured_at_millis: i64,
}

/// Response to the top-level document request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub url: String,
    pub status: u16,
}

/// Everything captured between listener attachment and settle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    /// Outgoing requests in arrival order
    pub requests: Vec<NetworkEvent>,
    /// `Set-Cookie` headers in arrival order
    pub cookies: Vec<CookieCapture>,
    /// First document response, if the navigation produced one
    pub document: Option<DocumentResponse>,
    /// Capture window start (Unix millis)
    pub window_start_millis: i64,
    /// Capture window end (Unix millis)
    pub window_end_millis: i64,
}

/// Event forwarded from a listener task.
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    Request(NetworkEvent),
    Response {
        request_id: String,
        url: String,
        status: i64,
        is_document: bool,
        set_cookie: Option<String>,
        captured_at_millis: i64,
    },
    ResponseExtraInfo {
        request_id: String,
        set_cookie: String,
        captured_at_millis: i64,
    },
}

/// Accumulates forwarded events and folds them into a snapshot.
#[derive(Debug)]
pub struct TelemetryBuffer {
    window_start_millis: i64,
    requests: Vec<NetworkEvent>,
    cookies: Vec<(String, CookieCapture)>,
    pending_cookies: Vec<(String, String, i64)>,
    response_urls: HashMap<String, String>,
    document: Option<DocumentResponse>,
}

impl TelemetryBuffer {
    pub fn new(window_start_millis: i64) -> Self {
        Self {
            window_start_millis,
            requests: Vec::new(),
            cookies: Vec::new(),
            pending_cookies: Vec::new(),
            response_urls: HashMap::new(),
            document: None,
        }
    }

    pub fn push(&mut self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::Request(request) => self.requests.push(request),
            TelemetryEvent::Response {
                request_id,
                url,
                status,
                is_document,
                set_cookie,
                captured_at_millis,
            } => {
                if is_document && self.document.is_none() {
                    if let Ok(status) = u16::try_from(status) {
                        self.document = Some(DocumentResponse {
                            url: url.clone(),
                            status,
                        });
                    }
                }
                if let Some(raw) = set_cookie {
                    self.cookies.push((
                        request_id.clone(),
                        CookieCapture {
                            source_url: url.clone(),
                            raw_set_cookie_header: raw,
                            captured_at_millis,
                        },
                    ));
                }
                self.response_urls.insert(request_id, url);
            }
            TelemetryEvent::ResponseExtraInfo {
                request_id,
                set_cookie,
                captured_at_millis,
            } => self
                .pending_cookies
                .push((request_id, set_cookie, captured_at_millis)),
        }
    }

    /// Close the window, resolving extra-info cookies to their source URLs.
    pub fn into_snapshot(self, window_end_millis: i64) -> TelemetrySnapshot {
        let request_urls: HashMap<&str, &str> = self
            .requests
            .iter()
            .map(|r| (r.request_id.as_str(), r.url.as_str()))
            .collect();

        let mut seen: HashSet<(String, String)> = self
            .cookies
            .iter()
            .map(|(id, c)| (id.clone(), c.raw_set_cookie_header.clone()))
            .collect();

        let mut cookies = self.cookies;
        for (request_id, raw, captured_at_millis) in self.pending_cookies {
            if !seen.insert((request_id.clone(), raw.clone())) {
                continue;
            }
            let source_url = self
                .response_urls
                .get(&request_id)
                .map(String::as_str)
                .or_else(|| request_urls.get(request_id.as_str()).copied())
                .unwrap_or_default()
                .to_string();
            cookies.push((
                request_id,
                CookieCapture {
                    source_url,
                    raw_set_cookie_header: raw,
                    captured_at_millis,
                },
            ));
        }
        cookies.sort_by_key(|(_, c)| c.captured_at_millis);

        TelemetrySnapshot {
            requests: self.requests,
            cookies: cookies.into_iter().map(|(_, c)| c).collect(),
            document: self.document,
            window_start_millis: self.window_start_millis,
            window_end_millis,
        }
    }
}

/// Listener set attached to one page for the duration of one audit.
pub struct TelemetryCollector {
    rx: mpsc::UnboundedReceiver<TelemetryEvent>,
    tasks: Vec<JoinHandle<()>>,
    window_start_millis: i64,
}

impl TelemetryCollector {
    /// Subscribe to request and response events on `page`.
    ///
    /// Must be called before navigation so the first document request is seen.
    pub async fn attach(page: &Page) -> Result<Self> {
        if let Err(e) = page.execute(EnableParams::default()).await {
            warn!("Failed to enable network domain: {}", e);
        }

        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        let mut extra_info = page
            .event_listener::<EventResponseReceivedExtraInfo>()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut tasks = Vec::with_capacity(3);

        let request_tx = tx.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                let record = NetworkEvent {
                    request_id: event.request_id.inner().clone(),
                    url: event.request.url.clone(),
                    resource_type: event
                        .r#type
                        .as_ref()
                        .map_or_else(|| "Other".to_string(), resource_type_label),
                    captured_at_millis: now_millis(),
                };
                if request_tx.send(TelemetryEvent::Request(record)).is_err() {
                    break;
                }
            }
        }));

        let response_tx = tx.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                let set_cookie = match serde_json::to_value(&event.response.headers) {
                    Ok(headers) => set_cookie_header(&headers),
                    Err(e) => {
                        trace!("Skipping unreadable response headers: {}", e);
                        None
                    }
                };
                let record = TelemetryEvent::Response {
                    request_id: event.request_id.inner().clone(),
                    url: event.response.url.clone(),
                    status: event.response.status,
                    is_document: event.r#type == ResourceType::Document,
                    set_cookie,
                    captured_at_millis: now_millis(),
                };
                if response_tx.send(record).is_err() {
                    break;
                }
            }
        }));

        tasks.push(tokio::spawn(async move {
            while let Some(event) = extra_info.next().await {
                let Ok(headers) = serde_json::to_value(&event.headers) else {
                    continue;
                };
                if let Some(set_cookie) = set_cookie_header(&headers) {
                    let record = TelemetryEvent::ResponseExtraInfo {
                        request_id: event.request_id.inner().clone(),
                        set_cookie,
                        captured_at_millis: now_millis(),
                    };
                    if tx.send(record).is_err() {
                        break;
                    }
                }
            }
        }));

        Ok(Self {
            rx,
            tasks,
            window_start_millis: now_millis(),
        })
    }

    /// Close the capture window and take the snapshot.
    pub fn finish(mut self) -> TelemetrySnapshot {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.rx.close();

        let mut buffer = TelemetryBuffer::new(self.window_start_millis);
        while let Ok(event) = self.rx.try_recv() {
            buffer.push(event);
        }

        let snapshot = buffer.into_snapshot(now_millis());
        debug!(
            requests = snapshot.requests.len(),
            cookies = snapshot.cookies.len(),
            "closed telemetry window"
        );
        snapshot
    }
}

impl Drop for TelemetryCollector {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn resource_type_label(resource_type: &ResourceType) -> String {
    format!("{resource_type:?}")
}

/// Extract the `Set-Cookie` value from a CDP header object (any key case).
pub fn set_cookie_header(headers: &serde_json::Value) -> Option<String> {
    let values: Vec<&str> = headers
        .as_object()?
        .iter()
        .filter(|(key, _)| key.eq_ignore_ascii_case("set-cookie"))
        .filter_map(|(_, value)| value.as_str())
        .filter(|value| !value.trim().is_empty())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join("\n"))
    }
}

/// Cookie name from a single `Set-Cookie` line (`name=value; attrs`).
pub fn parse_cookie_name(line: &str) -> Option<String> {
    let pair = line.split(';').next()?;
    let (name, _) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
