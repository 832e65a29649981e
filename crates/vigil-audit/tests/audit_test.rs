use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use vigil_audit::{AuditReport, Auditor, ViolationType};
use vigil_browser::{
    BrowserCookie, BrowserError, CookieCapture, DocumentResponse, LoadedPage, NetworkEvent,
    PageLoader, TelemetrySnapshot,
};
use vigil_core::{AuditConfig, Dimension, Priority, ScoringConfig};
use vigil_rules::RuleLoader;

const COMPLIANT_BODY: &str = r#"
    <div id="cookie-banner"><p>We use cookies to improve your experience.</p></div>
    <footer>
        <a href="/cookie-policy">Cookie Policy</a>
        <a href="/privacy-policy">Privacy Policy</a>
        <a href="mailto:privacy@example.com">privacy@example.com</a>
    </footer>
"#;

/// Page loader that replays scripted outcomes in order.
struct ScriptedLoader {
    outcomes: Mutex<VecDeque<Result<LoadedPage, BrowserError>>>,
    calls: AtomicUsize,
    shutdowns: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl ScriptedLoader {
    fn new(outcomes: Vec<Result<LoadedPage, BrowserError>>) -> Arc<Self> {
        Self::with_delay(outcomes, Duration::ZERO)
    }

    fn with_delay(outcomes: Vec<Result<LoadedPage, BrowserError>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageLoader for ScriptedLoader {
    async fn load(&self, _url: &Url) -> vigil_browser::Result<LoadedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BrowserError::NavigationError("script exhausted".to_string())));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

fn loaded(body: &str) -> LoadedPage {
    LoadedPage {
        html: format!("<html><head></head><body>{body}</body></html>"),
        cookie_jar: Vec::new(),
        telemetry: TelemetrySnapshot {
            requests: vec![request("1", "http://example.com/", 1_010)],
            cookies: Vec::new(),
            document: Some(DocumentResponse {
                url: "http://example.com/".to_string(),
                status: 200,
            }),
            window_start_millis: 1_000,
            window_end_millis: 5_000,
        },
        load_time_ms: 850,
    }
}

fn with_status(status: u16) -> LoadedPage {
    let mut page = loaded("");
    if let Some(document) = page.telemetry.document.as_mut() {
        document.status = status;
    }
    page
}

fn request(id: &str, url: &str, at: i64) -> NetworkEvent {
    NetworkEvent {
        request_id: id.to_string(),
        url: url.to_string(),
        resource_type: "Document".to_string(),
        captured_at_millis: at,
    }
}

fn navigation_error() -> Result<LoadedPage, BrowserError> {
    Err(BrowserError::NavigationError(
        "net::ERR_CONNECTION_RESET".to_string(),
    ))
}

fn audit_config() -> AuditConfig {
    AuditConfig {
        retry_base_delay_ms: 1,
        check_ssl: false,
        ..AuditConfig::default()
    }
}

fn auditor(loader: Arc<ScriptedLoader>, config: AuditConfig) -> Auditor {
    Auditor::new(
        loader,
        RuleLoader::builtin().expect("built-in rules"),
        config,
        ScoringConfig::default(),
    )
}

fn assert_six_dimensions(report: &AuditReport) {
    assert_eq!(report.checks.len(), 6);
    for dimension in Dimension::ALL {
        assert!(report.checks.contains_key(&dimension), "missing {dimension}");
    }
}

#[tokio::test]
async fn test_reference_page_scores_75() {
    // Banner, cookie policy and contact present; no privacy policy; no cookies.
    let body = r#"
        <div class="cookie-banner">This site uses cookies. Accept or reject them.</div>
        <a href="/cookies">Cookies</a>
        <a href="tel:+49301234567">Call us</a>
    "#;
    let loader = ScriptedLoader::new(vec![Ok(loaded(body))]);
    let report = auditor(loader, audit_config()).audit("http://example.com").await;

    assert!(report.is_success());
    assert_six_dimensions(&report);
    assert_eq!(report.check(Dimension::PrivacyPolicy).map(|c| c.score), Some(0));
    assert_eq!(report.check(Dimension::CookiePolicy).map(|c| c.score), Some(80));
    assert_eq!(report.check(Dimension::ContactInfo).map(|c| c.score), Some(80));
    assert_eq!(report.score, 75);

    assert_eq!(report.recommendations.len(), 1);
    assert_eq!(report.recommendations[0].priority, Priority::High);
    assert_eq!(
        report.recommendations[0].dimension,
        Some(Dimension::PrivacyPolicy)
    );
}

#[tokio::test]
async fn test_pre_consent_tracking_detected() {
    let mut page = loaded(COMPLIANT_BODY);
    page.telemetry.requests.push(request(
        "2",
        "https://www.google-analytics.com/g/collect?v=2",
        1_200,
    ));
    page.telemetry.cookies.push(CookieCapture {
        source_url: "http://example.com/".to_string(),
        raw_set_cookie_header: "session_id=abc; HttpOnly\n_ga=GA1.1.123; Max-Age=63072000"
            .to_string(),
        captured_at_millis: 1_100,
    });

    let loader = ScriptedLoader::new(vec![Ok(page)]);
    let report = auditor(loader, audit_config()).audit("http://example.com").await;

    assert_six_dimensions(&report);
    let violations = report
        .check(Dimension::PreConsentViolations)
        .expect("pre-consent check");
    assert!(violations.found);
    assert_eq!(violations.score, 75);

    let kinds: Vec<_> = violations
        .violations
        .as_ref()
        .map(|v| v.iter().map(|v| v.kind).collect())
        .unwrap_or_default();
    assert_eq!(
        kinds,
        vec![ViolationType::PreConsentCookies, ViolationType::TrackingRequests]
    );

    assert_eq!(report.third_party_services.len(), 1);
    assert_eq!(report.third_party_services[0].name, "Google Analytics");
    assert_eq!(report.third_party_services[0].category, "analytics");

    // 20 + 20 + 12 + 8 + 10 + 18.75
    assert_eq!(report.score, 89);
    assert_eq!(report.recommendations[0].priority, Priority::Critical);
    assert_eq!(report.recommendations[1].priority, Priority::Critical);
    assert_eq!(report.debug.network_request_count, 2);
    assert_eq!(report.debug.load_time_millis, 850);
}

#[tokio::test]
async fn test_degraded_detectors_keep_all_dimensions() {
    let mut rules = RuleLoader::builtin().expect("built-in rules");
    rules.cookie_banner.selectors.insert(0, "div[".to_string());

    let mut page = loaded(COMPLIANT_BODY);
    // Capture window ends before it starts
    page.telemetry.window_start_millis = 6_000;
    page.cookie_jar = (0..11)
        .map(|i| BrowserCookie {
            name: format!("pref_{i}"),
            domain: ".example.com".to_string(),
            captured_at_millis: 5_000,
        })
        .collect();

    let loader = ScriptedLoader::new(vec![Ok(page)]);
    let auditor = Auditor::new(loader, rules, audit_config(), ScoringConfig::default());
    let report = auditor.audit("http://example.com").await;

    assert!(report.is_success());
    assert_six_dimensions(&report);

    let banner = report.check(Dimension::CookieBanner).expect("banner check");
    assert!(!banner.found);
    assert_eq!(banner.score, 0);
    assert!(banner
        .error
        .as_deref()
        .is_some_and(|e| e.contains("Invalid selector 'div['")));

    let violations = report
        .check(Dimension::PreConsentViolations)
        .expect("pre-consent check");
    assert!(!violations.found);
    assert_eq!(violations.score, 50);
    assert!(violations
        .error
        .as_deref()
        .is_some_and(|e| e.contains("capture window")));

    // Remaining detectors still ran
    assert_eq!(report.check(Dimension::PrivacyPolicy).map(|c| c.score), Some(100));
    assert_eq!(report.check(Dimension::Cookies).map(|c| c.score), Some(95));

    // 0 + 20 + 12 + 8 + 9.5 + 12.5
    assert_eq!(report.score, 62);

    let low: Vec<_> = report
        .recommendations
        .iter()
        .filter(|r| r.priority == Priority::Low)
        .filter_map(|r| r.dimension)
        .collect();
    assert_eq!(
        low,
        vec![Dimension::CookieBanner, Dimension::PreConsentViolations]
    );
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.priority == Priority::High && r.dimension == Some(Dimension::CookieBanner)));
}

#[tokio::test]
async fn test_fails_twice_then_succeeds() {
    let loader = ScriptedLoader::new(vec![
        navigation_error(),
        navigation_error(),
        Ok(loaded(COMPLIANT_BODY)),
    ]);
    let report = auditor(loader.clone(), audit_config())
        .audit("http://example.com")
        .await;

    assert!(report.is_success());
    assert_eq!(report.debug.retry_count, 2);
    assert_eq!(loader.calls(), 3);
    assert_six_dimensions(&report);
}

#[tokio::test]
async fn test_exhausted_retries_produce_error_report() {
    let loader = ScriptedLoader::new(vec![
        navigation_error(),
        navigation_error(),
        navigation_error(),
    ]);
    let report = auditor(loader.clone(), audit_config())
        .audit("http://example.com")
        .await;

    assert!(!report.is_success());
    assert_eq!(report.score, 0);
    assert!(report.checks.is_empty());
    assert_eq!(report.debug.retry_count, 2);
    assert_eq!(loader.calls(), 3);

    assert_eq!(report.recommendations.len(), 1);
    assert_eq!(report.recommendations[0].priority, Priority::Error);
    assert!(report.recommendations[0]
        .message
        .contains("ERR_CONNECTION_RESET"));
}

#[tokio::test]
async fn test_http_error_status_is_retried() {
    let loader = ScriptedLoader::new(vec![Ok(with_status(503)), Ok(loaded(COMPLIANT_BODY))]);
    let report = auditor(loader.clone(), audit_config())
        .audit("http://example.com")
        .await;

    assert!(report.is_success());
    assert_eq!(report.debug.retry_count, 1);
    assert_eq!(loader.calls(), 2);
}

#[tokio::test]
async fn test_persistent_404_reports_status() {
    let loader = ScriptedLoader::new(vec![
        Ok(with_status(404)),
        Ok(with_status(404)),
        Ok(with_status(404)),
    ]);
    let report = auditor(loader, audit_config()).audit("http://example.com").await;

    assert_eq!(report.score, 0);
    assert!(report.error.as_deref().is_some_and(|e| e.contains("HTTP 404")));
}

#[tokio::test]
async fn test_missing_document_response_fails() {
    let mut page = loaded(COMPLIANT_BODY);
    page.telemetry.document = None;
    let config = AuditConfig {
        max_retries: 0,
        ..audit_config()
    };
    let loader = ScriptedLoader::new(vec![Ok(page)]);
    let report = auditor(loader.clone(), config).audit("http://example.com").await;

    assert_eq!(report.score, 0);
    assert!(report.error.as_deref().is_some_and(|e| e.contains("no response")));
    assert_eq!(loader.calls(), 1);
}

#[tokio::test]
async fn test_invalid_url_never_loads() {
    let loader = ScriptedLoader::new(vec![]);
    let auditor = auditor(loader.clone(), audit_config());

    for url in ["", "not a url", "ftp://example.com/file"] {
        let report = auditor.audit(url).await;
        assert_eq!(report.score, 0);
        assert!(report.checks.is_empty());
        assert_eq!(report.recommendations[0].priority, Priority::Error);
    }
    assert_eq!(loader.calls(), 0);
}

#[tokio::test]
async fn test_http_url_reports_invalid_ssl() {
    let loader = ScriptedLoader::new(vec![Ok(loaded(COMPLIANT_BODY))]);
    let config = AuditConfig {
        check_ssl: true,
        ..audit_config()
    };
    let report = auditor(loader, config).audit("http://example.com").await;

    assert!(report.is_success());
    let ssl = report.ssl.as_ref().expect("ssl result");
    assert!(!ssl.valid);
    assert!(ssl.details.contains("HTTPS"));
}

#[tokio::test]
async fn test_concurrency_ceiling() {
    let loader = ScriptedLoader::with_delay(
        vec![Ok(loaded(COMPLIANT_BODY)), Ok(loaded(COMPLIANT_BODY))],
        Duration::from_millis(50),
    );
    let config = AuditConfig {
        max_concurrent_audits: 1,
        ..audit_config()
    };
    let auditor = auditor(loader.clone(), config);

    let (first, second) = tokio::join!(
        auditor.audit("http://example.com/a"),
        auditor.audit("http://example.com/b")
    );

    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(loader.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_oversized_concurrency_limit_is_clamped() {
    let loader = ScriptedLoader::new(vec![Ok(loaded(COMPLIANT_BODY))]);
    let config = AuditConfig {
        max_concurrent_audits: usize::MAX,
        ..audit_config()
    };
    let report = auditor(loader, config).audit("http://example.com").await;
    assert!(report.is_success());
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let loader = ScriptedLoader::new(vec![]);
    let auditor = auditor(loader.clone(), audit_config());

    auditor.shutdown().await;
    auditor.shutdown().await;
    assert_eq!(loader.shutdowns.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_report_serializes_to_json() {
    let loader = ScriptedLoader::new(vec![Ok(loaded(COMPLIANT_BODY))]);
    let report = auditor(loader, audit_config()).audit("http://example.com").await;

    let json = serde_json::to_value(&report).expect("serialize report");
    assert!(json["score"].is_u64());
    assert!(json["timestamp"].is_string());
    assert!(json["checks"]["preConsentViolations"]["violations"].is_array());
    assert_eq!(json["debug"]["retryCount"], 0);
}
