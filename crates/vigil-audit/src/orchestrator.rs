//! Audit orchestrator for coordinating page loads, analysis and scoring.
//!
//! This module provides the [`Auditor`], which drives one audit end to end:
//! it loads the page through a [`PageLoader`], retries the whole attempt with
//! exponential backoff on transient failures, runs every detector in
//! isolation, and always returns an [`AuditReport`].

use crate::check::isolate;
use crate::content::ContentAnalyzer;
use crate::cookies::{collect_cookies, inventory_check};
use crate::error::{AuditError, Result};
use crate::recommendations::recommend;
use crate::report::{AuditReport, CheckResult, DebugInfo};
use crate::scoring::overall_score;
use crate::ssl::{SslInspector, SslReport};
use crate::violations::{embedded_trackers, ViolationAnalyzer};
use scraper::Html;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;
use vigil_browser::{LoadedPage, PageLoader};
use vigil_core::{
    AppConfig, AuditConfig, AuditRequest, Dimension, ScoringConfig, Timestamp,
    MAX_CONCURRENT_AUDITS,
};
use vigil_rules::{RuleLoader, RuleSet, RulesError, TrackerRegistry, TrackingService};

/// Largest backoff exponent; keeps the delay computation from overflowing.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Lifecycle of one audit, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditState {
    /// Request accepted, nothing loaded yet
    Idle,
    /// Page load in progress
    Navigating,
    /// Detectors running over a loaded page
    Analyzing,
    /// Report produced from an analysis pass
    Scored,
    /// An attempt failed
    Failed,
    /// Waiting out the backoff before the next attempt
    Retrying,
    /// Retries exhausted; degraded report produced
    ErrorReport,
}

impl fmt::Display for AuditState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Navigating => "navigating",
            Self::Analyzing => "analyzing",
            Self::Scored => "scored",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
            Self::ErrorReport => "error-report",
        };
        f.write_str(name)
    }
}

/// Checks and services produced by one analysis pass.
struct Analysis {
    checks: BTreeMap<Dimension, CheckResult>,
    third_party_services: Vec<TrackingService>,
}

/// Runs compliance audits against a shared page loader.
pub struct Auditor {
    loader: Arc<dyn PageLoader>,
    registry: Arc<TrackerRegistry>,
    rules: Arc<RuleSet>,
    content: ContentAnalyzer,
    violations: ViolationAnalyzer,
    ssl: SslInspector,
    config: AuditConfig,
    scoring: ScoringConfig,
    permits: Arc<Semaphore>,
}

impl Auditor {
    /// Create an auditor from explicit parts.
    #[must_use]
    pub fn new(
        loader: Arc<dyn PageLoader>,
        rules: RuleSet,
        config: AuditConfig,
        scoring: ScoringConfig,
    ) -> Self {
        let rules = Arc::new(rules);
        let registry = Arc::new(TrackerRegistry::from_rules(&rules));
        let permits = Arc::new(Semaphore::new(
            config
                .max_concurrent_audits
                .clamp(1, MAX_CONCURRENT_AUDITS),
        ));

        Self {
            content: ContentAnalyzer::new(rules.clone()),
            violations: ViolationAnalyzer::new(registry.clone(), &scoring),
            ssl: SslInspector::new(Duration::from_secs(config.ssl_timeout_secs)),
            loader,
            registry,
            rules,
            config,
            scoring,
            permits,
        }
    }

    /// Create an auditor from application config, loading the configured rule
    /// set (or the built-in one).
    pub fn from_config(
        loader: Arc<dyn PageLoader>,
        config: &AppConfig,
    ) -> std::result::Result<Self, RulesError> {
        let rules = RuleLoader::new(config.audit.rules_path.clone()).load()?;
        Ok(Self::new(
            loader,
            rules,
            config.audit.clone(),
            config.scoring.clone(),
        ))
    }

    /// Audit one URL. Never fails: invalid input and exhausted retries both
    /// produce an error report with score 0.
    pub async fn audit(&self, url: &str) -> AuditReport {
        let id = Uuid::new_v4();
        let span = info_span!("audit", audit_id = %id, url = %url.trim());
        self.run(id, url).instrument(span).await
    }

    /// Release the browser. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.loader.shutdown().await;
    }

    async fn run(&self, id: Uuid, url: &str) -> AuditReport {
        let request = match AuditRequest::new(url) {
            Ok(request) => request,
            Err(e) => {
                let error = AuditError::from(e);
                warn!(error = %error, "rejected audit request");
                return AuditReport::failed(id, url.trim(), error.to_string(), 0);
            }
        };

        let Ok(_permit) = self.permits.acquire().await else {
            return AuditReport::failed(id, request.as_str(), "auditor is shut down", 0);
        };

        let ssl_task = self.spawn_ssl_check(&request);

        debug!(state = %AuditState::Idle, "audit started");
        let (outcome, retry_count) = self.load_with_retry(&request).await;

        let mut report = match outcome {
            Ok(page) => {
                debug!(state = %AuditState::Analyzing, "analyzing page");
                let analysis = self.analyze(&page);
                let score = overall_score(&analysis.checks, &self.scoring.weights);
                let recommendations = recommend(&analysis.checks, &self.scoring);
                info!(state = %AuditState::Scored, score, retry_count, "audit complete");

                AuditReport {
                    id,
                    url: request.as_str().to_string(),
                    timestamp: Timestamp::now(),
                    checks: analysis.checks,
                    score,
                    recommendations,
                    third_party_services: analysis.third_party_services,
                    ssl: None,
                    debug: DebugInfo {
                        load_time_millis: page.load_time_ms,
                        network_request_count: page.telemetry.requests.len(),
                        retry_count,
                    },
                    error: None,
                }
            }
            Err(e) => {
                warn!(state = %AuditState::ErrorReport, error = %e, retry_count, "audit failed");
                AuditReport::failed(id, request.as_str(), e.to_string(), retry_count)
            }
        };

        if let Some(task) = ssl_task {
            report.ssl = Some(match task.await {
                Ok(ssl) => ssl,
                Err(e) => SslReport {
                    valid: false,
                    details: format!("Certificate check did not complete: {e}"),
                    ..SslReport::default()
                },
            });
        }

        report
    }

    fn spawn_ssl_check(&self, request: &AuditRequest) -> Option<JoinHandle<SslReport>> {
        if !self.config.check_ssl {
            return None;
        }
        let inspector = self.ssl;
        let url = request.url().clone();
        Some(tokio::spawn(
            async move { inspector.check(&url).await }.in_current_span(),
        ))
    }

    /// Load the page, retrying the whole attempt on retryable failures.
    ///
    /// Returns the final outcome and the number of retries performed.
    async fn load_with_retry(&self, request: &AuditRequest) -> (Result<LoadedPage>, u32) {
        let mut retries = 0;
        loop {
            debug!(state = %AuditState::Navigating, attempt = retries + 1, "loading page");
            match self.attempt(request).await {
                Ok(page) => return (Ok(page), retries),
                Err(e) if e.is_retryable() && retries < self.config.max_retries => {
                    let delay = backoff_delay(self.config.retry_base_delay_ms, retries);
                    warn!(
                        state = %AuditState::Failed,
                        attempt = retries + 1,
                        max_attempts = self.config.max_retries + 1,
                        error = %e,
                        "attempt failed, retrying in {:?}",
                        delay
                    );
                    debug!(state = %AuditState::Retrying, "waiting before retry");
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
                Err(e) => return (Err(e), retries),
            }
        }
    }

    /// One attempt: fresh page, fresh telemetry, response status checked.
    async fn attempt(&self, request: &AuditRequest) -> Result<LoadedPage> {
        let page = self.loader.load(request.url()).await?;

        match &page.telemetry.document {
            None => Err(AuditError::NoResponse {
                url: request.as_str().to_string(),
            }),
            Some(document) if document.status >= 400 => Err(AuditError::HttpStatus {
                url: document.url.clone(),
                status: document.status,
            }),
            Some(_) => Ok(page),
        }
    }

    /// Run every detector against a loaded page.
    fn analyze(&self, page: &LoadedPage) -> Analysis {
        let document = Html::parse_document(&page.html);
        let mut checks = self.content.analyze(&document);

        let cookies = collect_cookies(
            &page.telemetry,
            &page.cookie_jar,
            &self.rules.essential_cookies,
        );
        checks.insert(
            Dimension::Cookies,
            isolate(Dimension::Cookies, 0, || {
                Ok(inventory_check(&cookies, &self.scoring))
            }),
        );
        let violations = isolate(
            Dimension::PreConsentViolations,
            self.scoring.violation_fallback_score,
            || self.violations.analyze_snapshot(&cookies, &page.telemetry),
        );

        let mut seen = HashSet::new();
        let third_party_services = violations
            .tracking_services
            .iter()
            .cloned()
            .chain(embedded_trackers(&document, &self.registry))
            .filter(|service| seen.insert(service.name.clone()))
            .collect();

        checks.insert(Dimension::PreConsentViolations, violations);

        Analysis {
            checks,
            third_party_services,
        }
    }
}

/// Delay before retry number `retry + 1`: `base * 2^retry`.
fn backoff_delay(base_ms: u64, retry: u32) -> Duration {
    let factor = 1u64 << retry.min(MAX_BACKOFF_EXPONENT);
    Duration::from_millis(base_ms.saturating_mul(factor))
}
