//! TLS certificate inspection.
//!
//! The peer certificate is fetched over a raw TLS handshake that accepts any
//! chain, so expired or self-signed certificates can still be reported on
//! instead of failing the connection.

use chrono::{DateTime, Utc};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;
use url::Url;
use x509_parser::prelude::parse_x509_certificate;

const HTTPS_PORT: u16 = 443;
const SECONDS_PER_DAY: i64 = 86_400;

/// Outcome of inspecting a site's certificate. Never an error: every failure
/// is reported as `valid = false` with an explanation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslReport {
    pub valid: bool,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_remaining: Option<i64>,
}

impl SslReport {
    fn failure(details: impl Into<String>) -> Self {
        Self {
            valid: false,
            details: details.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Error)]
enum CertificateError {
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS configuration failed: {0}")]
    Tls(#[from] rustls::Error),

    #[error("invalid server name '{0}'")]
    InvalidHost(String),

    #[error("server presented no certificate")]
    NoCertificate,
}

/// Fetches and evaluates server certificates.
#[derive(Debug, Clone, Copy)]
pub struct SslInspector {
    timeout: Duration,
}

impl SslInspector {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Inspect the certificate served for `url`.
    pub async fn check(&self, url: &Url) -> SslReport {
        if url.scheme() != "https" {
            return SslReport::failure(format!(
                "Site is served over {} instead of HTTPS; traffic is not encrypted",
                url.scheme()
            ));
        }
        let Some(host) = url.host_str() else {
            return SslReport::failure("URL has no host");
        };
        let port = url.port().unwrap_or(HTTPS_PORT);

        match tokio::time::timeout(self.timeout, fetch_certificate(host, port)).await {
            Ok(Ok(der)) => evaluate_certificate(&der, Utc::now()),
            Ok(Err(e)) => {
                debug!(host, error = %e, "certificate fetch failed");
                SslReport::failure(format!("Could not retrieve certificate: {e}"))
            }
            Err(_) => SslReport::failure(format!(
                "TLS handshake with {host} timed out after {}s",
                self.timeout.as_secs()
            )),
        }
    }
}

async fn fetch_certificate(host: &str, port: u16) -> Result<Vec<u8>, CertificateError> {
    let provider = Arc::new(ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
        .with_no_client_auth();

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| CertificateError::InvalidHost(host.to_string()))?;

    let stream = TcpStream::connect((host, port)).await?;
    let tls = TlsConnector::from(Arc::new(config))
        .connect(server_name, stream)
        .await?;

    let (_, connection) = tls.get_ref();
    connection
        .peer_certificates()
        .and_then(|chain| chain.first())
        .map(|cert| cert.as_ref().to_vec())
        .ok_or(CertificateError::NoCertificate)
}

/// Judge a DER certificate against `now`.
fn evaluate_certificate(der: &[u8], now: DateTime<Utc>) -> SslReport {
    let cert = match parse_x509_certificate(der) {
        Ok((_, cert)) => cert,
        Err(e) => return SslReport::failure(format!("Certificate could not be parsed: {e}")),
    };

    let validity = cert.validity();
    let mut report = evaluate_validity(
        validity.not_before.timestamp(),
        validity.not_after.timestamp(),
        now,
    );
    report.subject = Some(cert.subject().to_string());
    report.issuer = Some(cert.issuer().to_string());
    report
}

/// Validity verdict for a certificate window given as Unix seconds.
fn evaluate_validity(not_before: i64, not_after: i64, now: DateTime<Utc>) -> SslReport {
    let now_secs = now.timestamp();
    let valid_from = DateTime::from_timestamp(not_before, 0);
    let valid_to = DateTime::from_timestamp(not_after, 0);
    let days_remaining = (not_after - now_secs).div_euclid(SECONDS_PER_DAY);

    let (valid, details) = if now_secs < not_before {
        (false, "Certificate is not yet valid".to_string())
    } else if now_secs > not_after {
        (
            false,
            format!("Certificate expired {} day(s) ago", -days_remaining),
        )
    } else {
        (
            true,
            format!("Certificate is valid for another {days_remaining} day(s)"),
        )
    };

    SslReport {
        valid,
        details,
        subject: None,
        issuer: None,
        valid_from,
        valid_to,
        days_remaining: Some(days_remaining),
    }
}

/// Verifier that accepts any chain but still checks handshake signatures.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[tokio::test]
    async fn test_http_url_fails_immediately() {
        let inspector = SslInspector::new(Duration::from_secs(5));
        let report = inspector
            .check(&Url::parse("http://example.com/").unwrap())
            .await;
        assert!(!report.valid);
        assert!(report.details.contains("instead of HTTPS"));
        assert!(report.subject.is_none());
    }

    #[tokio::test]
    async fn test_connection_refused_is_reported() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let inspector = SslInspector::new(Duration::from_secs(5));
        let report = inspector
            .check(&Url::parse(&format!("https://127.0.0.1:{port}/")).unwrap())
            .await;
        assert!(!report.valid);
        assert!(!report.details.is_empty());
    }

    #[test]
    fn test_validity_window() {
        let not_before = 1_700_000_000;
        let not_after = not_before + 90 * SECONDS_PER_DAY;

        let report = evaluate_validity(not_before, not_after, at(not_before + 30 * SECONDS_PER_DAY));
        assert!(report.valid);
        assert_eq!(report.days_remaining, Some(60));

        let report = evaluate_validity(not_before, not_after, at(not_after + 2 * SECONDS_PER_DAY));
        assert!(!report.valid);
        assert!(report.details.contains("expired 2 day(s) ago"));

        let report = evaluate_validity(not_before, not_after, at(not_before - 10));
        assert!(!report.valid);
        assert!(report.details.contains("not yet valid"));
    }

    #[test]
    fn test_garbage_certificate() {
        let report = evaluate_certificate(b"not a certificate", Utc::now());
        assert!(!report.valid);
        assert!(report.details.contains("could not be parsed"));
    }
}
