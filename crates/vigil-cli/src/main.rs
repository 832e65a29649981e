//! CLI entry point for Vigil.
//!
//! This binary is intentionally thin: it parses arguments, loads
//! configuration, runs the audits and prints the reports as JSON.
//! All audit logic lives in the `vigil-audit` crate.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use vigil_audit::{AuditReport, Auditor};
use vigil_browser::BrowserEngine;
use vigil_core::AppConfig;

#[derive(Parser, Debug)]
#[command(
    name = "vigil",
    version,
    about = "Audit web pages for GDPR cookie-consent compliance"
)]
struct Cli {
    /// URLs to audit.
    #[arg(required = true)]
    urls: Vec<String>,

    /// Path to a config TOML (defaults to the user config directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Detector rule file replacing the built-in rules.
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Skip the TLS certificate check.
    #[arg(long)]
    no_ssl: bool,

    /// Show the browser window.
    #[arg(long)]
    headful: bool,

    /// Pretty-print JSON output.
    #[arg(long)]
    pretty: bool,
}

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,vigil_audit=debug,vigil_browser=debug,vigil_rules=debug,vigil_core=debug")
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config =
        AppConfig::load_with_env(cli.config.as_deref()).context("failed to load configuration")?;

    if let Some(rules) = &cli.rules {
        config.audit.rules_path = Some(rules.clone());
    }
    if cli.no_ssl {
        config.audit.check_ssl = false;
    }
    if cli.headful {
        config.browser.headless = false;
    }

    Ok(config)
}

/// One report prints as an object, several as an array.
fn render(reports: &[AuditReport], pretty: bool) -> anyhow::Result<String> {
    let value = match reports {
        [single] => serde_json::to_value(single)?,
        many => serde_json::to_value(many)?,
    };
    let rendered = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    Ok(rendered)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    info!("Starting Vigil v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli)?;
    let engine = Arc::new(BrowserEngine::new(config.browser.clone()));
    let auditor = Auditor::from_config(engine, &config).context("failed to load detector rules")?;

    let reports = futures::future::join_all(cli.urls.iter().map(|url| auditor.audit(url))).await;
    auditor.shutdown().await;

    println!("{}", render(&reports, cli.pretty)?);

    if reports.iter().all(AuditReport::is_success) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
