use crate::actions::{LoadedPage, PageLoader};
use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use crate::telemetry::{BrowserCookie, TelemetryCollector};
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
    DisposeBrowserContextParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;
use vigil_core::BrowserConfig;

/// A running browser process and its CDP event pump.
struct Session {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl Session {
    async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Browser process did not exit cleanly: {}", e);
        }
        self.handler.abort();
    }
}

/// A page inside its own browser context, so its cookie jar and storage are
/// invisible to every other audit.
pub struct IsolatedPage {
    pub page: Page,
    pub context: BrowserContextId,
}

/// Browser automation engine.
///
/// Owns at most one browser process, launched on first use and shared by
/// every audit. Each [`PageLoader::load`] call gets its own browser context
/// and page.
pub struct BrowserEngine {
    config: BrowserConfig,
    fingerprint: FingerprintConfig,
    session: Mutex<Option<Session>>,
}

impl BrowserEngine {
    /// Create an engine. No process is started until the first page is opened.
    pub fn new(config: BrowserConfig) -> Self {
        let fingerprint = FingerprintConfig::from_config(&config);
        Self {
            config,
            fingerprint,
            session: Mutex::new(None),
        }
    }

    /// Whether a browser process is currently running.
    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Launch the browser unless it is already running.
    pub async fn ensure_session(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        self.launch_if_needed(&mut session).await
    }

    async fn launch_if_needed(&self, session: &mut Option<Session>) -> Result<()> {
        if session.is_none() {
            *session = Some(self.launch().await?);
        }
        Ok(())
    }

    async fn launch(&self) -> Result<Session> {
        let mut builder = LaunchConfig::builder()
            .no_sandbox()
            .launch_timeout(Duration::from_secs(self.config.launch_timeout_secs))
            .request_timeout(Duration::from_secs(self.config.operation_timeout_secs))
            .window_size(self.fingerprint.viewport_width, self.fingerprint.viewport_height)
            .viewport(self.fingerprint.viewport())
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={}", self.fingerprint.user_agent));

        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.config.executable {
            builder = builder.chrome_executable(executable);
        }

        let config = builder.build().map_err(BrowserError::LaunchError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchError(e.to_string()))?;

        // Spawn browser handler
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        info!(headless = self.config.headless, "browser launched");

        Ok(Session { browser, handler })
    }

    /// Open a fresh page, in a fresh browser context, with the desktop
    /// fingerprint applied.
    ///
    /// A failure to create the context or page discards the session so the
    /// next call relaunches the browser.
    pub async fn open_page(&self) -> Result<IsolatedPage> {
        let mut guard = self.session.lock().await;
        self.launch_if_needed(&mut guard).await?;

        let created = match guard.as_ref() {
            Some(session) => self.create_isolated_page(&session.browser).await,
            None => Err(BrowserError::LaunchError("browser session unavailable".to_string())),
        };

        let isolated = match created {
            Ok(isolated) => isolated,
            Err(e) => {
                warn!("Discarding browser session after page failure: {}", e);
                if let Some(session) = guard.take() {
                    session.shutdown().await;
                }
                return Err(e);
            }
        };
        drop(guard);

        let user_agent = with_timeout(
            self.operation_timeout(),
            "set user agent",
            isolated.page.execute(SetUserAgentOverrideParams::new(
                self.fingerprint.user_agent.clone(),
            )),
        )
        .await;
        if let Err(e) = user_agent {
            self.release(isolated).await;
            return Err(e);
        }

        Ok(isolated)
    }

    async fn create_isolated_page(&self, browser: &Browser) -> Result<IsolatedPage> {
        let context = with_timeout(
            self.operation_timeout(),
            "create browser context",
            browser.execute(CreateBrowserContextParams::default()),
        )
        .await?
        .result
        .browser_context_id;

        let mut target = CreateTargetParams::new("about:blank");
        target.browser_context_id = Some(context.clone());

        match with_timeout(self.operation_timeout(), "open page", browser.new_page(target)).await
        {
            Ok(page) => Ok(IsolatedPage { page, context }),
            Err(e) => {
                self.dispose_context(browser, context).await;
                Err(e)
            }
        }
    }

    /// Close the page and drop its browser context with all cookies in it.
    pub async fn release(&self, isolated: IsolatedPage) {
        if let Err(e) = isolated.page.close().await {
            debug!("Failed to close page: {}", e);
        }
        let guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            self.dispose_context(&session.browser, isolated.context).await;
        }
    }

    async fn dispose_context(&self, browser: &Browser, context: BrowserContextId) {
        let disposed = with_timeout(
            self.operation_timeout(),
            "dispose browser context",
            browser.execute(DisposeBrowserContextParams::new(context)),
        )
        .await;
        if let Err(e) = disposed {
            debug!("Failed to dispose browser context: {}", e);
        }
    }

    /// Shut down the browser process. Safe to call when nothing is running.
    pub async fn close(&self) {
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            session.shutdown().await;
            info!("browser closed");
        }
    }

    fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.config.operation_timeout_secs)
    }

    async fn capture(&self, page: &Page, url: &Url) -> Result<LoadedPage> {
        let collector = TelemetryCollector::attach(page).await?;

        let started = Instant::now();
        let navigation_timeout = Duration::from_secs(self.config.navigation_timeout_secs);
        match tokio::time::timeout(navigation_timeout, page.goto(url.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(BrowserError::NavigationError(e.to_string())),
            Err(_) => {
                return Err(BrowserError::Timeout(format!(
                    "navigation to {url} exceeded {}s",
                    navigation_timeout.as_secs()
                )))
            }
        }
        let load_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(%url, load_time_ms, "page loaded");

        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
        let telemetry = collector.finish();
        let settled_at = telemetry.window_end_millis;

        let cookies = with_timeout(self.operation_timeout(), "read cookies", page.get_cookies()).await?;
        let html = with_timeout(self.operation_timeout(), "read content", page.content()).await?;

        let cookie_jar = cookies
            .into_iter()
            .map(|cookie| BrowserCookie {
                name: cookie.name,
                domain: cookie.domain,
                captured_at_millis: settled_at,
            })
            .collect();

        Ok(LoadedPage {
            html,
            cookie_jar,
            telemetry,
            load_time_ms,
        })
    }
}

#[async_trait::async_trait]
impl PageLoader for BrowserEngine {
    async fn load(&self, url: &Url) -> Result<LoadedPage> {
        let isolated = self.open_page().await?;
        let result = self.capture(&isolated.page, url).await;
        self.release(isolated).await;
        result
    }

    async fn shutdown(&self) {
        self.close().await;
    }
}

async fn with_timeout<T, F>(duration: Duration, operation: &str, future: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, CdpError>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(BrowserError::ChromiumError(format!("{operation}: {e}"))),
        Err(_) => Err(BrowserError::Timeout(format!(
            "{operation} exceeded {}s",
            duration.as_secs()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_engine_is_lazy() {
        let engine = BrowserEngine::new(BrowserConfig::default());
        assert!(!engine.is_running().await);
        assert_eq!(engine.fingerprint.viewport_width, 1920);
    }

    #[tokio::test]
    async fn test_close_without_session_is_noop() {
        let engine = BrowserEngine::new(BrowserConfig::default());
        engine.close().await;
        engine.close().await;
        assert!(!engine.is_running().await);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: Result<()> = with_timeout(Duration::from_millis(10), "slow op", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(BrowserError::Timeout(msg)) if msg.contains("slow op")));
    }

    #[tokio::test]
    async fn test_with_timeout_maps_cdp_error() {
        let result: Result<()> = with_timeout(Duration::from_secs(1), "read content", async {
            Err(CdpError::NoResponse)
        })
        .await;
        assert!(matches!(result, Err(BrowserError::ChromiumError(msg)) if msg.starts_with("read content")));
    }
}
