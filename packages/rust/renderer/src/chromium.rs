//! Chromium driver over the DevTools protocol (`chromiumoxide`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, NavigateParams, PrintToPdfParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pagepitch_shared::RenderConfig;

use crate::policy::{LaunchProfile, MarkerWait, PdfLayout, WaitUntil};
use crate::session::{BrowserLauncher, BrowserSession, RenderError, ScrollEdge};

const MARKER_POLL: Duration = Duration::from_millis(250);
const RECOVERY_TIMEOUT: Duration = Duration::from_secs(300);
const EXIT_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Launcher
// ---------------------------------------------------------------------------

/// Launches headless Chromium processes.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    executable: Option<PathBuf>,
    reinstall_command: Vec<String>,
}

impl ChromiumLauncher {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            executable: config.chrome_executable.clone(),
            reinstall_command: config.reinstall_command.clone(),
        }
    }
}

impl BrowserLauncher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self, profile: &LaunchProfile) -> Result<ChromiumSession, RenderError> {
        let (width, height) = profile.window;
        let mut builder = BrowserConfig::builder()
            .args(profile.args.iter().copied())
            .window_size(width, height)
            .viewport(Viewport {
                width,
                height,
                ..Viewport::default()
            });
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(RenderError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let mut session = ChromiumSession {
            browser,
            page: None,
            handler: Some(handler),
        };

        match session.open_page(profile.user_agent).await {
            Ok(page) => {
                session.page = Some(page);
                Ok(session)
            }
            Err(e) => {
                session.close().await;
                Err(e)
            }
        }
    }

    async fn recover(&self) {
        let Some((program, args)) = self.reinstall_command.split_first() else {
            debug!("no browser reinstall command configured");
            return;
        };

        info!(command = %self.reinstall_command.join(" "), "reinstalling browser");
        let status = tokio::time::timeout(
            RECOVERY_TIMEOUT,
            tokio::process::Command::new(program)
                .args(args)
                .kill_on_drop(true)
                .status(),
        )
        .await;

        match status {
            Ok(Ok(status)) if status.success() => info!("browser reinstall finished"),
            Ok(Ok(status)) => warn!(%status, "browser reinstall exited unsuccessfully"),
            Ok(Err(e)) => warn!(error = %e, program, "could not run browser reinstall"),
            Err(_) => warn!(timeout = ?RECOVERY_TIMEOUT, "browser reinstall timed out"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One Chromium process plus its event handler task and page.
pub struct ChromiumSession {
    browser: Browser,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
}

impl ChromiumSession {
    async fn open_page(&self, user_agent: Option<&str>) -> Result<Page, RenderError> {
        let page = self.browser.new_page("about:blank").await.map_err(browser_error)?;
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(browser_error)?;
        if let Some(ua) = user_agent {
            page.execute(SetUserAgentOverrideParams::new(ua))
                .await
                .map_err(browser_error)?;
        }
        Ok(page)
    }

    fn page(&self) -> Result<&Page, RenderError> {
        self.page
            .as_ref()
            .ok_or_else(|| RenderError::Browser("session has no page".into()))
    }

    async fn marker_present(&self, marker: &MarkerWait) -> Result<bool, RenderError> {
        let result = self
            .page()?
            .evaluate(marker_script(marker))
            .await
            .map_err(browser_error)?;
        result
            .into_value::<bool>()
            .map_err(|e| RenderError::Browser(format!("marker check returned non-bool: {e}")))
    }
}

impl BrowserSession for ChromiumSession {
    async fn navigate(
        &mut self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<(), RenderError> {
        let page = self.page()?;
        let mut events = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(browser_error)?;
        let target = wait_until.lifecycle_event();

        let navigation = async {
            let response = page
                .execute(NavigateParams::new(url))
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;
            if let Some(error) = &response.result.error_text {
                return Err(RenderError::Navigation(error.clone()));
            }
            let loader = response.result.loader_id.clone();

            while let Some(event) = events.next().await {
                let same_load = loader.as_ref().is_none_or(|id| *id == event.loader_id);
                if same_load && event.name == target {
                    debug!(event = target, "navigation reached lifecycle point");
                    return Ok(());
                }
            }
            Err(RenderError::Browser("lifecycle event stream closed".into()))
        };

        tokio::time::timeout(timeout, navigation)
            .await
            .unwrap_or_else(|_| {
                Err(RenderError::Timeout {
                    what: format!("navigation to {target}"),
                    after: timeout,
                })
            })
    }

    async fn wait_for_marker(&mut self, marker: &MarkerWait) -> Result<(), RenderError> {
        let poll = async {
            loop {
                if self.marker_present(marker).await? {
                    return Ok(());
                }
                tokio::time::sleep(MARKER_POLL).await;
            }
        };

        tokio::time::timeout(marker.timeout, poll)
            .await
            .unwrap_or_else(|_| {
                Err(RenderError::Timeout {
                    what: format!("marker {}", marker.selector),
                    after: marker.timeout,
                })
            })
    }

    async fn scroll_to(&mut self, edge: ScrollEdge) -> Result<(), RenderError> {
        let script = match edge {
            ScrollEdge::Top => "window.scrollTo(0, 0)",
            ScrollEdge::Bottom => "window.scrollTo(0, document.body.scrollHeight)",
        };
        self.page()?.evaluate(script).await.map_err(browser_error)?;
        Ok(())
    }

    async fn export_pdf(&mut self, layout: &PdfLayout, output: &Path) -> Result<(), RenderError> {
        let params = PrintToPdfParams {
            print_background: Some(layout.print_background),
            paper_width: Some(layout.paper_width),
            paper_height: Some(layout.paper_height),
            margin_top: Some(layout.margin),
            margin_bottom: Some(layout.margin),
            margin_left: Some(layout.margin),
            margin_right: Some(layout.margin),
            prefer_css_page_size: Some(layout.prefer_css_page_size),
            ..PrintToPdfParams::default()
        };

        let bytes = self
            .page()?
            .save_pdf(params, output)
            .await
            .map_err(|e| RenderError::Export(e.to_string()))?;
        debug!(bytes = bytes.len(), path = %output.display(), "PDF written");
        Ok(())
    }

    async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!(error = %e, "page close failed");
            }
        }
        if let Err(e) = self.browser.close().await {
            debug!(error = %e, "browser close failed");
        }
        if !exited_within(EXIT_TIMEOUT, self.browser.wait()).await {
            warn!(timeout = ?EXIT_TIMEOUT, "browser did not exit, killing it");
            if let Some(Err(e)) = self.browser.kill().await {
                debug!(error = %e, "browser kill failed");
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

fn browser_error(e: chromiumoxide::error::CdpError) -> RenderError {
    RenderError::Browser(e.to_string())
}

/// JS expression that is `true` once the marker matches.
/// Await a process exit for at most `limit`. False when the limit elapsed.
async fn exited_within<T, E: std::fmt::Display>(
    limit: Duration,
    exit: impl Future<Output = std::result::Result<T, E>>,
) -> bool {
    match tokio::time::timeout(limit, exit).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!(error = %e, "browser process wait failed");
            true
        }
        Err(_) => false,
    }
}

fn marker_script(marker: &MarkerWait) -> String {
    let selector = serde_json::Value::from(marker.selector).to_string();
    if marker.visible {
        format!(
            "(() => {{ const el = document.querySelector({selector}); \
             if (!el) return false; \
             const style = window.getComputedStyle(el); \
             const rect = el.getBoundingClientRect(); \
             return style.visibility !== 'hidden' && style.display !== 'none' \
             && (rect.width > 0 || rect.height > 0); }})()"
        )
    } else {
        format!("document.querySelector({selector}) !== null")
    }
}
