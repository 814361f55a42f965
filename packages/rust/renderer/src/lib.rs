//! PageSpeed report rendering to PDF via a headless browser.
//!
//! [`ReportRenderer::render`] walks a [`RenderPlan`]: the primary attempt,
//! then (only if it failed) one recovery step and the fallback attempt.
//! Every attempt owns its browser session and closes it exactly once before
//! returning.

pub mod chromium;
pub mod policy;
pub mod session;

pub use chromium::{ChromiumLauncher, ChromiumSession};
pub use policy::{
    AttemptPolicy, LaunchProfile, MarkerPolicy, MarkerWait, PdfLayout, RenderPlan, ScrollPass,
    WaitUntil,
};
pub use session::{BrowserLauncher, BrowserSession, RenderError, ScrollEdge};

use std::path::Path;

use tracing::{debug, info, instrument, warn};
use url::Url;

use pagepitch_shared::{PagePitchError, RenderConfig, Result};

/// Which attempt produced the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    Primary,
    Fallback,
}

/// A document was exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSuccess {
    pub attempt: AttemptKind,
    /// `false` when a marker timed out and the export ran on a partial page.
    pub markers_complete: bool,
}

/// Both attempts failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("primary attempt: {primary}; fallback attempt: {fallback}")]
pub struct RenderFailure {
    pub primary: RenderError,
    pub fallback: RenderError,
}

/// Renders hosted PageSpeed reports for target websites.
#[derive(Debug, Clone)]
pub struct ReportRenderer<L = ChromiumLauncher> {
    launcher: L,
    plan: RenderPlan,
    report_url: Url,
}

impl ReportRenderer<ChromiumLauncher> {
    /// Chromium-backed renderer from runtime configuration.
    pub fn new(config: &RenderConfig) -> Result<Self> {
        Self::with_launcher(
            ChromiumLauncher::new(config),
            RenderPlan::new(config.navigation_timeout),
            &config.report_url,
        )
    }
}

impl<L: BrowserLauncher> ReportRenderer<L> {
    pub fn with_launcher(launcher: L, plan: RenderPlan, report_url: &str) -> Result<Self> {
        let report_url = Url::parse(report_url)
            .map_err(|e| PagePitchError::config(format!("invalid report URL '{report_url}': {e}")))?;
        Ok(Self {
            launcher,
            plan,
            report_url,
        })
    }

    /// Report viewer URL for `target`, with the target form-encoded as `url`.
    pub fn report_page_url(&self, target: &str) -> String {
        let mut url = self.report_url.clone();
        url.query_pairs_mut().append_pair("url", target);
        url.into()
    }

    /// Render the report for `target` into `output`.
    #[instrument(skip_all, fields(target = %target, output = %output.display()))]
    pub async fn render(
        &self,
        target: &str,
        output: &Path,
    ) -> std::result::Result<RenderSuccess, RenderFailure> {
        let page_url = self.report_page_url(target);

        let primary = match self.attempt(&self.plan.primary, &page_url, output).await {
            Ok(markers_complete) => {
                info!(markers_complete, "report rendered");
                return Ok(RenderSuccess {
                    attempt: AttemptKind::Primary,
                    markers_complete,
                });
            }
            Err(e) => e,
        };

        warn!(error = %primary, "primary render failed, trying fallback");
        self.launcher.recover().await;

        match self.attempt(&self.plan.fallback, &page_url, output).await {
            Ok(markers_complete) => {
                info!(markers_complete, "report rendered by fallback");
                Ok(RenderSuccess {
                    attempt: AttemptKind::Fallback,
                    markers_complete,
                })
            }
            Err(fallback) => {
                warn!(error = %fallback, "fallback render failed");
                Err(RenderFailure { primary, fallback })
            }
        }
    }

    /// Launch, drive, close. Returns whether every marker appeared.
    async fn attempt(
        &self,
        policy: &AttemptPolicy,
        page_url: &str,
        output: &Path,
    ) -> std::result::Result<bool, RenderError> {
        debug!(attempt = policy.label, "launching browser");
        let mut session = self.launcher.launch(&policy.launch).await?;
        let result = drive(&mut session, policy, page_url, output).await;
        session.close().await;
        result
    }
}

async fn drive<S: BrowserSession>(
    session: &mut S,
    policy: &AttemptPolicy,
    page_url: &str,
    output: &Path,
) -> std::result::Result<bool, RenderError> {
    session
        .navigate(page_url, policy.wait_until, policy.navigation_timeout)
        .await?;

    if !policy.pre_marker_settle.is_zero() {
        session.pause(policy.pre_marker_settle).await;
    }

    let mut markers_complete = true;
    for marker in &policy.markers {
        match session.wait_for_marker(marker).await {
            Ok(()) => {}
            Err(e) => {
                markers_complete = false;
                match policy.marker_policy {
                    MarkerPolicy::Warn => {
                        warn!(
                            attempt = policy.label,
                            selector = marker.selector,
                            error = %e,
                            "report marker did not appear, exporting partial page"
                        );
                        break;
                    }
                    MarkerPolicy::Silent => {
                        debug!(
                            selector = marker.selector,
                            error = %e,
                            "optional marker did not appear"
                        );
                    }
                }
            }
        }
    }

    if markers_complete && !policy.post_marker_settle.is_zero() {
        session.pause(policy.post_marker_settle).await;
    }

    if let Some(scroll) = policy.scroll {
        session.scroll_to(ScrollEdge::Bottom).await?;
        session.pause(scroll.bottom_pause).await;
        session.scroll_to(ScrollEdge::Top).await?;
        session.pause(scroll.top_pause).await;
    }

    session.export_pdf(&policy.pdf, output).await?;
    Ok(markers_complete)
}
