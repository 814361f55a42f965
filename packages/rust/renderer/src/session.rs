//! Browser session abstraction.
//!
//! The renderer only talks to these traits. [`crate::chromium`] drives a
//! real Chromium; tests drive a scripted session.

use std::path::Path;
use std::time::Duration;

use crate::policy::{LaunchProfile, MarkerWait, PdfLayout, WaitUntil};

/// Why a single render step failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("{what} timed out after {after:?}")]
    Timeout { what: String, after: Duration },

    #[error("PDF export failed: {0}")]
    Export(String),

    #[error("browser error: {0}")]
    Browser(String),
}

/// Edge of the page to scroll to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollEdge {
    Top,
    Bottom,
}

/// Starts browser sessions and repairs the browser installation.
#[allow(async_fn_in_trait)]
pub trait BrowserLauncher {
    type Session: BrowserSession;

    /// Start a browser with one blank page ready for navigation.
    async fn launch(&self, profile: &LaunchProfile) -> Result<Self::Session, RenderError>;

    /// Best-effort corrective step run once between the two attempts.
    async fn recover(&self);
}

/// One browser process with one page.
///
/// A session is owned by exactly one attempt and consumed by [`close`](Self::close).
#[allow(async_fn_in_trait)]
pub trait BrowserSession {
    async fn navigate(
        &mut self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<(), RenderError>;

    /// Resolve once the marker is present (and visible, if requested).
    async fn wait_for_marker(&mut self, marker: &MarkerWait) -> Result<(), RenderError>;

    async fn pause(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn scroll_to(&mut self, edge: ScrollEdge) -> Result<(), RenderError>;

    async fn export_pdf(&mut self, layout: &PdfLayout, output: &Path) -> Result<(), RenderError>;

    /// Tear down the page and the browser process. Never fails.
    async fn close(self);
}
