//! The three per-record stages as traits, implemented by the real clients.

use std::path::{Path, PathBuf};

use pagepitch_mailer::{DispatchFailure, SmtpDispatcher};
use pagepitch_renderer::{BrowserLauncher, RenderFailure, RenderSuccess, ReportRenderer};
use pagepitch_scorer::{PageSpeedClient, ScoreFailure};
use pagepitch_shared::{LeadRecord, PerformanceReport};

#[allow(async_fn_in_trait)]
pub trait Scorer {
    async fn score(&self, website: &str) -> Result<PerformanceReport, ScoreFailure>;
}

#[allow(async_fn_in_trait)]
pub trait Renderer {
    async fn render(&self, target: &str, output: &Path) -> Result<RenderSuccess, RenderFailure>;
}

#[allow(async_fn_in_trait)]
pub trait Dispatcher {
    async fn send(
        &self,
        lead: &LeadRecord,
        report: &PerformanceReport,
        attachments: &[PathBuf],
    ) -> Result<(), DispatchFailure>;
}

impl Scorer for PageSpeedClient {
    async fn score(&self, website: &str) -> Result<PerformanceReport, ScoreFailure> {
        PageSpeedClient::score(self, website).await
    }
}

impl<L: BrowserLauncher> Renderer for ReportRenderer<L> {
    async fn render(&self, target: &str, output: &Path) -> Result<RenderSuccess, RenderFailure> {
        ReportRenderer::render(self, target, output).await
    }
}

impl Dispatcher for SmtpDispatcher {
    async fn send(
        &self,
        lead: &LeadRecord,
        report: &PerformanceReport,
        attachments: &[PathBuf],
    ) -> Result<(), DispatchFailure> {
        SmtpDispatcher::send(self, lead, report, attachments).await
    }
}
