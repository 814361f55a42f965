//! Outreach pipeline: spreadsheet → leads → score → render → send, one lead at a time.

use std::path::Path;
use std::time::Instant;

use tracing::{error, info, instrument, warn};

use pagepitch_leads::{SanitizedLeads, ingest, sanitize_leads};
use pagepitch_mailer::SmtpDispatcher;
use pagepitch_renderer::ReportRenderer;
use pagepitch_scorer::PageSpeedClient;
use pagepitch_shared::{
    LeadRecord, PagePitchError, PipelineConfig, RecordOutcome, Result, RunId, RunTally,
    RuntimeConfig, SkipReason,
};

use crate::artifact::{ArtifactGuard, artifact_path};
use crate::stages::{Dispatcher, Renderer, Scorer};

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called once with the number of leads about to be processed.
    fn started(&self, total: usize);
    /// Called when a lead enters processing (1-based index).
    fn record_started(&self, index: usize, total: usize, lead: &LeadRecord);
    /// Called when a lead reaches its terminal state.
    fn record_finished(&self, index: usize, outcome: &RecordOutcome);
    /// Called when the run completes.
    fn done(&self, tally: &RunTally);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn started(&self, _total: usize) {}
    fn record_started(&self, _index: usize, _total: usize, _lead: &LeadRecord) {}
    fn record_finished(&self, _index: usize, _outcome: &RecordOutcome) {}
    fn done(&self, _tally: &RunTally) {}
}

// ---------------------------------------------------------------------------
// Lead loading
// ---------------------------------------------------------------------------

/// Ingest and sanitize the lead spreadsheet.
///
/// Unreadable files and unresolvable schemas are fatal for the run.
pub fn load_leads(path: &Path, sheet: Option<&str>) -> Result<SanitizedLeads> {
    let ingested = ingest(path, sheet).inspect_err(|e| {
        error!(path = %path.display(), error = %e, "Failed to read or prepare spreadsheet");
    })?;

    let read = ingested.records.len();
    let sanitized = sanitize_leads(ingested.records);
    info!(
        read,
        kept = sanitized.leads.len(),
        missing_fields = sanitized.dropped_missing,
        invalid_email = sanitized.dropped_invalid_email,
        duplicates = sanitized.dropped_duplicates,
        "sanitized leads"
    );

    Ok(sanitized)
}

/// Run the full outreach pipeline for a resolved configuration.
///
/// Returns the tally; an empty lead list is not an error.
pub async fn run_outreach(
    config: &RuntimeConfig,
    progress: &dyn ProgressReporter,
) -> Result<RunTally> {
    let leads = load_leads(&config.spreadsheet, config.sheet.as_deref())?.leads;
    if leads.is_empty() {
        info!("No valid leads found after cleaning.");
        progress.done(&RunTally::default());
        return Ok(RunTally::default());
    }

    let artifact_dir = &config.pipeline.artifact_dir;
    std::fs::create_dir_all(artifact_dir).map_err(|e| PagePitchError::io(artifact_dir, e))?;

    let pipeline = Pipeline::new(
        PageSpeedClient::new(&config.scoring)?,
        ReportRenderer::new(&config.render)?,
        SmtpDispatcher::new(&config.smtp)?,
        config.pipeline.clone(),
    );

    Ok(pipeline.run(&leads, progress).await)
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Sequential per-record state machine over three stages.
#[derive(Debug)]
pub struct Pipeline<S, R, D> {
    scorer: S,
    renderer: R,
    dispatcher: D,
    config: PipelineConfig,
}

impl<S: Scorer, R: Renderer, D: Dispatcher> Pipeline<S, R, D> {
    pub fn new(scorer: S, renderer: R, dispatcher: D, config: PipelineConfig) -> Self {
        Self {
            scorer,
            renderer,
            dispatcher,
            config,
        }
    }

    /// Process every lead in order and return the tally.
    #[instrument(skip_all, fields(run_id = %RunId::new(), leads = leads.len()))]
    pub async fn run(&self, leads: &[LeadRecord], progress: &dyn ProgressReporter) -> RunTally {
        let mut tally = RunTally::default();
        let total = leads.len();
        progress.started(total);

        for (i, lead) in leads.iter().enumerate() {
            let index = i + 1;
            progress.record_started(index, total, lead);

            let start = Instant::now();
            let outcome = self.process_record(index, lead).await;
            log_outcome(lead, &outcome, start.elapsed().as_secs_f64());

            tally.record(&outcome);
            progress.record_finished(index, &outcome);

            if index < total && !self.config.pace.is_zero() {
                tokio::time::sleep(self.config.pace).await;
            }
        }

        info!("Completed. {tally}");
        progress.done(&tally);
        tally
    }

    /// Drive one lead to a terminal state. The artifact never outlives this call.
    pub async fn process_record(&self, index: usize, lead: &LeadRecord) -> RecordOutcome {
        let artifact =
            ArtifactGuard::claim(artifact_path(&self.config.artifact_dir, &lead.name));

        if lead.website.trim().is_empty() {
            return RecordOutcome::Skipped(SkipReason::MissingWebsite);
        }

        info!(
            "{index} Processing: {} | {} | {}",
            lead.name, lead.website, lead.email
        );

        let Ok(report) = self.scorer.score(&lead.website).await else {
            return RecordOutcome::Skipped(SkipReason::NoScore);
        };

        match self.renderer.render(&report.tested_url, artifact.path()).await {
            Ok(_) if artifact.is_present() => {}
            Ok(success) => {
                warn!(
                    attempt = ?success.attempt,
                    path = %artifact.path().display(),
                    "renderer reported success but wrote no file"
                );
                return RecordOutcome::Skipped(SkipReason::NoArtifact);
            }
            Err(failure) => {
                warn!(url = %report.tested_url, error = %failure, "report rendering failed");
                return RecordOutcome::Skipped(SkipReason::NoArtifact);
            }
        }

        let attachments = [artifact.path().to_path_buf()];
        match self.dispatcher.send(lead, &report, &attachments).await {
            Ok(()) => RecordOutcome::Sent,
            Err(e) => RecordOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

fn log_outcome(lead: &LeadRecord, outcome: &RecordOutcome, elapsed: f64) {
    match outcome {
        RecordOutcome::Sent => info!(
            "Sent to {} ({}) in {elapsed:.2} seconds.",
            lead.name, lead.email
        ),
        RecordOutcome::Failed { reason } => error!(
            reason = %reason,
            "Failed to send to {} ({}) in {elapsed:.2} seconds.",
            lead.name, lead.email
        ),
        RecordOutcome::Skipped(reason) => warn!(
            website = %lead.website,
            "Skipping {} ({}) due to {reason} in {elapsed:.2} seconds.",
            lead.name, lead.email
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    use pagepitch_mailer::DispatchFailure;
    use pagepitch_renderer::{AttemptKind, RenderError, RenderFailure, RenderSuccess};
    use pagepitch_scorer::ScoreFailure;
    use pagepitch_shared::PerformanceReport;

    // -- fakes --------------------------------------------------------------

    struct FakeScorer {
        fail: bool,
        calls: Cell<usize>,
    }

    impl FakeScorer {
        fn ok() -> Self {
            Self { fail: false, calls: Cell::new(0) }
        }

        fn failing() -> Self {
            Self { fail: true, calls: Cell::new(0) }
        }
    }

    impl Scorer for FakeScorer {
        async fn score(&self, website: &str) -> std::result::Result<PerformanceReport, ScoreFailure> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(ScoreFailure::Status(500));
            }
            Ok(PerformanceReport {
                score: 87,
                first_contentful_paint: "1.8 s".into(),
                speed_index: "3.9 s".into(),
                time_to_interactive: "5.2 s".into(),
                tested_url: format!("https://{website}"),
            })
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum RenderMode {
        WritesFile,
        ClaimsSuccessWithoutFile,
        Fails,
    }

    struct FakeRenderer {
        mode: RenderMode,
        targets: RefCell<Vec<String>>,
    }

    impl FakeRenderer {
        fn new(mode: RenderMode) -> Self {
            Self { mode, targets: RefCell::default() }
        }
    }

    impl Renderer for FakeRenderer {
        async fn render(
            &self,
            target: &str,
            output: &Path,
        ) -> std::result::Result<RenderSuccess, RenderFailure> {
            self.targets.borrow_mut().push(target.to_string());
            let success = RenderSuccess {
                attempt: AttemptKind::Primary,
                markers_complete: true,
            };
            match self.mode {
                RenderMode::WritesFile => {
                    std::fs::write(output, b"%PDF-1.4").unwrap();
                    Ok(success)
                }
                RenderMode::ClaimsSuccessWithoutFile => Ok(success),
                RenderMode::Fails => Err(RenderFailure {
                    primary: RenderError::Navigation("boom".into()),
                    fallback: RenderError::Launch("no chrome".into()),
                }),
            }
        }
    }

    struct FakeDispatcher {
        fail: bool,
        /// (recipient, attachment existed at send time)
        sent: RefCell<Vec<(String, bool)>>,
    }

    impl FakeDispatcher {
        fn new(fail: bool) -> Self {
            Self { fail, sent: RefCell::default() }
        }
    }

    impl Dispatcher for FakeDispatcher {
        async fn send(
            &self,
            lead: &LeadRecord,
            _report: &PerformanceReport,
            attachments: &[PathBuf],
        ) -> std::result::Result<(), DispatchFailure> {
            let present = attachments.iter().all(|p| p.is_file());
            self.sent.borrow_mut().push((lead.email.clone(), present));
            if self.fail {
                return Err(DispatchFailure::Transport("connection refused".into()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn started(&self, total: usize) {
            self.events.lock().unwrap().push(format!("started {total}"));
        }
        fn record_started(&self, index: usize, _total: usize, lead: &LeadRecord) {
            self.events.lock().unwrap().push(format!("start {index} {}", lead.email));
        }
        fn record_finished(&self, index: usize, outcome: &RecordOutcome) {
            self.events.lock().unwrap().push(format!("finish {index} {outcome:?}"));
        }
        fn done(&self, tally: &RunTally) {
            self.events.lock().unwrap().push(format!("done {tally}"));
        }
    }

    // -- helpers ------------------------------------------------------------

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pp-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            artifact_dir: dir.to_path_buf(),
            pace: Duration::ZERO,
        }
    }

    fn lead(name: &str, website: &str, email: &str) -> LeadRecord {
        LeadRecord {
            name: name.into(),
            website: website.into(),
            email: email.into(),
        }
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    // -- scenarios ----------------------------------------------------------

    #[tokio::test]
    async fn valid_lead_is_sent_and_artifact_removed() {
        let tmp = temp_dir();
        let pipeline = Pipeline::new(
            FakeScorer::ok(),
            FakeRenderer::new(RenderMode::WritesFile),
            FakeDispatcher::new(false),
            config(&tmp),
        );

        let tally = pipeline
            .run(&[lead("Jo Smith", "acme.com", "jo@acme.com")], &SilentProgress)
            .await;

        assert_eq!(tally, RunTally { sent: 1, failed: 0, skipped: 0 });
        assert_eq!(*pipeline.renderer.targets.borrow(), vec!["https://acme.com"]);
        assert_eq!(
            *pipeline.dispatcher.sent.borrow(),
            vec![("jo@acme.com".to_string(), true)],
            "attachment should exist while sending"
        );
        assert!(!tmp.join("Jo_Smith_pagespeed_report.pdf").exists());
        assert!(dir_is_empty(&tmp));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn blank_website_is_skipped_without_external_calls() {
        let tmp = temp_dir();
        let pipeline = Pipeline::new(
            FakeScorer::ok(),
            FakeRenderer::new(RenderMode::WritesFile),
            FakeDispatcher::new(false),
            config(&tmp),
        );

        let tally = pipeline
            .run(&[lead("Jo", "   ", "jo@acme.com")], &SilentProgress)
            .await;

        assert_eq!(tally, RunTally { sent: 0, failed: 0, skipped: 1 });
        assert_eq!(pipeline.scorer.calls.get(), 0);
        assert!(pipeline.renderer.targets.borrow().is_empty());
        assert!(pipeline.dispatcher.sent.borrow().is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn scoring_failure_skips_before_rendering() {
        let tmp = temp_dir();
        let pipeline = Pipeline::new(
            FakeScorer::failing(),
            FakeRenderer::new(RenderMode::WritesFile),
            FakeDispatcher::new(false),
            config(&tmp),
        );

        let outcome = pipeline
            .process_record(1, &lead("Jo", "acme.com", "jo@acme.com"))
            .await;

        assert_eq!(outcome, RecordOutcome::Skipped(SkipReason::NoScore));
        assert_eq!(pipeline.scorer.calls.get(), 1);
        assert!(pipeline.renderer.targets.borrow().is_empty());
        assert!(dir_is_empty(&tmp), "no artifact should ever be created");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn render_failure_skips_without_sending() {
        let tmp = temp_dir();
        let pipeline = Pipeline::new(
            FakeScorer::ok(),
            FakeRenderer::new(RenderMode::Fails),
            FakeDispatcher::new(false),
            config(&tmp),
        );

        let outcome = pipeline
            .process_record(1, &lead("Jo", "acme.com", "jo@acme.com"))
            .await;

        assert_eq!(outcome, RecordOutcome::Skipped(SkipReason::NoArtifact));
        assert!(pipeline.dispatcher.sent.borrow().is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn reported_success_without_file_is_a_skip() {
        let tmp = temp_dir();
        let pipeline = Pipeline::new(
            FakeScorer::ok(),
            FakeRenderer::new(RenderMode::ClaimsSuccessWithoutFile),
            FakeDispatcher::new(false),
            config(&tmp),
        );

        let outcome = pipeline
            .process_record(1, &lead("Jo", "acme.com", "jo@acme.com"))
            .await;

        assert_eq!(outcome, RecordOutcome::Skipped(SkipReason::NoArtifact));
        assert!(pipeline.dispatcher.sent.borrow().is_empty());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn dispatch_failure_is_failed_and_artifact_removed() {
        let tmp = temp_dir();
        let pipeline = Pipeline::new(
            FakeScorer::ok(),
            FakeRenderer::new(RenderMode::WritesFile),
            FakeDispatcher::new(true),
            config(&tmp),
        );

        let outcome = pipeline
            .process_record(1, &lead("Jo", "acme.com", "jo@acme.com"))
            .await;

        match outcome {
            RecordOutcome::Failed { reason } => assert!(reason.contains("connection refused")),
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(dir_is_empty(&tmp));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn stale_artifact_is_cleaned_up_on_skip() {
        let tmp = temp_dir();
        let stale = tmp.join("Jo_pagespeed_report.pdf");
        std::fs::write(&stale, b"old").unwrap();

        let pipeline = Pipeline::new(
            FakeScorer::failing(),
            FakeRenderer::new(RenderMode::WritesFile),
            FakeDispatcher::new(false),
            config(&tmp),
        );
        pipeline
            .process_record(1, &lead("Jo", "acme.com", "jo@acme.com"))
            .await;

        assert!(!stale.exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn leftover_pdf_is_never_mailed_when_render_writes_nothing() {
        let tmp = temp_dir();
        let stale = tmp.join("Jo_pagespeed_report.pdf");
        std::fs::write(&stale, b"pdf from an earlier run").unwrap();

        let pipeline = Pipeline::new(
            FakeScorer::ok(),
            FakeRenderer::new(RenderMode::ClaimsSuccessWithoutFile),
            FakeDispatcher::new(false),
            config(&tmp),
        );
        let outcome = pipeline
            .process_record(1, &lead("Jo", "acme.com", "jo@acme.com"))
            .await;

        assert_eq!(outcome, RecordOutcome::Skipped(SkipReason::NoArtifact));
        assert!(pipeline.dispatcher.sent.borrow().is_empty());
        assert!(!stale.exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_sleeps_between_records_only() {
        let tmp = temp_dir();
        let pipeline = Pipeline::new(
            FakeScorer::ok(),
            FakeRenderer::new(RenderMode::WritesFile),
            FakeDispatcher::new(false),
            PipelineConfig {
                artifact_dir: tmp.clone(),
                pace: Duration::from_millis(800),
            },
        );

        let start = tokio::time::Instant::now();
        let tally = pipeline
            .run(
                &[
                    lead("A", "a.com", "a@a.com"),
                    lead("B", "", "b@b.com"),
                    lead("C", "c.com", "c@c.com"),
                ],
                &SilentProgress,
            )
            .await;

        assert_eq!(tally, RunTally { sent: 2, failed: 0, skipped: 1 });
        assert_eq!(start.elapsed(), Duration::from_millis(1600));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn tally_and_progress_cover_every_record() {
        let tmp = temp_dir();
        let pipeline = Pipeline::new(
            FakeScorer::ok(),
            FakeRenderer::new(RenderMode::WritesFile),
            FakeDispatcher::new(false),
            config(&tmp),
        );
        let progress = RecordingProgress::default();

        let tally = pipeline
            .run(
                &[
                    lead("A", "a.com", "a@a.com"),
                    lead("B", "", "b@b.com"),
                    lead("C", "c.com", "c@c.com"),
                ],
                &progress,
            )
            .await;

        assert_eq!(tally, RunTally { sent: 2, failed: 0, skipped: 1 });
        assert_eq!(tally.total(), 3);

        let events = progress.events.lock().unwrap();
        assert_eq!(events.first().map(String::as_str), Some("started 3"));
        assert_eq!(
            events.last().map(String::as_str),
            Some("done Sent: 2 | Failed: 0 | Skipped: 1")
        );
        assert!(events.contains(&"finish 2 Skipped(MissingWebsite)".to_string()));

        let sent: Vec<_> = pipeline
            .dispatcher
            .sent
            .borrow()
            .iter()
            .map(|(email, _)| email.clone())
            .collect();
        assert_eq!(sent, vec!["a@a.com", "c@c.com"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn unreadable_spreadsheet_is_fatal() {
        let tmp = temp_dir();
        let runtime = RuntimeConfig {
            spreadsheet: tmp.join("missing.xlsx"),
            sheet: None,
            scoring: pagepitch_shared::ScoringConfig {
                endpoint: "http://127.0.0.1:1".into(),
                api_key: "k".into(),
                strategy: "mobile".into(),
                timeout: Duration::from_secs(1),
            },
            render: pagepitch_shared::RenderConfig {
                report_url: "https://pagespeed.web.dev/report".into(),
                chrome_executable: None,
                reinstall_command: Vec::new(),
                navigation_timeout: Duration::from_secs(1),
            },
            smtp: pagepitch_shared::SmtpConfig {
                host: "127.0.0.1".into(),
                port: 1,
                address: "me@pagepitch.dev".into(),
                password: "p".into(),
                timeout: Duration::from_secs(1),
            },
            pipeline: config(&tmp),
        };

        let result = run_outreach(&runtime, &SilentProgress).await;
        assert!(matches!(result, Err(PagePitchError::Ingest { .. })));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
