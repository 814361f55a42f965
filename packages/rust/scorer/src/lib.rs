//! PageSpeed Insights scoring for a single website.
//!
//! One GET per website against the v5 `runPagespeed` endpoint with a fixed
//! device strategy. Every failure (bad URL, transport, HTTP status, response
//! shape) comes back as a [`ScoreFailure`] and is logged here; nothing is
//! retried.

use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

use pagepitch_leads::sanitize_url;
use pagepitch_shared::{NOT_AVAILABLE, PagePitchError, PerformanceReport, ScoringConfig};

/// User-Agent string for scoring requests.
const USER_AGENT: &str = concat!("PagePitch/", env!("CARGO_PKG_VERSION"));

/// Audit ids for the three reported timing metrics.
const AUDIT_FCP: &str = "first-contentful-paint";
const AUDIT_SPEED_INDEX: &str = "speed-index";
const AUDIT_INTERACTIVE: &str = "interactive";

// ---------------------------------------------------------------------------
// ScoreFailure
// ---------------------------------------------------------------------------

/// Why a website could not be scored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreFailure {
    /// The website did not sanitize to a URL with a host.
    #[error("no usable URL in {0:?}")]
    InvalidUrl(String),

    /// Connection, timeout or body read error.
    #[error("request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),

    /// The body was not the expected Lighthouse result.
    #[error("unexpected response: {0}")]
    Shape(String),
}

// ---------------------------------------------------------------------------
// Response shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageSpeedResponse {
    lighthouse_result: LighthouseResult,
}

#[derive(Debug, Deserialize)]
struct LighthouseResult {
    categories: Categories,
    #[serde(default)]
    audits: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Categories {
    performance: PerformanceCategory,
}

#[derive(Debug, Deserialize)]
struct PerformanceCategory {
    score: Option<f64>,
}

impl LighthouseResult {
    fn display_value(&self, audit: &str) -> String {
        self.audits
            .get(audit)
            .and_then(|a| a.get("displayValue"))
            .and_then(|v| v.as_str())
            .unwrap_or(NOT_AVAILABLE)
            .to_string()
    }
}

/// Build a [`PerformanceReport`] from a `runPagespeed` JSON body.
///
/// The 0–1 performance figure is scaled to 0–100 and truncated.
pub fn parse_report(body: &str, tested_url: &str) -> Result<PerformanceReport, ScoreFailure> {
    let response: PageSpeedResponse =
        serde_json::from_str(body).map_err(|e| ScoreFailure::Shape(e.to_string()))?;
    let lighthouse = response.lighthouse_result;

    let score = lighthouse
        .categories
        .performance
        .score
        .ok_or_else(|| ScoreFailure::Shape("performance score is null".into()))?;

    Ok(PerformanceReport {
        score: (score * 100.0).trunc().clamp(0.0, 100.0) as u8,
        first_contentful_paint: lighthouse.display_value(AUDIT_FCP),
        speed_index: lighthouse.display_value(AUDIT_SPEED_INDEX),
        time_to_interactive: lighthouse.display_value(AUDIT_INTERACTIVE),
        tested_url: tested_url.to_string(),
    })
}

// ---------------------------------------------------------------------------
// PageSpeedClient
// ---------------------------------------------------------------------------

/// Client for the PageSpeed Insights API.
#[derive(Debug, Clone)]
pub struct PageSpeedClient {
    client: Client,
    endpoint: String,
    api_key: String,
    strategy: String,
}

impl PageSpeedClient {
    /// Build a client with the configured endpoint, key and timeout.
    pub fn new(config: &ScoringConfig) -> pagepitch_shared::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| PagePitchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            strategy: config.strategy.clone(),
        })
    }

    /// Score one website. The raw website is sanitized first.
    #[instrument(skip_all, fields(website = %website))]
    pub async fn score(&self, website: &str) -> Result<PerformanceReport, ScoreFailure> {
        let result = match sanitize_url(website) {
            Some(url) => self.fetch(&url).await,
            None => Err(ScoreFailure::InvalidUrl(website.to_string())),
        };

        match &result {
            Ok(report) => info!(
                url = %report.tested_url,
                score = report.score,
                fcp = %report.first_contentful_paint,
                "PageSpeed score received"
            ),
            Err(e) => error!(website, error = %e, "Error fetching PageSpeed data"),
        }

        result
    }

    async fn fetch(&self, url: &str) -> Result<PerformanceReport, ScoreFailure> {
        debug!(url, strategy = %self.strategy, "requesting PageSpeed report");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("url", url),
                ("key", self.api_key.as_str()),
                ("strategy", self.strategy.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ScoreFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoreFailure::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ScoreFailure::Transport(format!("failed to read body: {e}")))?;

        parse_report(&body, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture() -> String {
        std::fs::read_to_string("../../../fixtures/json/pagespeed.fixture.json")
            .expect("read pagespeed fixture")
    }

    fn client_for(server: &MockServer) -> PageSpeedClient {
        PageSpeedClient::new(&ScoringConfig {
            endpoint: format!("{}/runPagespeed", server.uri()),
            api_key: "test-key".into(),
            strategy: "mobile".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn parse_fixture_report() {
        let report = parse_report(&fixture(), "https://acme.example").unwrap();
        assert_eq!(report.score, 87);
        assert_eq!(report.first_contentful_paint, "1.8 s");
        assert_eq!(report.speed_index, "3.9 s");
        assert_eq!(report.time_to_interactive, "5.2 s");
        assert_eq!(report.tested_url, "https://acme.example");
    }

    #[test]
    fn score_is_truncated_not_rounded() {
        let body = r#"{"lighthouseResult":{"categories":{"performance":{"score":0.999}},"audits":{}}}"#;
        assert_eq!(parse_report(body, "u").unwrap().score, 99);

        let body = r#"{"lighthouseResult":{"categories":{"performance":{"score":1}},"audits":{}}}"#;
        assert_eq!(parse_report(body, "u").unwrap().score, 100);
    }

    #[test]
    fn absent_audits_default_to_not_available() {
        let body = r#"{"lighthouseResult":{"categories":{"performance":{"score":0.5}},"audits":{"speed-index":{"score":0.4}}}}"#;
        let report = parse_report(body, "u").unwrap();
        assert_eq!(report.score, 50);
        assert_eq!(report.first_contentful_paint, NOT_AVAILABLE);
        assert_eq!(report.speed_index, NOT_AVAILABLE);
        assert_eq!(report.time_to_interactive, NOT_AVAILABLE);
    }

    #[test]
    fn unexpected_shapes_are_rejected() {
        for body in [
            "not json",
            "{}",
            r#"{"lighthouseResult":{"audits":{}}}"#,
            r#"{"lighthouseResult":{"categories":{"performance":{"score":null}}}}"#,
        ] {
            assert!(
                matches!(parse_report(body, "u"), Err(ScoreFailure::Shape(_))),
                "{body}"
            );
        }
    }

    #[tokio::test]
    async fn score_sends_expected_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/runPagespeed"))
            .and(query_param("url", "https://acme.example"))
            .and(query_param("key", "test-key"))
            .and(query_param("strategy", "mobile"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
            .expect(1)
            .mount(&server)
            .await;

        let report = client_for(&server).score("  acme.example ").await.unwrap();
        assert_eq!(report.score, 87);
        assert_eq!(report.tested_url, "https://acme.example");
    }

    #[tokio::test]
    async fn http_error_status_is_a_soft_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/runPagespeed"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = client_for(&server).score("https://acme.example").await;
        assert_eq!(result, Err(ScoreFailure::Status(429)));
    }

    #[tokio::test]
    async fn malformed_body_is_a_soft_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/runPagespeed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"error":"quota"}"#),
            )
            .mount(&server)
            .await;

        let result = client_for(&server).score("https://acme.example").await;
        assert!(matches!(result, Err(ScoreFailure::Shape(_))));
    }

    #[tokio::test]
    async fn unusable_url_makes_no_request() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
            .expect(0)
            .mount(&server)
            .await;

        let result = client_for(&server).score("   ").await;
        assert!(matches!(result, Err(ScoreFailure::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_failure() {
        let client = PageSpeedClient::new(&ScoringConfig {
            endpoint: "http://127.0.0.1:1/runPagespeed".into(),
            api_key: "k".into(),
            strategy: "mobile".into(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();

        let result = client.score("acme.example").await;
        assert!(matches!(result, Err(ScoreFailure::Transport(_))));
    }
}
