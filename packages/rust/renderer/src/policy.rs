//! Declarative attempt policies for report rendering.
//!
//! A [`RenderPlan`] is an ordered pair of [`AttemptPolicy`] values. The
//! renderer walks the plan; nothing about timing or markers is hardcoded in
//! the driver.

use std::time::Duration;

/// Desktop Chrome user agent used by the primary attempt.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const MARKER_TIMEOUT: Duration = Duration::from_secs(30);
const FALLBACK_MARKER_TIMEOUT: Duration = Duration::from_secs(20);

/// Page lifecycle point that ends navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    NetworkIdle,
    DomContentLoaded,
}

impl WaitUntil {
    /// CDP `Page.lifecycleEvent` name for this point.
    pub fn lifecycle_event(&self) -> &'static str {
        match self {
            Self::NetworkIdle => "networkIdle",
            Self::DomContentLoaded => "DOMContentLoaded",
        }
    }
}

/// Wait for one DOM element to appear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerWait {
    pub selector: &'static str,
    pub timeout: Duration,
    /// Require a rendered box, not just presence in the DOM.
    pub visible: bool,
}

impl MarkerWait {
    const fn present(selector: &'static str, timeout: Duration) -> Self {
        Self {
            selector,
            timeout,
            visible: false,
        }
    }

    const fn visible(selector: &'static str, timeout: Duration) -> Self {
        Self {
            selector,
            timeout,
            visible: true,
        }
    }
}

/// What a marker timeout means for the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPolicy {
    /// Warn, skip the remaining markers and the post-marker settle, export anyway.
    Warn,
    /// Ignore the timeout without logging above debug.
    Silent,
}

/// Browser process settings for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchProfile {
    pub args: Vec<&'static str>,
    pub window: (u32, u32),
    pub user_agent: Option<&'static str>,
}

/// Paper settings for the exported document. Dimensions are inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfLayout {
    pub paper_width: f64,
    pub paper_height: f64,
    pub margin: f64,
    pub print_background: bool,
    pub prefer_css_page_size: bool,
}

impl PdfLayout {
    /// A4 with backgrounds and half-inch margins.
    pub const fn a4() -> Self {
        Self {
            paper_width: 8.27,
            paper_height: 11.69,
            margin: 0.5,
            print_background: true,
            prefer_css_page_size: false,
        }
    }
}

/// Scroll to the bottom, pause, scroll to the top, pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollPass {
    pub bottom_pause: Duration,
    pub top_pause: Duration,
}

/// Everything one render attempt does, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptPolicy {
    pub label: &'static str,
    pub launch: LaunchProfile,
    pub wait_until: WaitUntil,
    pub navigation_timeout: Duration,
    pub pre_marker_settle: Duration,
    pub markers: Vec<MarkerWait>,
    pub marker_policy: MarkerPolicy,
    /// Only honoured when every marker appeared.
    pub post_marker_settle: Duration,
    pub scroll: Option<ScrollPass>,
    pub pdf: PdfLayout,
}

impl AttemptPolicy {
    /// Strict attempt: network idle, three report markers, scroll pass.
    pub fn primary(navigation_timeout: Duration) -> Self {
        Self {
            label: "primary",
            launch: LaunchProfile {
                args: vec![
                    "--no-sandbox",
                    "--disable-setuid-sandbox",
                    "--disable-dev-shm-usage",
                    "--disable-web-security",
                ],
                window: (1920, 1080),
                user_agent: Some(DESKTOP_USER_AGENT),
            },
            wait_until: WaitUntil::NetworkIdle,
            navigation_timeout,
            pre_marker_settle: Duration::ZERO,
            markers: vec![
                MarkerWait::present(r#"div[data-testid="lh-score__gauge"]"#, MARKER_TIMEOUT),
                MarkerWait::present(".lh-audit-group", MARKER_TIMEOUT),
                MarkerWait::visible(".lh-metrics-container", MARKER_TIMEOUT),
            ],
            marker_policy: MarkerPolicy::Warn,
            post_marker_settle: Duration::from_secs(5),
            scroll: Some(ScrollPass {
                bottom_pause: Duration::from_secs(2),
                top_pause: Duration::from_secs(1),
            }),
            pdf: PdfLayout {
                prefer_css_page_size: true,
                ..PdfLayout::a4()
            },
        }
    }

    /// Lenient attempt: initial content, long settle, one optional marker.
    pub fn fallback(navigation_timeout: Duration) -> Self {
        Self {
            label: "fallback",
            launch: LaunchProfile {
                args: vec!["--no-sandbox"],
                window: (1920, 1080),
                user_agent: None,
            },
            wait_until: WaitUntil::DomContentLoaded,
            navigation_timeout,
            pre_marker_settle: Duration::from_secs(15),
            markers: vec![MarkerWait::present(".lh-root", FALLBACK_MARKER_TIMEOUT)],
            marker_policy: MarkerPolicy::Silent,
            post_marker_settle: Duration::ZERO,
            scroll: None,
            pdf: PdfLayout::a4(),
        }
    }
}

/// The two attempts, tried in order with a recovery step between them.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    pub primary: AttemptPolicy,
    pub fallback: AttemptPolicy,
}

impl RenderPlan {
    pub fn new(navigation_timeout: Duration) -> Self {
        Self {
            primary: AttemptPolicy::primary(navigation_timeout),
            fallback: AttemptPolicy::fallback(navigation_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_is_stricter_than_fallback() {
        let plan = RenderPlan::new(Duration::from_secs(60));

        assert_eq!(plan.primary.wait_until, WaitUntil::NetworkIdle);
        assert_eq!(plan.fallback.wait_until, WaitUntil::DomContentLoaded);
        assert_eq!(plan.primary.markers.len(), 3);
        assert_eq!(plan.fallback.markers.len(), 1);
        assert_eq!(plan.primary.marker_policy, MarkerPolicy::Warn);
        assert_eq!(plan.fallback.marker_policy, MarkerPolicy::Silent);
        assert!(plan.primary.scroll.is_some());
        assert!(plan.fallback.scroll.is_none());
        assert!(plan.fallback.pre_marker_settle > plan.primary.post_marker_settle);
    }

    #[test]
    fn only_metrics_marker_requires_visibility() {
        let plan = RenderPlan::new(Duration::from_secs(60));
        let visible: Vec<_> = plan
            .primary
            .markers
            .iter()
            .filter(|m| m.visible)
            .map(|m| m.selector)
            .collect();
        assert_eq!(visible, vec![".lh-metrics-container"]);
    }

    #[test]
    fn both_attempts_export_a4_with_backgrounds() {
        let plan = RenderPlan::new(Duration::from_secs(60));
        for pdf in [plan.primary.pdf, plan.fallback.pdf] {
            assert_eq!((pdf.paper_width, pdf.paper_height), (8.27, 11.69));
            assert_eq!(pdf.margin, 0.5);
            assert!(pdf.print_background);
        }
        assert!(plan.primary.pdf.prefer_css_page_size);
    }

    #[test]
    fn lifecycle_names_match_cdp() {
        assert_eq!(WaitUntil::NetworkIdle.lifecycle_event(), "networkIdle");
        assert_eq!(WaitUntil::DomContentLoaded.lifecycle_event(), "DOMContentLoaded");
    }
}
