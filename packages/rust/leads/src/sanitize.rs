//! Lead record sanitizing: trimming, email/URL validation, deduplication.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use url::Url;

use pagepitch_shared::LeadRecord;

/// Leads that survived sanitizing, plus what was dropped and why.
#[derive(Debug, Clone, Default)]
pub struct SanitizedLeads {
    /// Valid, unique leads in first-occurrence order.
    pub leads: Vec<LeadRecord>,
    /// Rows with a blank email or website.
    pub dropped_missing: usize,
    /// Rows whose email failed the syntax check.
    pub dropped_invalid_email: usize,
    /// Rows repeating an email already seen.
    pub dropped_duplicates: usize,
}

/// Check an email address against `local@domain.tld` syntax.
///
/// Surrounding whitespace is ignored; embedded whitespace is not.
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex")
    });

    let email = email.trim();
    !email.is_empty() && EMAIL_RE.is_match(email)
}

/// Normalize a website into an absolute URL with a host.
///
/// A missing scheme becomes `https://`. Returns `None` when nothing
/// usable remains.
pub fn sanitize_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let candidate = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let parsed = Url::parse(&candidate).ok()?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Some(candidate),
        _ => None,
    }
}

/// Trim, validate and deduplicate projected lead records.
///
/// Duplicates are detected on the trimmed, lowercased email; the first
/// occurrence is kept.
pub fn sanitize_leads(records: impl IntoIterator<Item = LeadRecord>) -> SanitizedLeads {
    let mut out = SanitizedLeads::default();
    let mut seen: HashSet<String> = HashSet::new();

    for record in records {
        let lead = LeadRecord {
            name: record.name.trim().to_string(),
            website: record.website.trim().to_string(),
            email: record.email.trim().to_string(),
        };

        if lead.email.is_empty() || lead.website.is_empty() {
            out.dropped_missing += 1;
            continue;
        }

        if !is_valid_email(&lead.email) {
            debug!(email = %lead.email, "dropping lead with invalid email");
            out.dropped_invalid_email += 1;
            continue;
        }

        if !seen.insert(lead.email.to_lowercase()) {
            out.dropped_duplicates += 1;
            continue;
        }

        out.leads.push(lead);
    }

    out
}
