//! Outreach message composition.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::{Address, Message};
use tracing::debug;

use pagepitch_shared::{LeadRecord, PerformanceReport};

use crate::DispatchFailure;

/// Subject line for a lead's website.
pub fn subject_for(website: &str) -> String {
    format!("A quick thought on the {website} website")
}

/// HTML body greeting the lead and citing the report.
pub fn html_body(name: &str, report: &PerformanceReport) -> String {
    format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; line-height: 1.6;">
    <p>Dear {name},</p>
    <p>Google's PageSpeed Insights scores <strong>{score}/100</strong> on mobile performance for {url}.</p>
    <ul>
      <li>First Contentful Paint: {fcp}</li>
      <li>Speed Index: {si}</li>
      <li>Time to Interactive: {tti}</li>
    </ul>
    <p>The full report is attached.</p>
  </body>
</html>
"#,
        name = escape_html(name),
        score = report.score,
        url = escape_html(&report.tested_url),
        fcp = escape_html(&report.first_contentful_paint),
        si = escape_html(&report.speed_index),
        tti = escape_html(&report.time_to_interactive),
    )
}

/// Build the message for one lead. The sender is blind-copied.
///
/// Attachment paths that do not exist are skipped.
pub async fn compose(
    sender: &Mailbox,
    lead: &LeadRecord,
    report: &PerformanceReport,
    attachments: &[PathBuf],
) -> Result<Message, DispatchFailure> {
    let address: Address = lead
        .email
        .parse()
        .map_err(|e| DispatchFailure::Address(format!("{}: {e}", lead.email)))?;
    let display_name = (!lead.name.is_empty()).then(|| lead.name.clone());
    let recipient = Mailbox::new(display_name, address);

    let body = MultiPart::alternative().singlepart(SinglePart::html(html_body(&lead.name, report)));

    let mut files = Vec::new();
    for path in attachments {
        if let Some(part) = pdf_attachment(path).await? {
            files.push(part);
        }
    }

    let builder = Message::builder()
        .from(sender.clone())
        .to(recipient)
        .bcc(sender.clone())
        .subject(subject_for(&lead.website));

    let message = if files.is_empty() {
        builder.multipart(body)
    } else {
        let mixed = files
            .into_iter()
            .fold(MultiPart::mixed().multipart(body), |mixed, part| mixed.singlepart(part));
        builder.multipart(mixed)
    };

    message.map_err(|e| DispatchFailure::Compose(e.to_string()))
}

async fn pdf_attachment(path: &Path) -> Result<Option<SinglePart>, DispatchFailure> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "attachment missing, skipping");
            return Ok(None);
        }
        Err(e) => {
            return Err(DispatchFailure::Attachment(format!("{}: {e}", path.display())));
        }
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.pdf".into());
    let content_type = ContentType::parse("application/pdf")
        .map_err(|e| DispatchFailure::Compose(e.to_string()))?;

    Ok(Some(Attachment::new(filename).body(bytes, content_type)))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pp-mailer-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sender() -> Mailbox {
        "PagePitch <me@pagepitch.dev>".parse().unwrap()
    }

    fn lead() -> LeadRecord {
        LeadRecord {
            name: "Jo Smith".into(),
            website: "acme.com".into(),
            email: "jo@acme.com".into(),
        }
    }

    fn report() -> PerformanceReport {
        PerformanceReport {
            score: 87,
            first_contentful_paint: "1.8 s".into(),
            speed_index: "3.9 s".into(),
            time_to_interactive: "5.2 s".into(),
            tested_url: "https://acme.com".into(),
        }
    }

    fn formatted(message: &Message) -> String {
        String::from_utf8_lossy(&message.formatted()).into_owned()
    }

    #[test]
    fn body_cites_score_and_metrics() {
        let body = html_body("Jo Smith", &report());
        assert!(body.contains("Dear Jo Smith,"));
        assert!(body.contains("<strong>87/100</strong>"));
        assert!(body.contains("First Contentful Paint: 1.8 s"));
        assert!(body.contains("Speed Index: 3.9 s"));
        assert!(body.contains("Time to Interactive: 5.2 s"));
    }

    #[test]
    fn body_escapes_lead_name() {
        let body = html_body("<b>Jo & Co</b>", &report());
        assert!(body.contains("Dear &lt;b&gt;Jo &amp; Co&lt;/b&gt;,"));
    }

    #[tokio::test]
    async fn message_has_subject_recipient_and_blind_copy() {
        let message = compose(&sender(), &lead(), &report(), &[]).await.unwrap();

        let text = formatted(&message);
        assert!(text.contains("Subject: A quick thought on the acme.com website"));
        assert!(text.contains("multipart/alternative"));
        assert!(text.contains("jo@acme.com"));

        let envelope = message.envelope();
        let me: Address = "me@pagepitch.dev".parse().unwrap();
        let jo: Address = "jo@acme.com".parse().unwrap();
        assert!(envelope.to().contains(&jo));
        assert!(envelope.to().contains(&me), "sender should be blind-copied");
        assert_eq!(envelope.from(), Some(&me));
    }

    #[tokio::test]
    async fn existing_pdf_is_attached_by_basename() {
        let tmp = temp_dir();
        let pdf = tmp.join("Jo_Smith_pagespeed_report.pdf");
        std::fs::write(&pdf, b"%PDF-1.4 fake").unwrap();

        let message = compose(&sender(), &lead(), &report(), &[pdf]).await.unwrap();
        let text = formatted(&message);
        assert!(text.contains("multipart/mixed"));
        assert!(text.contains("application/pdf"));
        assert!(text.contains("Jo_Smith_pagespeed_report.pdf"));
        assert!(!text.contains(tmp.to_string_lossy().as_ref()));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn missing_attachment_is_skipped() {
        let tmp = temp_dir();
        let missing = tmp.join("gone.pdf");

        let message = compose(&sender(), &lead(), &report(), &[missing]).await.unwrap();
        let text = formatted(&message);
        assert!(!text.contains("application/pdf"));
        assert!(!text.contains("multipart/mixed"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn invalid_recipient_is_an_address_failure() {
        let mut bad = lead();
        bad.email = "not an address".into();

        let result = compose(&sender(), &bad, &report(), &[]).await;
        assert!(matches!(result, Err(DispatchFailure::Address(_))));
    }
}
