//! Episode notification formatting and dispatch.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::DeliveryError;
use crate::id::ComicId;
use crate::provider::{Mailer, OutgoingEmail};
use crate::token::UnsubSigner;

/// Formats the daily episode email and hands it to the delivery service.
pub struct Dispatcher {
    mailer: Arc<dyn Mailer>,
    signer: UnsubSigner,
    app_origin: String,
}

impl Dispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, signer: UnsubSigner, app_origin: impl Into<String>) -> Self {
        Self {
            mailer,
            signer,
            app_origin: app_origin.into(),
        }
    }

    /// Send one episode to the series owner. Every message carries a fresh
    /// unsubscribe capability link. Delivery failures surface to the caller;
    /// the engine decides what happens to the already-persisted episode.
    pub async fn send_episode(
        &self,
        to: &str,
        comic_id: &ComicId,
        title: &str,
        issue_number: usize,
        artifact_url: &str,
        date: DateTime<Utc>,
    ) -> Result<String, DeliveryError> {
        let unsub_url = self.signer.unsubscribe_url(&self.app_origin, comic_id);
        let subject = subject_line(title, issue_number);
        let html = render_body(title, issue_number, artifact_url, &unsub_url, date);
        self.mailer
            .send(OutgoingEmail {
                to: to.to_string(),
                subject,
                html,
            })
            .await
    }
}

fn subject_line(title: &str, issue_number: usize) -> String {
    let mut parts = vec!["Daily Comic".to_string()];
    if issue_number > 0 {
        parts.push(format!("#{issue_number}"));
    }
    if !title.is_empty() {
        parts.push(format!("- {title}"));
    }
    parts.join(" ")
}

fn format_date(date: DateTime<Utc>) -> String {
    date.format("%B %-d, %Y").to_string()
}

fn render_body(
    title: &str,
    issue_number: usize,
    artifact_url: &str,
    unsub_url: &str,
    date: DateTime<Utc>,
) -> String {
    let heading = if title.is_empty() {
        "Daily Comic Strip"
    } else {
        title
    };
    let date_label = format_date(date);
    format!(
        r#"<html>
  <body style="background-color:#ffffff;margin:0;padding:24px;font-family:sans-serif;">
    <div style="margin:0 auto;max-width:1000px;">
      <div style="padding:20px 24px;">
        <h1 style="margin:0;color:#111827;font-size:24px;">{heading}</h1>
        <p style="margin:6px 0 0;color:#374151;font-style:italic;font-size:14px;">Issue #{issue_number} &middot; {date_label}</p>
      </div>
      <img src="{artifact_url}" alt="{heading}, issue {issue_number}" style="display:block;width:100%;max-width:1000px;" />
      <div style="padding:20px 24px;">
        <a href="{unsub_url}" style="color:#6b7280;font-size:12px;text-decoration:underline;">Unsubscribe from this comic</a>
      </div>
    </div>
  </body>
</html>"#
    )
}
