//! Admission gate: content-policy judgment, fingerprint deduplication, and
//! best-effort title backfill for incoming story prompts.

use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use crate::error::{AdmissionError, ProviderError, ProviderResult};
use crate::id::ComicId;
use crate::prompt;
use crate::provider::{TextGenerator, TextRequest};
use crate::store::{ComicStore, NewComic};

/// Outcome of admitting a prompt.
#[derive(Debug, Clone)]
pub struct Admission {
    pub accepted: bool,
    /// Rejection reason, present when not accepted.
    pub reason: Option<String>,
    /// The canonical series for this prompt, present when accepted.
    pub comic_id: Option<ComicId>,
    /// Fingerprint of the normalized prompt, always computed.
    pub fingerprint: String,
}

/// Structured verdict returned by the policy model.
#[derive(Debug, Deserialize)]
struct Judgment {
    is_valid: bool,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedTitle {
    title: String,
}

/// Validates and deduplicates incoming prompts.
pub struct AdmissionGate {
    store: Arc<dyn ComicStore>,
    text: Arc<dyn TextGenerator>,
}

impl AdmissionGate {
    pub fn new(store: Arc<dyn ComicStore>, text: Arc<dyn TextGenerator>) -> Self {
        Self { store, text }
    }

    /// Admit a raw prompt from the given origin.
    ///
    /// The same normalized prompt always resolves to the same series, no
    /// matter which origin submits it: the fingerprint is global so a story
    /// premise has one canonical series. If the policy check itself cannot
    /// run, the gate fails closed rather than silently accepting.
    pub async fn admit(
        &self,
        raw_prompt: &str,
        origin: &str,
    ) -> Result<Admission, AdmissionError> {
        let cleaned = prompt::normalize(raw_prompt);
        let fingerprint = prompt::fingerprint(&cleaned);

        let judgment = self.judge(&cleaned).await.map_err(|error| {
            AdmissionError::PolicyCheckUnavailable {
                reason: error.to_string(),
            }
        })?;

        if !judgment.is_valid {
            return Ok(Admission {
                accepted: false,
                reason: Some(
                    judgment
                        .reason
                        .unwrap_or_else(|| "Prompt cannot be illustrated daily".to_string()),
                ),
                comic_id: None,
                fingerprint,
            });
        }

        let comic_id = match self.store.comic_by_fingerprint(&fingerprint).await? {
            Some(existing) => {
                if existing.title.is_none() {
                    // Cosmetic backfill; never aborts admission.
                    let title = self.generate_title(&cleaned).await;
                    if let Err(error) = self.store.set_title(&existing.id, &title).await {
                        warn!(comic = %existing.id, %error, "title backfill failed");
                    }
                }
                existing.id
            }
            None => {
                let title = self.generate_title(&cleaned).await;
                match self
                    .store
                    .insert_comic(NewComic {
                        prompt: cleaned,
                        fingerprint: fingerprint.clone(),
                        origin: origin.to_string(),
                        title: Some(title),
                    })
                    .await
                {
                    Ok(comic) => comic.id,
                    // Lost an insert race on the fingerprint; reuse the winner.
                    Err(crate::error::StoreError::DuplicateFingerprint { .. }) => self
                        .store
                        .comic_by_fingerprint(&fingerprint)
                        .await?
                        .map(|comic| comic.id)
                        .ok_or(crate::error::StoreError::Unavailable {
                            reason: "comic vanished after duplicate fingerprint".to_string(),
                        })?,
                    Err(error) => return Err(error.into()),
                }
            }
        };

        Ok(Admission {
            accepted: true,
            reason: None,
            comic_id: Some(comic_id),
            fingerprint,
        })
    }

    /// Idempotent title backfill. Safe to retry and safe to race with itself;
    /// the title is cosmetic so last writer wins. A missing comic is a no-op.
    pub async fn ensure_title(&self, id: &ComicId) -> Result<(), AdmissionError> {
        let Some(comic) = self.store.comic_by_id(id).await? else {
            return Ok(());
        };
        if comic.title.is_some() {
            return Ok(());
        }
        let title = self.generate_title(&comic.prompt).await;
        self.store.set_title(id, &title).await?;
        Ok(())
    }

    async fn judge(&self, cleaned: &str) -> ProviderResult<Judgment> {
        let request = TextRequest::new(prompt::judge_instruction(cleaned))
            .with_system(prompt::JUDGE_SYSTEM)
            .expect_json();
        let raw = self.text.generate(request).await?;
        parse_json(&raw)
    }

    /// Model-generated title with heuristic fallback when the model is
    /// unavailable or returns something unparseable.
    async fn generate_title(&self, cleaned: &str) -> String {
        let request = TextRequest::new(prompt::title_instruction(cleaned))
            .with_system(prompt::TITLE_SYSTEM)
            .expect_json();
        match self.text.generate(request).await {
            Ok(raw) => match parse_json::<GeneratedTitle>(&raw) {
                Ok(generated) if !generated.title.trim().is_empty() => {
                    generated.title.trim().to_string()
                }
                _ => prompt::derive_title(cleaned),
            },
            Err(error) => {
                warn!(%error, "title generation failed, using heuristic");
                prompt::derive_title(cleaned)
            }
        }
    }
}

/// Parse a JSON payload from model output, tolerating markdown code fences.
fn parse_json<T: for<'de> Deserialize<'de>>(raw: &str) -> ProviderResult<T> {
    let trimmed = strip_code_fences(raw);
    serde_json::from_str(trimmed)
        .map_err(|e| ProviderError::Parse(format!("invalid JSON from model: {e}")))
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches(['\r', '\n'])
        .trim_end_matches('`')
        .trim()
}
