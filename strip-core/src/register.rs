//! Registration: claims a verified series for an email address.
//!
//! Recomputes the prompt fingerprint to catch tampering, enforces the
//! per-origin creation quota, validates the email, and only then writes the
//! owner. Nothing is written when any check fails.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::warn;

use crate::engine::ContinuityEngine;
use crate::error::RegistrationError;
use crate::id::ComicId;
use crate::prompt;
use crate::store::ComicStore;

/// Policy knobs for registration.
#[derive(Debug, Clone)]
pub struct RegistrarPolicy {
    /// Maximum series one origin may create within the trailing 24 hours.
    pub daily_quota: u32,
    /// Origins exempt from the quota.
    pub trusted_origins: Vec<String>,
    /// Kick off the first episode immediately after registration instead of
    /// waiting for the next scheduled sweep.
    pub kickoff_first_episode: bool,
}

impl Default for RegistrarPolicy {
    fn default() -> Self {
        Self {
            daily_quota: 5,
            trusted_origins: vec!["127.0.0.1".to_string(), "::1".to_string()],
            kickoff_first_episode: true,
        }
    }
}

/// Handles series registration.
pub struct Registrar {
    store: Arc<dyn ComicStore>,
    engine: Option<Arc<ContinuityEngine>>,
    policy: RegistrarPolicy,
}

impl Registrar {
    pub fn new(
        store: Arc<dyn ComicStore>,
        engine: Option<Arc<ContinuityEngine>>,
        policy: RegistrarPolicy,
    ) -> Self {
        Self {
            store,
            engine,
            policy,
        }
    }

    /// Register an owner email for a previously admitted series.
    ///
    /// The prompt travels with the claimed fingerprint so the server can
    /// recompute and compare twice: against the claim, and against the stored
    /// record for the id. Either mismatch signals tampering.
    pub async fn register(
        &self,
        id: &ComicId,
        claimed_fingerprint: &str,
        raw_prompt: &str,
        email: &str,
        origin: &str,
    ) -> Result<(), RegistrationError> {
        let cleaned = prompt::normalize(raw_prompt);
        let computed = prompt::fingerprint(&cleaned);
        if computed != claimed_fingerprint {
            return Err(RegistrationError::HashMismatch);
        }

        let comic = self
            .store
            .comic_by_id(id)
            .await?
            .ok_or(RegistrationError::RecordNotFound)?;
        if comic.fingerprint != computed {
            return Err(RegistrationError::StoredHashMismatch);
        }

        if !self.is_trusted(origin) {
            let cutoff = Utc::now() - Duration::hours(24);
            let created = self
                .store
                .count_created_by_origin_since(origin, cutoff)
                .await?;
            if created as u32 >= self.policy.daily_quota {
                return Err(RegistrationError::RateLimited {
                    limit: self.policy.daily_quota,
                });
            }
        }

        validate_email(email).map_err(|reason| RegistrationError::InvalidEmail { reason })?;

        self.store.set_owner_email(id, email).await?;

        // Fire-and-forget first cycle: its failure is observed in the log
        // but never surfaces to the registration caller.
        if self.policy.kickoff_first_episode {
            if let Some(engine) = &self.engine {
                let engine = Arc::clone(engine);
                let comic_id = *id;
                tokio::spawn(async move {
                    if let Err(error) = engine.advance(&comic_id).await {
                        warn!(comic = %comic_id, %error, "post-registration kickoff failed");
                    }
                });
            }
        }

        Ok(())
    }

    fn is_trusted(&self, origin: &str) -> bool {
        self.policy
            .trusted_origins
            .iter()
            .any(|trusted| trusted == origin)
    }
}

/// Minimal email format validation: one `@`, non-empty local part, and a
/// dotted domain without whitespace.
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.len() > 254 {
        return Err("Email is too long".to_string());
    }
    if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("Email must not contain whitespace".to_string());
    }
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let Some(domain) = parts.next() else {
        return Err("Email must contain '@'".to_string());
    };
    if local.is_empty() {
        return Err("Email is missing the part before '@'".to_string());
    }
    if domain.contains('@') {
        return Err("Email must contain exactly one '@'".to_string());
    }
    if domain.is_empty()
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err("Email domain is invalid".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NewComic};

    async fn seeded_store(prompt_text: &str, origin: &str) -> (Arc<MemoryStore>, ComicId, String) {
        let store = Arc::new(MemoryStore::new());
        let cleaned = prompt::normalize(prompt_text);
        let fingerprint = prompt::fingerprint(&cleaned);
        let comic = store
            .insert_comic(NewComic {
                prompt: cleaned,
                fingerprint: fingerprint.clone(),
                origin: origin.to_string(),
                title: Some("Test".to_string()),
            })
            .await
            .unwrap();
        (store, comic.id, fingerprint)
    }

    fn registrar(store: Arc<MemoryStore>) -> Registrar {
        let policy = RegistrarPolicy {
            kickoff_first_episode: false,
            ..RegistrarPolicy::default()
        };
        Registrar::new(store, None, policy)
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("reader@example.com").is_ok());
        assert!(validate_email("a.b+c@sub.example.org").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("reader@").is_err());
        assert!(validate_email("reader@nodot").is_err());
        assert!(validate_email("reader@.example.com").is_err());
        assert!(validate_email("rea der@example.com").is_err());
        assert!(validate_email("two@@example.com").is_err());
    }

    #[tokio::test]
    async fn test_register_success_sets_owner() {
        let (store, id, fingerprint) = seeded_store("a banana detective", "1.2.3.4").await;
        registrar(store.clone())
            .register(&id, &fingerprint, "a banana detective", "reader@example.com", "1.2.3.4")
            .await
            .unwrap();

        let comic = store.comic_by_id(&id).await.unwrap().unwrap();
        assert_eq!(comic.owner_email.as_deref(), Some("reader@example.com"));
    }

    #[tokio::test]
    async fn test_register_hash_mismatch() {
        let (store, id, _) = seeded_store("a banana detective", "1.2.3.4").await;
        let result = registrar(store)
            .register(&id, "bogus", "a banana detective", "reader@example.com", "1.2.3.4")
            .await;
        assert!(matches!(result, Err(RegistrationError::HashMismatch)));
    }

    #[tokio::test]
    async fn test_register_tampered_prompt_fails_even_with_valid_id() {
        let (store, id, _) = seeded_store("a banana detective", "1.2.3.4").await;
        // Claimed fingerprint matches the tampered prompt, but not the record.
        let tampered = "a different story";
        let claimed = prompt::fingerprint(tampered);
        let result = registrar(store)
            .register(&id, &claimed, tampered, "reader@example.com", "1.2.3.4")
            .await;
        assert!(matches!(result, Err(RegistrationError::StoredHashMismatch)));
    }

    #[tokio::test]
    async fn test_register_record_not_found() {
        let store = Arc::new(MemoryStore::new());
        let fingerprint = prompt::fingerprint("a banana detective");
        let result = registrar(store)
            .register(
                &ComicId::new(),
                &fingerprint,
                "a banana detective",
                "reader@example.com",
                "1.2.3.4",
            )
            .await;
        assert!(matches!(result, Err(RegistrationError::RecordNotFound)));
    }

    #[tokio::test]
    async fn test_register_invalid_email_leaves_record_unclaimed() {
        let (store, id, fingerprint) = seeded_store("a banana detective", "1.2.3.4").await;
        let result = registrar(store.clone())
            .register(&id, &fingerprint, "a banana detective", "not-an-email", "1.2.3.4")
            .await;
        assert!(matches!(result, Err(RegistrationError::InvalidEmail { .. })));

        let comic = store.comic_by_id(&id).await.unwrap().unwrap();
        assert!(comic.owner_email.is_none());
    }

    #[tokio::test]
    async fn test_register_rate_limited_at_quota() {
        let (store, id, fingerprint) = seeded_store("prompt zero", "9.9.9.9").await;
        for n in 1..5 {
            let text = format!("prompt number {n}");
            store
                .insert_comic(NewComic {
                    prompt: text.clone(),
                    fingerprint: prompt::fingerprint(&text),
                    origin: "9.9.9.9".to_string(),
                    title: None,
                })
                .await
                .unwrap();
        }

        let result = registrar(store)
            .register(&id, &fingerprint, "prompt zero", "reader@example.com", "9.9.9.9")
            .await;
        assert!(matches!(
            result,
            Err(RegistrationError::RateLimited { limit: 5 })
        ));
    }

    #[tokio::test]
    async fn test_register_old_series_do_not_count_toward_quota() {
        let (store, id, fingerprint) = seeded_store("prompt zero", "9.9.9.9").await;
        let mut extra = Vec::new();
        for n in 1..5 {
            let text = format!("prompt number {n}");
            let comic = store
                .insert_comic(NewComic {
                    prompt: text.clone(),
                    fingerprint: prompt::fingerprint(&text),
                    origin: "9.9.9.9".to_string(),
                    title: None,
                })
                .await
                .unwrap();
            extra.push(comic.id);
        }
        // One of the five slides outside the window; the register fits again.
        store
            .backdate_comic(&extra[0], Utc::now() - Duration::hours(25))
            .await;

        registrar(store)
            .register(&id, &fingerprint, "prompt zero", "reader@example.com", "9.9.9.9")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_register_trusted_origin_bypasses_quota() {
        let (store, id, fingerprint) = seeded_store("prompt zero", "127.0.0.1").await;
        for n in 1..=6 {
            let text = format!("prompt number {n}");
            store
                .insert_comic(NewComic {
                    prompt: text.clone(),
                    fingerprint: prompt::fingerprint(&text),
                    origin: "127.0.0.1".to_string(),
                    title: None,
                })
                .await
                .unwrap();
        }

        registrar(store)
            .register(&id, &fingerprint, "prompt zero", "reader@example.com", "127.0.0.1")
            .await
            .unwrap();
    }
}
