//! Persistent records and store traits for comics and episodes.
//!
//! A `Comic` is one ongoing series keyed by a unique content fingerprint of
//! its premise. An `Episode` is one generated installment, append-only and
//! ordered by `produced_at` within its series. The traits are the seam for
//! real database backends; `MemoryStore` is the in-process reference
//! implementation used by the engine tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::id::{ComicId, EpisodeId};

/// One ongoing comic series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comic {
    pub id: ComicId,
    /// Normalized story premise. Relied upon to be immutable once the series
    /// has episodes.
    pub prompt: String,
    /// Deterministic content hash of the normalized prompt; unique.
    pub fingerprint: String,
    /// Short human label, backfilled asynchronously.
    pub title: Option<String>,
    /// Absent means verified but unclaimed; presence makes the series
    /// eligible for the daily sweep.
    pub owner_email: Option<String>,
    /// Creating network origin. Used only for rate limiting, never exposed.
    pub origin: String,
    pub created_at: DateTime<Utc>,
}

/// One generated installment of a series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub comic_id: ComicId,
    /// Public URL of the rendered image in the object store.
    pub artifact_url: String,
    /// The panel direction used to produce this episode; carried forward as
    /// continuity context for the next cycle.
    pub direction: String,
    pub produced_at: DateTime<Utc>,
}

/// Fields required to create a comic.
#[derive(Debug, Clone)]
pub struct NewComic {
    pub prompt: String,
    pub fingerprint: String,
    pub origin: String,
    pub title: Option<String>,
}

/// Fields required to append an episode.
#[derive(Debug, Clone)]
pub struct NewEpisode {
    pub comic_id: ComicId,
    pub artifact_url: String,
    pub direction: String,
}

/// Persistent record of comic series.
#[async_trait]
pub trait ComicStore: Send + Sync {
    /// Insert a new comic. Fails with `DuplicateFingerprint` if a series with
    /// the same fingerprint already exists.
    async fn insert_comic(&self, new: NewComic) -> StoreResult<Comic>;

    /// Look up a comic by id.
    async fn comic_by_id(&self, id: &ComicId) -> StoreResult<Option<Comic>>;

    /// Look up a comic by content fingerprint.
    async fn comic_by_fingerprint(&self, fingerprint: &str) -> StoreResult<Option<Comic>>;

    /// Set the title. Last writer wins; the field is cosmetic.
    async fn set_title(&self, id: &ComicId, title: &str) -> StoreResult<()>;

    /// Set the owner email, making the series eligible for the sweep.
    async fn set_owner_email(&self, id: &ComicId, email: &str) -> StoreResult<()>;

    /// Delete a comic and cascade-delete its episodes. Returns whether a
    /// record existed.
    async fn delete_comic(&self, id: &ComicId) -> StoreResult<bool>;

    /// All comics with an owner email, i.e. the sweep population.
    async fn eligible_comics(&self) -> StoreResult<Vec<Comic>>;

    /// Count comics created by the given origin at or after the cutoff.
    async fn count_created_by_origin_since(
        &self,
        origin: &str,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<usize>;
}

/// Append-only, series-scoped episode history.
#[async_trait]
pub trait EpisodeStore: Send + Sync {
    /// Append a new episode stamped with the current time.
    async fn append_episode(&self, new: NewEpisode) -> StoreResult<Episode>;

    /// Most recent episode for a series by `produced_at`, if any.
    async fn latest_episode(&self, comic_id: &ComicId) -> StoreResult<Option<Episode>>;

    /// Total episodes for a series. The post-insert count is the 1-based
    /// issue number of the newest episode.
    async fn episode_count(&self, comic_id: &ComicId) -> StoreResult<usize>;
}

#[derive(Default)]
struct MemoryInner {
    comics: HashMap<ComicId, Comic>,
    episodes: Vec<Episode>,
}

/// In-process store backing both traits with a `tokio::sync::RwLock`.
/// Supports concurrent reads and appends across series.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite a comic's creation time. Test support for exercising the
    /// trailing rate-limit window.
    pub async fn backdate_comic(&self, id: &ComicId, created_at: DateTime<Utc>) {
        let mut inner = self.inner.write().await;
        if let Some(comic) = inner.comics.get_mut(id) {
            comic.created_at = created_at;
        }
    }
}

#[async_trait]
impl ComicStore for MemoryStore {
    async fn insert_comic(&self, new: NewComic) -> StoreResult<Comic> {
        let mut inner = self.inner.write().await;
        if inner
            .comics
            .values()
            .any(|comic| comic.fingerprint == new.fingerprint)
        {
            return Err(StoreError::DuplicateFingerprint {
                fingerprint: new.fingerprint,
            });
        }
        let comic = Comic {
            id: ComicId::new(),
            prompt: new.prompt,
            fingerprint: new.fingerprint,
            title: new.title,
            owner_email: None,
            origin: new.origin,
            created_at: Utc::now(),
        };
        inner.comics.insert(comic.id, comic.clone());
        Ok(comic)
    }

    async fn comic_by_id(&self, id: &ComicId) -> StoreResult<Option<Comic>> {
        Ok(self.inner.read().await.comics.get(id).cloned())
    }

    async fn comic_by_fingerprint(&self, fingerprint: &str) -> StoreResult<Option<Comic>> {
        Ok(self
            .inner
            .read()
            .await
            .comics
            .values()
            .find(|comic| comic.fingerprint == fingerprint)
            .cloned())
    }

    async fn set_title(&self, id: &ComicId, title: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        match inner.comics.get_mut(id) {
            Some(comic) => {
                comic.title = Some(title.to_string());
                Ok(())
            }
            None => Err(StoreError::Unavailable {
                reason: format!("no comic {id}"),
            }),
        }
    }

    async fn set_owner_email(&self, id: &ComicId, email: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        match inner.comics.get_mut(id) {
            Some(comic) => {
                comic.owner_email = Some(email.to_string());
                Ok(())
            }
            None => Err(StoreError::Unavailable {
                reason: format!("no comic {id}"),
            }),
        }
    }

    async fn delete_comic(&self, id: &ComicId) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let existed = inner.comics.remove(id).is_some();
        inner.episodes.retain(|episode| episode.comic_id != *id);
        Ok(existed)
    }

    async fn eligible_comics(&self) -> StoreResult<Vec<Comic>> {
        let mut eligible: Vec<Comic> = self
            .inner
            .read()
            .await
            .comics
            .values()
            .filter(|comic| comic.owner_email.is_some())
            .cloned()
            .collect();
        eligible.sort_by_key(|comic| comic.created_at);
        Ok(eligible)
    }

    async fn count_created_by_origin_since(
        &self,
        origin: &str,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<usize> {
        Ok(self
            .inner
            .read()
            .await
            .comics
            .values()
            .filter(|comic| comic.origin == origin && comic.created_at >= cutoff)
            .count())
    }
}

#[async_trait]
impl EpisodeStore for MemoryStore {
    async fn append_episode(&self, new: NewEpisode) -> StoreResult<Episode> {
        let mut inner = self.inner.write().await;
        let episode = Episode {
            id: EpisodeId::new(),
            comic_id: new.comic_id,
            artifact_url: new.artifact_url,
            direction: new.direction,
            produced_at: Utc::now(),
        };
        inner.episodes.push(episode.clone());
        Ok(episode)
    }

    async fn latest_episode(&self, comic_id: &ComicId) -> StoreResult<Option<Episode>> {
        // Insertion order breaks ties within one timestamp tick.
        Ok(self
            .inner
            .read()
            .await
            .episodes
            .iter()
            .enumerate()
            .filter(|(_, episode)| episode.comic_id == *comic_id)
            .max_by_key(|(index, episode)| (episode.produced_at, *index))
            .map(|(_, episode)| episode.clone()))
    }

    async fn episode_count(&self, comic_id: &ComicId) -> StoreResult<usize> {
        Ok(self
            .inner
            .read()
            .await
            .episodes
            .iter()
            .filter(|episode| episode.comic_id == *comic_id)
            .count())
    }
}
