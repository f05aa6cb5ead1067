//! Continuity engine: produces episode N+1 conditioned on episode N.
//!
//! One `advance` call is one full generation cycle: direction text from the
//! previous direction, image from the previous artifact, upload, persist,
//! notify. Cycles for the same series are serialized through a per-series
//! lock; cycles for different series run independently.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::AdvanceError;
use crate::id::ComicId;
use crate::notify::Dispatcher;
use crate::prompt;
use crate::provider::{
    ImageGenerator, ObjectStore, ReferenceImage, RenderRequest, TextGenerator, TextRequest,
};
use crate::store::{ComicStore, EpisodeStore, NewEpisode};

/// Result of a successful cycle.
#[derive(Debug, Clone)]
pub struct Advanced {
    pub artifact_url: String,
    /// 1-based ordinal of the new episode within its series.
    pub issue_number: usize,
}

/// Drives one generation cycle per eligible series.
pub struct ContinuityEngine {
    comics: Arc<dyn ComicStore>,
    episodes: Arc<dyn EpisodeStore>,
    text: Arc<dyn TextGenerator>,
    image: Arc<dyn ImageGenerator>,
    objects: Arc<dyn ObjectStore>,
    dispatcher: Dispatcher,
    locks: Mutex<HashMap<ComicId, Arc<Mutex<()>>>>,
}

impl ContinuityEngine {
    pub fn new(
        comics: Arc<dyn ComicStore>,
        episodes: Arc<dyn EpisodeStore>,
        text: Arc<dyn TextGenerator>,
        image: Arc<dyn ImageGenerator>,
        objects: Arc<dyn ObjectStore>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            comics,
            episodes,
            text,
            image,
            objects,
            dispatcher,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Generate, persist, and deliver the next episode for a series.
    ///
    /// Fails with a typed error identifying the failing stage; no episode row
    /// is written if anything before persistence fails. A delivery failure
    /// after persistence is logged and does NOT fail the cycle: re-running it
    /// would duplicate the episode and desynchronize continuity, so the
    /// episode commits before notification.
    pub async fn advance(&self, id: &ComicId) -> Result<Advanced, AdvanceError> {
        let guard = self.series_lock(id).await;
        let _serialized = guard.lock().await;

        let comic = self
            .comics
            .comic_by_id(id)
            .await?
            .ok_or(AdvanceError::NotFound(*id))?;
        let owner = comic
            .owner_email
            .clone()
            .ok_or(AdvanceError::NotEligible(*id))?;

        // Absence is normal for a brand-new series, never afterwards.
        let previous = self.episodes.latest_episode(id).await?;

        let direction = self
            .text
            .generate(TextRequest::new(prompt::direction_instruction(
                &comic.prompt,
                previous.as_ref().map(|episode| episode.direction.as_str()),
            )))
            .await?
            .trim()
            .to_string();

        let instruction = prompt::render_instruction(&comic.prompt, &direction);

        let reference = match &previous {
            Some(episode) => {
                let (bytes, content_type) = self
                    .objects
                    .get(&episode.artifact_url)
                    .await
                    .map_err(|error| AdvanceError::ArtifactFetch {
                        url: episode.artifact_url.clone(),
                        reason: error.to_string(),
                    })?;
                Some(ReferenceImage {
                    bytes,
                    content_type,
                })
            }
            None => None,
        };

        let rendered = self
            .image
            .render(RenderRequest {
                instruction,
                reference,
            })
            .await?;

        // The per-series lock makes count-before-insert the new 1-based
        // issue number. The ordinal also keeps keys unique within a series
        // even when two cycles land in the same clock millisecond.
        let issue_number = self.episodes.episode_count(id).await? + 1;
        let key = format!(
            "comics/{}/{}-{}.{}",
            id,
            issue_number,
            Utc::now().timestamp_millis(),
            extension_for(&rendered.content_type)
        );
        let content_type = rendered.content_type.clone();
        let artifact_url = self.objects.put(&key, rendered.bytes, &content_type).await?;

        let episode = self
            .episodes
            .append_episode(NewEpisode {
                comic_id: *id,
                artifact_url: artifact_url.clone(),
                direction,
            })
            .await?;

        if let Err(error) = self
            .dispatcher
            .send_episode(
                &owner,
                id,
                comic.title.as_deref().unwrap_or(""),
                issue_number,
                &artifact_url,
                episode.produced_at,
            )
            .await
        {
            warn!(comic = %id, issue_number, %error, "episode delivery failed; episode stands");
        }

        info!(comic = %id, issue_number, "episode generated");
        Ok(Advanced {
            artifact_url,
            issue_number,
        })
    }

    async fn series_lock(&self, id: &ComicId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        // A strong count of 1 means no cycle holds the guard; dropping the
        // entry keeps the map bounded by in-flight series, not all series
        // ever advanced.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(*id).or_default())
    }
}

fn extension_for(content_type: &str) -> &'static str {
    if content_type.contains("jpeg") || content_type.contains("jpg") {
        "jpg"
    } else if content_type.contains("webp") {
        "webp"
    } else {
        "png"
    }
}
