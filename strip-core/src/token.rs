//! Stateless unsubscribe capability tokens.
//!
//! A token is a keyed HMAC-SHA256 signature over a comic id. Verification
//! needs only the id, the presented signature, and the shared secret; no
//! store lookup is involved until the actual deletion side effect.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::TokenError;
use crate::id::ComicId;
use crate::store::ComicStore;

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies unsubscribe capability tokens.
#[derive(Clone)]
pub struct UnsubSigner {
    key: Vec<u8>,
}

impl UnsubSigner {
    /// Create a signer from the server-held secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
        }
    }

    /// Issue a signature binding the comic id to the unsubscribe action.
    /// Deterministic for a given id and secret.
    pub fn issue(&self, id: &ComicId) -> String {
        self.issue_for(&id.to_string())
    }

    fn issue_for(&self, id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC accepts keys of any length");
        mac.update(id.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Verify a presented signature. Comparison happens inside the HMAC
    /// implementation in constant time.
    pub fn verify(&self, id: &ComicId, signature: &str) -> bool {
        self.verify_for(&id.to_string(), signature)
    }

    fn verify_for(&self, id: &str, signature: &str) -> bool {
        let Ok(raw) = hex::decode(signature) else {
            return false;
        };
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC accepts keys of any length");
        mac.update(id.as_bytes());
        mac.verify_slice(&raw).is_ok()
    }

    /// Build the unsubscribe link embedded in every episode email.
    pub fn unsubscribe_url(&self, origin: &str, id: &ComicId) -> String {
        let sig = self.issue(id);
        let base = origin.trim_end_matches('/');
        format!("{base}/api/unsub?id={id}&sig={sig}")
    }

    /// Perform the unsubscribe action for a presented `id`/`sig` pair.
    ///
    /// An invalid signature is rejected without touching the store. A valid
    /// signature yields an identical success whether or not the comic existed,
    /// so callers cannot probe for series existence; store failures during
    /// deletion are swallowed for the same reason.
    pub async fn unsubscribe(
        &self,
        store: &dyn ComicStore,
        id: &str,
        signature: &str,
    ) -> Result<(), TokenError> {
        if !self.verify_for(id, signature) {
            return Err(TokenError::Unauthorized);
        }
        if let Ok(comic_id) = id.parse::<ComicId>() {
            if let Err(error) = store.delete_comic(&comic_id).await {
                tracing::warn!(comic = id, %error, "unsubscribe deletion failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NewComic};

    fn signer() -> UnsubSigner {
        UnsubSigner::new("test-secret")
    }

    #[test]
    fn test_issue_is_deterministic() {
        let id = ComicId::new();
        assert_eq!(signer().issue(&id), signer().issue(&id));
    }

    #[test]
    fn test_verify_roundtrip() {
        let id = ComicId::new();
        let sig = signer().issue(&id);
        assert!(signer().verify(&id, &sig));
    }

    #[test]
    fn test_verify_rejects_other_signatures() {
        let id = ComicId::new();
        let other = ComicId::new();
        let sig = signer().issue(&other);
        assert!(!signer().verify(&id, &sig));
        assert!(!signer().verify(&id, "not-hex"));
        assert!(!signer().verify(&id, ""));
    }

    #[test]
    fn test_verify_rejects_different_secret() {
        let id = ComicId::new();
        let sig = UnsubSigner::new("another-secret").issue(&id);
        assert!(!signer().verify(&id, &sig));
    }

    #[test]
    fn test_unsubscribe_url_shape() {
        let id = ComicId::new();
        let url = signer().unsubscribe_url("https://strip.test/", &id);
        assert!(url.starts_with("https://strip.test/api/unsub?id="));
        assert!(url.contains(&id.to_string()));
        assert!(url.contains("&sig="));
    }

    #[tokio::test]
    async fn test_unsubscribe_deletes_with_valid_signature() {
        let store = MemoryStore::new();
        let comic = store
            .insert_comic(NewComic {
                prompt: "a banana detective".to_string(),
                fingerprint: "fp".to_string(),
                origin: "1.2.3.4".to_string(),
                title: None,
            })
            .await
            .unwrap();

        let signer = signer();
        let sig = signer.issue(&comic.id);
        signer
            .unsubscribe(&store, &comic.id.to_string(), &sig)
            .await
            .unwrap();
        assert!(store.comic_by_id(&comic.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_bad_signature_never_deletes() {
        let store = MemoryStore::new();
        let comic = store
            .insert_comic(NewComic {
                prompt: "a banana detective".to_string(),
                fingerprint: "fp".to_string(),
                origin: "1.2.3.4".to_string(),
                title: None,
            })
            .await
            .unwrap();

        let result = signer()
            .unsubscribe(&store, &comic.id.to_string(), "deadbeef")
            .await;
        assert!(matches!(result, Err(TokenError::Unauthorized)));
        assert!(store.comic_by_id(&comic.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_id_is_silent_success() {
        let store = MemoryStore::new();
        let ghost = ComicId::new();
        let sig = signer().issue(&ghost);
        let result = signer()
            .unsubscribe(&store, &ghost.to_string(), &sig)
            .await;
        assert!(result.is_ok());
    }
}
