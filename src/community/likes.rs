//! Per-user document likes

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::core::types::{validate_document_id, LikeStatus, MAX_USER_IDENTIFIER_LEN};
use crate::core::{Error, Result};
use crate::storage::CommunityStore;

/// Toggles and reports likes
pub struct LikeService<S> {
    store: Arc<S>,
}

impl<S> Clone for LikeService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: CommunityStore> LikeService<S> {
    /// Create a service over the given store
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Remove the user's like if present, otherwise add it
    pub async fn toggle(&self, document_id: &str, user: &str) -> Result<LikeStatus> {
        let document_id = validate_document_id(document_id)?;
        let user = validate_user(user)?;

        // A concurrent toggle can make either step a no-op; the final state
        // is still whatever the store holds afterwards.
        let liked = if self.store.delete_like(document_id, user).await? {
            false
        } else {
            self.store.insert_like(document_id, user, Utc::now()).await?;
            true
        };

        let likes = self.store.like_count(document_id).await?;
        debug!(document_id, liked, likes, "Like toggled");
        Ok(LikeStatus { liked, likes })
    }

    /// Whether the user likes the document, with the total
    pub async fn status(&self, document_id: &str, user: &str) -> Result<LikeStatus> {
        let document_id = validate_document_id(document_id)?;
        let user = validate_user(user)?;

        let liked = self.store.has_like(document_id, user).await?;
        let likes = self.store.like_count(document_id).await?;
        Ok(LikeStatus { liked, likes })
    }
}

fn validate_user(raw: &str) -> Result<&str> {
    let user = raw.trim();
    if user.is_empty() {
        return Err(Error::invalid_input("user identifier must not be empty"));
    }
    if user.chars().count() > MAX_USER_IDENTIFIER_LEN {
        return Err(Error::invalid_input(format!(
            "user identifier exceeds {} characters",
            MAX_USER_IDENTIFIER_LEN
        )));
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_toggle_twice_restores_state() {
        let service = LikeService::new(Arc::new(MemoryStore::new()));

        let before = service.status("doc", "reader-1").await.unwrap();
        assert_eq!(before, LikeStatus { liked: false, likes: 0 });

        let liked = service.toggle("doc", "reader-1").await.unwrap();
        assert_eq!(liked, LikeStatus { liked: true, likes: 1 });

        let unliked = service.toggle("doc", "reader-1").await.unwrap();
        assert_eq!(unliked, before);
    }

    #[tokio::test]
    async fn test_likes_count_per_document() {
        let service = LikeService::new(Arc::new(MemoryStore::new()));
        service.toggle("doc", "a").await.unwrap();
        service.toggle("doc", "b").await.unwrap();
        service.toggle("other", "a").await.unwrap();

        let status = service.status("doc", "c").await.unwrap();
        assert_eq!(status, LikeStatus { liked: false, likes: 2 });
        assert!(service.status("doc", " a ").await.unwrap().liked);
    }

    #[tokio::test]
    async fn test_user_identifier_validation() {
        let service = LikeService::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            service.toggle("doc", "  ").await,
            Err(Error::InvalidInput(_))
        ));
        let long = "u".repeat(MAX_USER_IDENTIFIER_LEN + 1);
        assert!(matches!(
            service.status("doc", &long).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
