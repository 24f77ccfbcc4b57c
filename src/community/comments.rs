//! Threaded comments

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::core::types::{
    validate_document_id, Comment, CommentThread, NewComment, ANONYMOUS_AUTHOR, MAX_AUTHOR_LEN,
    MAX_COMMENT_LEN,
};
use crate::core::{Error, Result};
use crate::storage::CommunityStore;

/// Comment submission as received from a client
#[derive(Debug, Clone, Deserialize)]
pub struct CommentRequest {
    /// Comment being replied to
    pub parent_id: Option<i64>,
    /// Display name; blank means anonymous
    pub author_name: Option<String>,
    /// Comment body
    pub content: String,
}

/// Validates, stores and threads comments
pub struct CommentService<S> {
    store: Arc<S>,
}

impl<S> Clone for CommentService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: CommunityStore> CommentService<S> {
    /// Create a service over the given store
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Validate and store a comment on `document_id`
    pub async fn add_comment(&self, document_id: &str, request: CommentRequest) -> Result<Comment> {
        let document_id = validate_document_id(document_id)?;

        let content = request.content.trim();
        if content.is_empty() {
            return Err(Error::invalid_input("comment must not be empty"));
        }
        if content.chars().count() > MAX_COMMENT_LEN {
            return Err(Error::invalid_input(format!(
                "comment exceeds {} characters",
                MAX_COMMENT_LEN
            )));
        }

        let author_name = request
            .author_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(ANONYMOUS_AUTHOR);
        if author_name.chars().count() > MAX_AUTHOR_LEN {
            return Err(Error::invalid_input(format!(
                "author name exceeds {} characters",
                MAX_AUTHOR_LEN
            )));
        }

        if let Some(parent_id) = request.parent_id {
            match self.store.comment_document(parent_id).await? {
                Some(parent_document) if parent_document == document_id => {}
                Some(_) => {
                    return Err(Error::invalid_input(format!(
                        "comment {} belongs to another document",
                        parent_id
                    )))
                }
                None => return Err(Error::not_found(format!("comment {}", parent_id))),
            }
        }

        let stored = self
            .store
            .insert_comment(NewComment {
                document_id: document_id.to_string(),
                parent_id: request.parent_id,
                author_name: author_name.to_string(),
                content: content.to_string(),
                created_at: Utc::now(),
            })
            .await?;

        info!(document_id, comment_id = stored.id, reply = stored.parent_id.is_some(), "Comment added");
        Ok(stored)
    }

    /// All comments on `document_id` as reply trees
    pub async fn list_threads(&self, document_id: &str) -> Result<Vec<CommentThread>> {
        let document_id = validate_document_id(document_id)?;
        let comments = self.store.list_comments(document_id).await?;
        Ok(build_threads(comments))
    }
}

/// Group flat comment rows into reply trees
///
/// Top-level comments come newest first; replies at every depth come oldest
/// first. A reply whose parent is not among `comments` is promoted to the
/// top level.
pub fn build_threads(comments: Vec<Comment>) -> Vec<CommentThread> {
    let known: HashSet<i64> = comments.iter().map(|c| c.id).collect();

    let mut roots = Vec::new();
    let mut children: HashMap<i64, Vec<Comment>> = HashMap::new();
    for comment in comments {
        match comment.parent_id {
            Some(parent) if parent != comment.id && known.contains(&parent) => {
                children.entry(parent).or_default().push(comment)
            }
            _ => roots.push(comment),
        }
    }

    for replies in children.values_mut() {
        replies.sort_by_key(|c| (c.created_at, c.id));
    }
    roots.sort_by_key(|c| Reverse((c.created_at, c.id)));

    roots
        .into_iter()
        .map(|root| attach_replies(root, &mut children))
        .collect()
}

fn attach_replies(comment: Comment, children: &mut HashMap<i64, Vec<Comment>>) -> CommentThread {
    let replies = children
        .remove(&comment.id)
        .unwrap_or_default()
        .into_iter()
        .map(|reply| attach_replies(reply, children))
        .collect();

    CommentThread { comment, replies }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn comment(id: i64, parent_id: Option<i64>, minute: i64) -> Comment {
        Comment {
            id,
            document_id: "doc".to_string(),
            parent_id,
            author_name: "Anonymous".to_string(),
            content: format!("comment {}", id),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    fn ids(threads: &[CommentThread]) -> Vec<i64> {
        threads.iter().map(|t| t.comment.id).collect()
    }

    #[test]
    fn test_build_threads_orders_roots_newest_first() {
        let threads = build_threads(vec![
            comment(1, None, 0),
            comment(2, None, 10),
            comment(3, None, 5),
        ]);
        assert_eq!(ids(&threads), vec![2, 3, 1]);
    }

    #[test]
    fn test_build_threads_nests_replies_oldest_first() {
        let threads = build_threads(vec![
            comment(1, None, 0),
            comment(4, Some(1), 30),
            comment(2, Some(1), 10),
            comment(3, Some(2), 20),
            comment(5, Some(3), 40),
        ]);

        assert_eq!(threads.len(), 1);
        let root = &threads[0];
        assert_eq!(ids(&root.replies), vec![2, 4]);
        assert_eq!(ids(&root.replies[0].replies), vec![3]);
        assert_eq!(ids(&root.replies[0].replies[0].replies), vec![5]);
        assert_eq!(root.len(), 5);
    }

    #[test]
    fn test_build_threads_promotes_orphans() {
        let threads = build_threads(vec![comment(1, None, 0), comment(2, Some(99), 5)]);
        assert_eq!(ids(&threads), vec![2, 1]);
    }

    #[test]
    fn test_build_threads_empty() {
        assert!(build_threads(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn test_add_comment_defaults_author_and_trims() {
        let service = CommentService::new(Arc::new(MemoryStore::new()));
        let stored = service
            .add_comment(
                "doc",
                CommentRequest {
                    parent_id: None,
                    author_name: Some("   ".to_string()),
                    content: "  Great scan quality.  ".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(stored.author_name, ANONYMOUS_AUTHOR);
        assert_eq!(stored.content, "Great scan quality.");
    }

    #[tokio::test]
    async fn test_add_comment_validates_input() {
        let service = CommentService::new(Arc::new(MemoryStore::new()));
        let empty = CommentRequest {
            parent_id: None,
            author_name: None,
            content: " ".to_string(),
        };
        assert!(matches!(
            service.add_comment("doc", empty).await,
            Err(Error::InvalidInput(_))
        ));

        let long = CommentRequest {
            parent_id: None,
            author_name: None,
            content: "x".repeat(MAX_COMMENT_LEN + 1),
        };
        assert!(matches!(
            service.add_comment("doc", long).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_reply_requires_parent_on_same_document() {
        let service = CommentService::new(Arc::new(MemoryStore::new()));
        let parent = service
            .add_comment(
                "doc",
                CommentRequest {
                    parent_id: None,
                    author_name: None,
                    content: "parent".to_string(),
                },
            )
            .await
            .unwrap();

        let reply = |parent_id| CommentRequest {
            parent_id: Some(parent_id),
            author_name: Some("Ada".to_string()),
            content: "reply".to_string(),
        };

        assert!(matches!(
            service.add_comment("doc", reply(parent.id + 100)).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            service.add_comment("other-doc", reply(parent.id)).await,
            Err(Error::InvalidInput(_))
        ));

        service.add_comment("doc", reply(parent.id)).await.unwrap();
        let threads = service.list_threads("doc").await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].replies.len(), 1);
        assert_eq!(threads[0].replies[0].comment.author_name, "Ada");
    }
}
