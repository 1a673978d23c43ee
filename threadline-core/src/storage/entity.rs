//! Entities - Posts, Comments, Closure Edges
//!
//! TigerStyle: Explicit types, validation, builder-style constructors.
//!
//! Creation inputs (`NewPost`, `NewComment`) have no id or timestamp
//! fields: both are minted by the storage backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{StorageError, StorageResult};
use crate::constants::{COMMENT_CONTENT_BYTES_MAX, POST_CONTENT_BYTES_MAX, POST_TITLE_BYTES_MAX};

// =============================================================================
// Post
// =============================================================================

/// A discussion post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier, minted at creation
    pub id: Uuid,
    /// Headline
    pub title: String,
    /// Body
    pub content: String,
    /// Author
    pub user_id: Uuid,
    /// Whether new comments may be attached
    pub allow_comments: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Check the mutable fields against their limits.
    pub fn validate(&self) -> StorageResult<()> {
        validate_post_fields(&self.title, &self.content)
    }
}

/// Input for `Storage::create_post`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    /// Headline
    pub title: String,
    /// Body
    pub content: String,
    /// Author
    pub user_id: Uuid,
    /// Whether new comments may be attached
    pub allow_comments: bool,
}

impl NewPost {
    /// New post that accepts comments.
    pub fn new(title: impl Into<String>, content: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            user_id,
            allow_comments: true,
        }
    }

    /// Set whether comments are allowed.
    #[must_use]
    pub fn with_comments_allowed(mut self, allow: bool) -> Self {
        self.allow_comments = allow;
        self
    }

    /// Check field limits.
    pub fn validate(&self) -> StorageResult<()> {
        validate_post_fields(&self.title, &self.content)
    }

    /// Materialize into a stored post.
    #[must_use]
    pub fn into_post(self, id: Uuid, created_at: DateTime<Utc>) -> Post {
        Post {
            id,
            title: self.title,
            content: self.content,
            user_id: self.user_id,
            allow_comments: self.allow_comments,
            created_at,
        }
    }
}

fn validate_post_fields(title: &str, content: &str) -> StorageResult<()> {
    if title.is_empty() {
        return Err(StorageError::invalid("post title must not be empty"));
    }
    if title.len() > POST_TITLE_BYTES_MAX {
        return Err(StorageError::invalid(format!(
            "post title {} bytes exceeds max {}",
            title.len(),
            POST_TITLE_BYTES_MAX
        )));
    }
    if content.len() > POST_CONTENT_BYTES_MAX {
        return Err(StorageError::invalid(format!(
            "post content {} bytes exceeds max {}",
            content.len(),
            POST_CONTENT_BYTES_MAX
        )));
    }
    Ok(())
}

// =============================================================================
// Comment
// =============================================================================

/// A comment on a post, optionally replying to another comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Unique identifier, minted at creation
    pub id: Uuid,
    /// Owning post
    pub post_id: Uuid,
    /// Parent comment; `None` for a top-level comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    /// Body
    pub content: String,
    /// Author
    pub user_id: Uuid,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// True when attached directly to the post.
    #[must_use]
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Input for `Storage::create_comment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    /// Owning post
    pub post_id: Uuid,
    /// Parent comment, if this is a reply
    pub parent_id: Option<Uuid>,
    /// Body
    pub content: String,
    /// Author
    pub user_id: Uuid,
}

impl NewComment {
    /// Top-level comment on `post_id`.
    pub fn root(post_id: Uuid, content: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            post_id,
            parent_id: None,
            content: content.into(),
            user_id,
        }
    }

    /// Reply to `parent_id` on `post_id`.
    pub fn reply(
        post_id: Uuid,
        parent_id: Uuid,
        content: impl Into<String>,
        user_id: Uuid,
    ) -> Self {
        Self {
            post_id,
            parent_id: Some(parent_id),
            content: content.into(),
            user_id,
        }
    }

    /// Check field limits.
    pub fn validate(&self) -> StorageResult<()> {
        if self.content.is_empty() {
            return Err(StorageError::invalid("comment content must not be empty"));
        }
        if self.content.len() > COMMENT_CONTENT_BYTES_MAX {
            return Err(StorageError::invalid(format!(
                "comment content {} bytes exceeds max {}",
                self.content.len(),
                COMMENT_CONTENT_BYTES_MAX
            )));
        }
        Ok(())
    }

    /// Materialize into a stored comment.
    #[must_use]
    pub fn into_comment(self, id: Uuid, created_at: DateTime<Utc>) -> Comment {
        Comment {
            id,
            post_id: self.post_id,
            parent_id: self.parent_id,
            content: self.content,
            user_id: self.user_id,
            created_at,
        }
    }
}

// =============================================================================
// ClosureEdge
// =============================================================================

/// One (ancestor, descendant) pair of the comment closure index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClosureEdge {
    /// Ancestor comment (the descendant itself for a self-edge)
    pub ancestor_id: Uuid,
    /// Descendant comment
    pub descendant_id: Uuid,
    /// Direct parent of the descendant (itself for a self-edge)
    pub nearest_ancestor_id: Uuid,
    /// Distance from ancestor to descendant; 0 for the self-edge
    pub level: i32,
    /// Post the comments belong to
    pub subject_id: Uuid,
}

impl ClosureEdge {
    /// The level-0 edge every comment gets at creation.
    #[must_use]
    pub fn self_edge(comment_id: Uuid, post_id: Uuid) -> Self {
        Self {
            ancestor_id: comment_id,
            descendant_id: comment_id,
            nearest_ancestor_id: comment_id,
            level: 0,
            subject_id: post_id,
        }
    }

    /// True for the level-0 edge.
    #[must_use]
    pub fn is_self_edge(&self) -> bool {
        self.ancestor_id == self.descendant_id
    }

    /// Re-emit an ancestor edge of `parent` one level further down, ending at
    /// `child`.
    #[must_use]
    pub fn extend_to(&self, child: Uuid) -> Self {
        Self {
            ancestor_id: self.ancestor_id,
            descendant_id: child,
            nearest_ancestor_id: self.descendant_id,
            level: self.level + 1,
            subject_id: self.subject_id,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_post_defaults_to_comments_allowed() {
        let post = NewPost::new("Test", "body", Uuid::new_v4());
        assert!(post.allow_comments);

        let closed = post.with_comments_allowed(false);
        assert!(!closed.allow_comments);
    }

    #[test]
    fn test_post_validation() {
        let user = Uuid::new_v4();

        assert!(NewPost::new("Test", "", user).validate().is_ok());
        assert!(NewPost::new("", "body", user).validate().is_err());
        assert!(NewPost::new("x".repeat(POST_TITLE_BYTES_MAX + 1), "", user)
            .validate()
            .is_err());
        assert!(NewPost::new("t", "x".repeat(POST_CONTENT_BYTES_MAX + 1), user)
            .validate()
            .is_err());
    }

    #[test]
    fn test_comment_validation() {
        let post = Uuid::new_v4();
        let user = Uuid::new_v4();

        assert!(NewComment::root(post, "hi", user).validate().is_ok());
        assert!(NewComment::root(post, "", user).validate().is_err());

        let at_limit = "x".repeat(COMMENT_CONTENT_BYTES_MAX);
        assert!(NewComment::root(post, at_limit, user).validate().is_ok());

        let too_long = "x".repeat(COMMENT_CONTENT_BYTES_MAX + 1);
        let err = NewComment::root(post, too_long, user).validate().unwrap_err();
        assert!(err.to_string().contains("exceeds max"));
    }

    #[test]
    fn test_closure_edge_extension() {
        let post = Uuid::new_v4();
        let root = Uuid::new_v4();
        let reply = Uuid::new_v4();

        let own = ClosureEdge::self_edge(root, post);
        assert!(own.is_self_edge());
        assert_eq!(own.level, 0);

        let extended = own.extend_to(reply);
        assert_eq!(extended.ancestor_id, root);
        assert_eq!(extended.descendant_id, reply);
        assert_eq!(extended.nearest_ancestor_id, root);
        assert_eq!(extended.level, 1);
        assert_eq!(extended.subject_id, post);
        assert!(!extended.is_self_edge());
    }

    #[test]
    fn test_comment_serialization_skips_missing_parent() {
        let comment = NewComment::root(Uuid::new_v4(), "hi", Uuid::new_v4())
            .into_comment(Uuid::new_v4(), Utc::now());

        let json = serde_json::to_value(&comment).unwrap();
        assert!(json.get("parent_id").is_none());
        assert!(comment.is_top_level());

        let back: Comment = serde_json::from_value(json).unwrap();
        assert_eq!(back, comment);
    }
}
