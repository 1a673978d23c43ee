//! DiscussionService - Storage plus Live Updates
//!
//! TigerStyle: Post rules live here, not in the backends. A comment is
//! published only after it is stored.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::Span;
use uuid::Uuid;

use crate::context::OpContext;
use crate::notify::{Notifier, NotifyError, Subscription, TopicNotifier};
use crate::storage::{Comment, NewComment, NewPost, Post, Storage, StorageError};

// =============================================================================
// Types
// =============================================================================

/// Partial post update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPatch {
    /// New title
    pub title: Option<String>,
    /// New body
    pub content: Option<String>,
    /// Open or close the post for comments
    pub allow_comments: Option<bool>,
}

impl PostPatch {
    /// Apply the provided fields to `post`.
    pub fn apply(self, post: &mut Post) {
        if let Some(title) = self.title {
            post.title = title;
        }
        if let Some(content) = self.content {
            post.content = content;
        }
        if let Some(allow) = self.allow_comments {
            post.allow_comments = allow;
        }
    }

    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.allow_comments.is_none()
    }
}

/// Payload published on a post's topic when a comment is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEvent {
    /// Post the comment belongs to
    pub post_id: Uuid,
    /// The stored comment
    pub comment: Comment,
}

/// Errors returned by `DiscussionService`.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Notifier failed.
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// The post does not accept comments.
    #[error("comments are disabled for post {0}")]
    CommentsDisabled(Uuid),

    /// An event could not be encoded.
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ServiceError {
    /// True when the underlying storage reported a missing key.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_not_found())
    }
}

/// Result alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// DiscussionService
// =============================================================================

/// Posts and threaded comments with per-post live updates.
#[derive(Clone)]
pub struct DiscussionService {
    storage: Arc<dyn Storage>,
    notifier: Arc<TopicNotifier<String>>,
    span: Span,
}

impl std::fmt::Debug for DiscussionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscussionService")
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl DiscussionService {
    /// Combine a backend and a notifier.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, notifier: Arc<TopicNotifier<String>>) -> Self {
        Self {
            storage,
            notifier,
            span: tracing::info_span!("service"),
        }
    }

    /// Emit events under `span` instead of the default component span.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The backend.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Create a post.
    pub async fn create_post(&self, cx: &OpContext, post: NewPost) -> ServiceResult<Post> {
        Ok(self.storage.create_post(cx, post).await?)
    }

    /// Get a post.
    pub async fn get_post(&self, cx: &OpContext, id: Uuid) -> ServiceResult<Post> {
        Ok(self.storage.get_post(cx, id).await?)
    }

    /// Page through posts, newest first.
    pub async fn list_posts(
        &self,
        cx: &OpContext,
        page: i64,
        page_size: i64,
    ) -> ServiceResult<Vec<Post>> {
        Ok(self.storage.list_posts(cx, page, page_size).await?)
    }

    /// Read the post, apply `patch`, write it back.
    pub async fn update_post(
        &self,
        cx: &OpContext,
        id: Uuid,
        patch: PostPatch,
    ) -> ServiceResult<Post> {
        let mut post = self.storage.get_post(cx, id).await?;
        if patch.is_empty() {
            return Ok(post);
        }

        patch.apply(&mut post);
        self.storage.update_post(cx, &post).await?;

        tracing::info!(
            parent: &self.span,
            post_id = %id,
            allow_comments = post.allow_comments,
            "Post updated"
        );
        Ok(post)
    }

    /// Store a comment on an open post and publish it to the post's topic.
    ///
    /// # Errors
    /// `NotFound` if the post is absent, `CommentsDisabled` if it is closed,
    /// and any storage error from the insert. A publish cut short by the
    /// cancellation or deadline of `cx` after the comment is stored is
    /// logged, not returned.
    pub async fn add_comment(&self, cx: &OpContext, comment: NewComment) -> ServiceResult<Comment> {
        let post = self.storage.get_post(cx, comment.post_id).await?;
        if !post.allow_comments {
            tracing::warn!(parent: &self.span, post_id = %post.id, "Comment rejected, comments disabled");
            return Err(ServiceError::CommentsDisabled(post.id));
        }

        let comment = self.storage.create_comment(cx, comment).await?;

        let event = CommentEvent {
            post_id: post.id,
            comment: comment.clone(),
        };
        let payload = serde_json::to_string(&event)?;
        // The notifier only watches the token; `run` adds the deadline.
        let published = cx
            .run(async { Ok(self.notifier.publish(cx.token(), post.id, payload).await) })
            .await;
        let failure = match published {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(e) => Some(e.to_string()),
        };
        if let Some(error) = failure {
            tracing::warn!(
                parent: &self.span,
                post_id = %post.id,
                comment_id = %comment.id,
                error = %error,
                "Comment stored but not published"
            );
        }

        Ok(comment)
    }

    /// Page through a post's top-level comments, oldest first.
    pub async fn comments(
        &self,
        cx: &OpContext,
        post_id: Uuid,
        page: i64,
        page_size: i64,
    ) -> ServiceResult<Vec<Comment>> {
        Ok(self.storage.list_root_comments(cx, post_id, page, page_size).await?)
    }

    /// Every reply below `comment_id`, by depth then age.
    pub async fn replies(&self, cx: &OpContext, comment_id: Uuid) -> ServiceResult<Vec<Comment>> {
        Ok(self.storage.descendants(cx, comment_id).await?)
    }

    /// Follow a post's new comments as JSON `CommentEvent`s.
    pub async fn subscribe(
        &self,
        token: &CancellationToken,
        post_id: Uuid,
    ) -> ServiceResult<Subscription<String>> {
        Ok(self.notifier.subscribe(token, post_id).await?)
    }
}

// =============================================================================
// Tests
// =============================================================================
