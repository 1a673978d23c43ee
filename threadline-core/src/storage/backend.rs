//! StorageBackend - the contract every backend satisfies
//!
//! TigerStyle: one trait, two implementations, identical observable
//! semantics. Decisions shared by both backends:
//!
//! - identifiers and `created_at` are minted by the backend
//! - `list_posts` is newest first
//! - `list_root_comments` returns top-level comments only, oldest first;
//!   replies are reached through `get_comment`, `descendants`, `ancestors`

use async_trait::async_trait;
use uuid::Uuid;

use super::entity::{ClosureEdge, Comment, NewComment, NewPost, Post};
use super::error::{StorageError, StorageResult};
use crate::context::OpContext;

/// A validated 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub page: i64,
    /// Items per page
    pub page_size: i64,
}

impl PageRequest {
    /// Validate `page` and `page_size`; both must be at least 1.
    pub fn new(page: i64, page_size: i64) -> StorageResult<Self> {
        if page <= 0 || page_size <= 0 {
            return Err(StorageError::invalid(format!(
                "invalid page or page_size parameter: page={page}, page_size={page_size}"
            )));
        }
        Ok(Self { page, page_size })
    }

    /// Number of items skipped before this page. Saturates instead of
    /// overflowing, which lands past the end of any real collection.
    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Index range of this page within a collection of `len` items.
    #[must_use]
    pub fn bounds(&self, len: usize) -> std::ops::Range<usize> {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX).min(len);
        let size = usize::try_from(self.page_size).unwrap_or(usize::MAX);
        start..start.saturating_add(size).min(len)
    }
}

/// Storage for posts and threaded comments.
///
/// Implementations must be `Send + Sync` so one instance can serve many
/// concurrent request handlers behind an `Arc<dyn Storage>`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store a new post, minting its id and creation time.
    async fn create_post(&self, cx: &OpContext, post: NewPost) -> StorageResult<Post>;

    /// Get a post by id.
    async fn get_post(&self, cx: &OpContext, id: Uuid) -> StorageResult<Post>;

    /// Page through posts, newest first.
    async fn list_posts(&self, cx: &OpContext, page: i64, page_size: i64)
        -> StorageResult<Vec<Post>>;

    /// Overwrite title, content and `allow_comments` of `post.id`.
    async fn update_post(&self, cx: &OpContext, post: &Post) -> StorageResult<()>;

    /// Store a comment and extend the closure index, all or nothing.
    async fn create_comment(&self, cx: &OpContext, comment: NewComment)
        -> StorageResult<Comment>;

    /// Get a comment by id.
    async fn get_comment(&self, cx: &OpContext, id: Uuid) -> StorageResult<Comment>;

    /// Page through the top-level comments of a post, oldest first.
    async fn list_root_comments(
        &self,
        cx: &OpContext,
        post_id: Uuid,
        page: i64,
        page_size: i64,
    ) -> StorageResult<Vec<Comment>>;

    /// Every comment below `comment_id`, ordered by depth then creation.
    async fn descendants(&self, cx: &OpContext, comment_id: Uuid) -> StorageResult<Vec<Comment>>;

    /// Closure edges ending at `comment_id`, self-edge first, by level.
    async fn ancestors(&self, cx: &OpContext, comment_id: Uuid)
        -> StorageResult<Vec<ClosureEdge>>;

    /// Total number of posts.
    async fn count_posts(&self, cx: &OpContext) -> StorageResult<u64>;

    /// Number of top-level comments on a post.
    async fn count_root_comments(&self, cx: &OpContext, post_id: Uuid) -> StorageResult<u64>;

    /// Release connections. No-op for backends that hold none.
    async fn close(&self) {}
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ErrorKind;

    #[test]
    fn test_page_request_rejects_non_positive() {
        for (page, size) in [(0, 10), (1, 0), (-1, 10), (1, -5), (0, 0)] {
            let err = PageRequest::new(page, size).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "page={page} size={size}");
        }
    }

    #[test]
    fn test_page_bounds() {
        let first = PageRequest::new(1, 10).unwrap();
        assert_eq!(first.offset(), 0);
        assert_eq!(first.bounds(25), 0..10);

        let last = PageRequest::new(3, 10).unwrap();
        assert_eq!(last.bounds(25), 20..25);

        let beyond = PageRequest::new(4, 10).unwrap();
        assert!(beyond.bounds(25).is_empty());
    }

    #[test]
    fn test_page_offset_saturates() {
        let huge = PageRequest::new(i64::MAX, i64::MAX).unwrap();
        assert_eq!(huge.offset(), i64::MAX);
        assert!(huge.bounds(3).is_empty());
    }
}
