//! MemoryStorage - Volatile Backend
//!
//! TigerStyle: maps for lookup plus append-only id sequences for order.
//! Map iteration order is never used for pagination.
//!
//! # Locking
//!
//! ```text
//! posts    RwLock ── posts map + insertion order
//! comments RwLock ── comments map + per-post order + root order + closure
//! ```
//!
//! No operation holds both locks. `create_post` takes them one after the
//! other and returns only once the post is registered in both. Every create
//! validates fully before the first mutation, so a failed create leaves the
//! indexes untouched.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::Span;
use uuid::Uuid;

use super::backend::{PageRequest, Storage};
use super::entity::{ClosureEdge, Comment, NewComment, NewPost, Post};
use super::error::{StorageError, StorageResult};
use crate::clock::{Clock, SystemClock};
use crate::context::OpContext;

#[derive(Debug, Default)]
struct PostIndex {
    posts: HashMap<Uuid, Post>,
    /// Insertion order, oldest first
    order: Vec<Uuid>,
}

#[derive(Debug, Default)]
struct CommentIndex {
    comments: HashMap<Uuid, Comment>,
    /// post id -> every comment id on the post, creation order. Holds a key
    /// for every stored post, so comments can check the post without the
    /// posts lock.
    by_post: HashMap<Uuid, Vec<Uuid>>,
    /// post id -> top-level comment ids, creation order
    roots: HashMap<Uuid, Vec<Uuid>>,
    /// post id -> closure edges of the post's comment forest
    closure: HashMap<Uuid, Vec<ClosureEdge>>,
}

impl CommentIndex {
    fn edges_of(&self, post_id: Uuid) -> &[ClosureEdge] {
        self.closure.get(&post_id).map_or(&[], Vec::as_slice)
    }
}

/// In-process storage; contents are lost when the value is dropped.
#[derive(Debug)]
pub struct MemoryStorage {
    posts: RwLock<PostIndex>,
    comments: RwLock<CommentIndex>,
    clock: Arc<dyn Clock>,
    span: Span,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Empty storage on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            posts: RwLock::new(PostIndex::default()),
            comments: RwLock::new(CommentIndex::default()),
            clock: Arc::new(SystemClock::new()),
            span: tracing::info_span!("storage", backend = "memory"),
        }
    }

    /// Use `clock` for creation timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Emit events under `span` instead of the default component span.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Every closure edge recorded for a post, in insertion order.
    ///
    /// Snapshot for inspection and tests; not part of `Storage`.
    pub async fn closure_edges(&self, post_id: Uuid) -> Vec<ClosureEdge> {
        self.comments.read().await.edges_of(post_id).to_vec()
    }

    async fn read_posts(&self, cx: &OpContext) -> StorageResult<RwLockReadGuard<'_, PostIndex>> {
        cx.run(async { Ok(self.posts.read().await) }).await
    }

    async fn write_posts(&self, cx: &OpContext) -> StorageResult<RwLockWriteGuard<'_, PostIndex>> {
        cx.run(async { Ok(self.posts.write().await) }).await
    }

    async fn read_comments(
        &self,
        cx: &OpContext,
    ) -> StorageResult<RwLockReadGuard<'_, CommentIndex>> {
        cx.run(async { Ok(self.comments.read().await) }).await
    }

    async fn write_comments(
        &self,
        cx: &OpContext,
    ) -> StorageResult<RwLockWriteGuard<'_, CommentIndex>> {
        cx.run(async { Ok(self.comments.write().await) }).await
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_post(&self, cx: &OpContext, post: NewPost) -> StorageResult<Post> {
        post.validate()?;

        let post = {
            let mut index = self.write_posts(cx).await?;
            let post = post.into_post(Uuid::new_v4(), self.clock.now());
            index.order.push(post.id);
            index.posts.insert(post.id, post.clone());
            post
        };

        // Not raced against `cx`: the post is already visible.
        self.comments.write().await.by_post.entry(post.id).or_default();

        tracing::info!(parent: &self.span, post_id = %post.id, "Post created");
        Ok(post)
    }

    async fn get_post(&self, cx: &OpContext, id: Uuid) -> StorageResult<Post> {
        let index = self.read_posts(cx).await?;
        index.posts.get(&id).cloned().ok_or_else(|| {
            tracing::warn!(parent: &self.span, post_id = %id, "Post not found");
            StorageError::post_not_found(id)
        })
    }

    async fn list_posts(
        &self,
        cx: &OpContext,
        page: i64,
        page_size: i64,
    ) -> StorageResult<Vec<Post>> {
        let request = PageRequest::new(page, page_size).map_err(|e| {
            tracing::warn!(parent: &self.span, page, page_size, "Invalid page or page_size");
            e
        })?;

        let index = self.read_posts(cx).await?;
        let range = request.bounds(index.order.len());
        let posts: Vec<Post> = index
            .order
            .iter()
            .rev()
            .skip(range.start)
            .take(range.len())
            .filter_map(|id| index.posts.get(id).cloned())
            .collect();

        debug_assert!(posts.len() <= range.len());
        tracing::debug!(parent: &self.span, page, page_size, count = posts.len(), "Listed posts");
        Ok(posts)
    }

    async fn update_post(&self, cx: &OpContext, post: &Post) -> StorageResult<()> {
        post.validate()?;

        let mut index = self.write_posts(cx).await?;
        let Some(stored) = index.posts.get_mut(&post.id) else {
            tracing::warn!(parent: &self.span, post_id = %post.id, "Post not found");
            return Err(StorageError::post_not_found(post.id));
        };
        stored.title.clone_from(&post.title);
        stored.content.clone_from(&post.content);
        stored.allow_comments = post.allow_comments;

        tracing::info!(parent: &self.span, post_id = %post.id, "Post updated");
        Ok(())
    }

    async fn create_comment(
        &self,
        cx: &OpContext,
        comment: NewComment,
    ) -> StorageResult<Comment> {
        comment.validate()?;

        let mut index = self.write_comments(cx).await?;

        if !index.by_post.contains_key(&comment.post_id) {
            tracing::warn!(parent: &self.span, post_id = %comment.post_id, "Post not found");
            return Err(StorageError::post_not_found(comment.post_id));
        }

        if let Some(parent_id) = comment.parent_id {
            let Some(parent) = index.comments.get(&parent_id) else {
                tracing::warn!(parent: &self.span, parent_id = %parent_id, "Parent comment not found");
                return Err(StorageError::parent_not_found(parent_id));
            };
            if parent.post_id != comment.post_id {
                return Err(StorageError::invalid(format!(
                    "parent comment {parent_id} belongs to post {}, not {}",
                    parent.post_id, comment.post_id
                )));
            }
        }

        let comment = comment.into_comment(Uuid::new_v4(), self.clock.now());
        let post_id = comment.post_id;

        let mut edges = vec![ClosureEdge::self_edge(comment.id, post_id)];
        if let Some(parent_id) = comment.parent_id {
            edges.extend(
                index
                    .edges_of(post_id)
                    .iter()
                    .filter(|edge| edge.descendant_id == parent_id)
                    .map(|edge| edge.extend_to(comment.id)),
            );
        }

        // Validation is done; nothing below can fail.
        index.closure.entry(post_id).or_default().extend(edges);
        index.by_post.entry(post_id).or_default().push(comment.id);
        if comment.is_top_level() {
            index.roots.entry(post_id).or_default().push(comment.id);
        }
        index.comments.insert(comment.id, comment.clone());

        tracing::info!(
            parent: &self.span,
            comment_id = %comment.id,
            post_id = %post_id,
            parent_id = ?comment.parent_id,
            "Comment created"
        );
        Ok(comment)
    }

    async fn get_comment(&self, cx: &OpContext, id: Uuid) -> StorageResult<Comment> {
        let index = self.read_comments(cx).await?;
        index.comments.get(&id).cloned().ok_or_else(|| {
            tracing::warn!(parent: &self.span, comment_id = %id, "Comment not found");
            StorageError::comment_not_found(id)
        })
    }

    async fn list_root_comments(
        &self,
        cx: &OpContext,
        post_id: Uuid,
        page: i64,
        page_size: i64,
    ) -> StorageResult<Vec<Comment>> {
        let request = PageRequest::new(page, page_size).map_err(|e| {
            tracing::warn!(parent: &self.span, page, page_size, "Invalid page or page_size");
            e
        })?;

        let index = self.read_comments(cx).await?;
        let Some(roots) = index.roots.get(&post_id) else {
            return Ok(Vec::new());
        };
        let comments: Vec<Comment> = roots[request.bounds(roots.len())]
            .iter()
            .filter_map(|id| index.comments.get(id).cloned())
            .collect();

        tracing::debug!(
            parent: &self.span,
            post_id = %post_id,
            page,
            page_size,
            count = comments.len(),
            "Listed comments for post"
        );
        Ok(comments)
    }

    async fn descendants(&self, cx: &OpContext, comment_id: Uuid) -> StorageResult<Vec<Comment>> {
        let index = self.read_comments(cx).await?;
        let post_id = index
            .comments
            .get(&comment_id)
            .map(|c| c.post_id)
            .ok_or_else(|| StorageError::comment_not_found(comment_id))?;

        let mut below: Vec<(i32, &Comment)> = index
            .edges_of(post_id)
            .iter()
            .filter(|edge| edge.ancestor_id == comment_id && edge.level > 0)
            .filter_map(|edge| index.comments.get(&edge.descendant_id).map(|c| (edge.level, c)))
            .collect();
        below.sort_by(|(la, a), (lb, b)| la.cmp(lb).then(a.created_at.cmp(&b.created_at)));

        Ok(below.into_iter().map(|(_, c)| c.clone()).collect())
    }

    async fn ancestors(&self, cx: &OpContext, comment_id: Uuid) -> StorageResult<Vec<ClosureEdge>> {
        let index = self.read_comments(cx).await?;
        let post_id = index
            .comments
            .get(&comment_id)
            .map(|c| c.post_id)
            .ok_or_else(|| StorageError::comment_not_found(comment_id))?;

        let mut edges: Vec<ClosureEdge> = index
            .edges_of(post_id)
            .iter()
            .filter(|edge| edge.descendant_id == comment_id)
            .copied()
            .collect();
        edges.sort_by_key(|edge| edge.level);
        Ok(edges)
    }

    async fn count_posts(&self, cx: &OpContext) -> StorageResult<u64> {
        let index = self.read_posts(cx).await?;
        Ok(index.order.len() as u64)
    }

    async fn count_root_comments(&self, cx: &OpContext, post_id: Uuid) -> StorageResult<u64> {
        let index = self.read_comments(cx).await?;
        Ok(index.roots.get(&post_id).map_or(0, Vec::len) as u64)
    }
}

// =============================================================================
// Tests
// =============================================================================
