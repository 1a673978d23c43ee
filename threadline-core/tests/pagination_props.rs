use proptest::prelude::*;
use threadline_core::{MemoryStorage, NewComment, NewPost, OpContext, Storage};
use uuid::Uuid;

struct Listing {
    post_ids: Vec<Uuid>,
    post_pages: Vec<Vec<Uuid>>,
    root_ids: Vec<Uuid>,
    root_pages: Vec<Vec<Uuid>>,
}

/// Store `posts` posts and `roots` root comments on one of them, then read
/// every page of both listings.
fn paged(posts: usize, roots: usize, page_size: i64) -> Listing {
    tokio_test::block_on(async {
        let storage = MemoryStorage::new();
        let cx = OpContext::background();
        let user = Uuid::new_v4();

        let mut post_ids = Vec::new();
        for i in 0..posts {
            let p = storage
                .create_post(&cx, NewPost::new(format!("post {i}"), "", user))
                .await
                .unwrap();
            post_ids.push(p.id);
        }
        // Newest first
        post_ids.reverse();

        let host = storage.create_post(&cx, NewPost::new("host", "", user)).await.unwrap();
        post_ids.insert(0, host.id);

        let mut root_ids = Vec::new();
        for i in 0..roots {
            let c = storage
                .create_comment(&cx, NewComment::root(host.id, format!("c{i}"), user))
                .await
                .unwrap();
            // Replies never show up in the root listing.
            storage
                .create_comment(&cx, NewComment::reply(host.id, c.id, "r", user))
                .await
                .unwrap();
            root_ids.push(c.id);
        }

        let mut post_pages = Vec::new();
        let mut page = 1;
        loop {
            let batch = storage.list_posts(&cx, page, page_size).await.unwrap();
            if batch.is_empty() {
                break;
            }
            post_pages.push(batch.into_iter().map(|p| p.id).collect());
            page += 1;
        }

        let mut root_pages = Vec::new();
        let mut page = 1;
        loop {
            let batch = storage
                .list_root_comments(&cx, host.id, page, page_size)
                .await
                .unwrap();
            if batch.is_empty() {
                break;
            }
            root_pages.push(batch.into_iter().map(|c| c.id).collect());
            page += 1;
        }

        Listing {
            post_ids,
            post_pages,
            root_ids,
            root_pages,
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pages_partition_the_listing(
        posts in 0usize..30,
        roots in 0usize..30,
        page_size in 1i64..12,
    ) {
        let Listing { post_ids, post_pages, root_ids, root_pages } = paged(posts, roots, page_size);

        for pages in [&post_pages, &root_pages] {
            for (i, page) in pages.iter().enumerate() {
                prop_assert!(page.len() as i64 <= page_size);
                // Only the last page may be short.
                if i + 1 < pages.len() {
                    prop_assert_eq!(page.len() as i64, page_size);
                }
            }
        }

        let all_posts: Vec<Uuid> = post_pages.concat();
        prop_assert_eq!(all_posts, post_ids);

        let all_roots: Vec<Uuid> = root_pages.concat();
        prop_assert_eq!(all_roots, root_ids);
    }

    #[test]
    fn non_positive_pages_are_rejected(page in -5i64..=0, page_size in -5i64..=5) {
        let result = tokio_test::block_on(async {
            let storage = MemoryStorage::new();
            storage.list_posts(&OpContext::background(), page, page_size).await
        });
        prop_assert!(result.is_err());
    }
}
