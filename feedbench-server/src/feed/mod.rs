//! Cursor-paginated post feeds
//!
//! Two query shapes share one ordering, `(created_at DESC, post_id DESC)`:
//!
//! - owner feed: every post by one user
//! - followed feed: the union of posts by everyone the caller follows
//!
//! Page boundaries are defined only by the ordering key carried in the
//! cursor. Paging with any limit yields the same sequence, without gaps or
//! duplicates, as one unbounded query over the union. Posts created after
//! paging has started sort ahead of the cursor and are not surfaced by later
//! pages.

pub mod cursor;

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use async_trait::async_trait;
use sqlx::PgConnection;

use crate::db::{FollowRepo, LikeRepo, LikeStats, PostRepo};
use crate::error::Result;
use crate::models::{require, FeedKey, FeedRequest, Page, PageLimit, Post, PostView};
pub use cursor::CursorScope;

/// Largest owner set sent to the store in one feed query.
pub const DEFAULT_SHARD_SIZE: usize = 256;

/// Reads the paginator needs from the store.
#[async_trait]
pub trait PostSource: Send {
    /// Ids of every user `caller_id` follows.
    async fn followed_owner_ids(&mut self, caller_id: &str) -> Result<Vec<String>>;

    /// Up to `limit` posts by `owners`, newest first, strictly after `after`.
    async fn posts_after(
        &mut self,
        owners: &[String],
        after: Option<&FeedKey>,
        limit: usize,
    ) -> Result<Vec<Post>>;

    /// Like aggregates for `post_ids` relative to `caller_id`.
    async fn like_stats(
        &mut self,
        post_ids: &[String],
        caller_id: &str,
    ) -> Result<HashMap<String, LikeStats>>;
}

/// [`PostSource`] over one Postgres connection.
pub struct PgPostSource<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgPostSource<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl PostSource for PgPostSource<'_> {
    async fn followed_owner_ids(&mut self, caller_id: &str) -> Result<Vec<String>> {
        FollowRepo::new(&mut *self.conn).target_ids(caller_id).await
    }

    async fn posts_after(
        &mut self,
        owners: &[String],
        after: Option<&FeedKey>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        PostRepo::new(&mut *self.conn)
            .page_by_owners(owners, after, limit as i64)
            .await
    }

    async fn like_stats(
        &mut self,
        post_ids: &[String],
        caller_id: &str,
    ) -> Result<HashMap<String, LikeStats>> {
        LikeRepo::new(&mut *self.conn).stats(post_ids, caller_id).await
    }
}

/// Builds feed pages from a [`PostSource`].
#[derive(Debug, Clone, Copy)]
pub struct FeedPaginator {
    shard_size: usize,
}

impl Default for FeedPaginator {
    fn default() -> Self {
        Self {
            shard_size: DEFAULT_SHARD_SIZE,
        }
    }
}

impl FeedPaginator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query at most `shard_size` owners per store round trip.
    pub fn with_shard_size(shard_size: usize) -> Self {
        Self {
            shard_size: shard_size.max(1),
        }
    }

    /// Read one page.
    ///
    /// `owner_id = Some` reads that user's feed, `None` the caller's followed
    /// feed. `next_cursor` is set only when the page is full.
    pub async fn page<S>(&self, source: &mut S, request: &FeedRequest) -> Result<Page<PostView>>
    where
        S: PostSource + ?Sized,
    {
        let caller_id = require("caller_id", &request.caller_id)?;
        let limit = PageLimit::new(request.limit)?;

        let scope = match &request.owner_id {
            Some(owner_id) => CursorScope::Owner(require("owner_id", owner_id)?.to_owned()),
            None => CursorScope::Followed(caller_id.to_owned()),
        };
        let after = request
            .cursor
            .as_deref()
            .map(|c| cursor::decode(c, &scope))
            .transpose()?;

        let owners = match &scope {
            CursorScope::Owner(owner_id) => vec![owner_id.clone()],
            _ => {
                let mut ids = source.followed_owner_ids(caller_id).await?;
                ids.sort_unstable();
                ids.dedup();
                ids
            }
        };
        if owners.is_empty() {
            return Ok(Page::empty());
        }

        let mut shards = Vec::with_capacity(owners.len().div_ceil(self.shard_size));
        for chunk in owners.chunks(self.shard_size) {
            shards.push(
                source
                    .posts_after(chunk, after.as_ref(), limit.as_usize())
                    .await?,
            );
        }
        let posts = merge_newest_first(shards, limit.as_usize());

        let next_cursor = match posts.last() {
            Some(last) if posts.len() == limit.as_usize() => {
                Some(cursor::encode(&scope, &last.feed_key()))
            }
            _ => None,
        };

        let post_ids: Vec<String> = posts.iter().map(|p| p.post_id.clone()).collect();
        let mut stats = source.like_stats(&post_ids, caller_id).await?;
        let items = posts
            .into_iter()
            .map(|post| {
                let s = stats.remove(&post.post_id).unwrap_or_default();
                PostView {
                    post,
                    like_count: s.like_count,
                    liked_by_caller: s.liked_by_caller,
                }
            })
            .collect();

        Ok(Page { items, next_cursor })
    }
}

/// Merge shard results, each already newest first, keeping the first `limit`.
fn merge_newest_first(shards: Vec<Vec<Post>>, limit: usize) -> Vec<Post> {
    if shards.len() == 1 {
        let mut only = shards.into_iter().next().unwrap_or_default();
        only.truncate(limit);
        return only;
    }

    let mut iters: Vec<_> = shards.into_iter().map(Vec::into_iter).collect();
    let mut heads: Vec<Option<Post>> = iters.iter_mut().map(Iterator::next).collect();
    let mut heap: BinaryHeap<(FeedKey, Reverse<usize>)> = heads
        .iter()
        .enumerate()
        .filter_map(|(i, head)| head.as_ref().map(|p| (p.feed_key(), Reverse(i))))
        .collect();

    let mut merged = Vec::with_capacity(limit);
    while merged.len() < limit {
        let Some((_, Reverse(i))) = heap.pop() else {
            break;
        };
        if let Some(post) = heads[i].take() {
            merged.push(post);
        }
        heads[i] = iters[i].next();
        if let Some(next) = &heads[i] {
            heap.push((next.feed_key(), Reverse(i)));
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::{DateTime, TimeZone, Utc};
    use futures::executor::block_on;
    use proptest::prelude::*;
    use std::collections::{BTreeSet, HashSet};

    /// Snapshot-free in-memory store; every call sees the current state.
    #[derive(Default)]
    struct MemorySource {
        posts: Vec<Post>,
        follows: HashMap<String, BTreeSet<String>>,
        likes: HashSet<(String, String)>,
        queries: usize,
    }

    impl MemorySource {
        fn add_post(&mut self, id: &str, owner: &str, created_at: DateTime<Utc>) {
            self.posts.push(Post {
                post_id: id.to_owned(),
                owner_id: owner.to_owned(),
                created_at,
                content: format!("post {}", id),
            });
        }

        fn follow(&mut self, source: &str, target: &str) {
            self.follows
                .entry(source.to_owned())
                .or_default()
                .insert(target.to_owned());
        }

        fn like(&mut self, post: &str, user: &str) {
            self.likes.insert((post.to_owned(), user.to_owned()));
        }

        /// Every matching post in feed order.
        fn expected(&self, owners: &[&str]) -> Vec<String> {
            let mut posts: Vec<&Post> = self
                .posts
                .iter()
                .filter(|p| owners.contains(&p.owner_id.as_str()))
                .collect();
            posts.sort_by(|a, b| b.feed_key().cmp(&a.feed_key()));
            posts.into_iter().map(|p| p.post_id.clone()).collect()
        }
    }

    #[async_trait]
    impl PostSource for MemorySource {
        async fn followed_owner_ids(&mut self, caller_id: &str) -> Result<Vec<String>> {
            Ok(self
                .follows
                .get(caller_id)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default())
        }

        async fn posts_after(
            &mut self,
            owners: &[String],
            after: Option<&FeedKey>,
            limit: usize,
        ) -> Result<Vec<Post>> {
            self.queries += 1;
            let mut posts: Vec<Post> = self
                .posts
                .iter()
                .filter(|p| owners.contains(&p.owner_id))
                .filter(|p| after.map_or(true, |k| p.feed_key().is_after(k)))
                .cloned()
                .collect();
            posts.sort_by(|a, b| b.feed_key().cmp(&a.feed_key()));
            posts.truncate(limit);
            Ok(posts)
        }

        async fn like_stats(
            &mut self,
            post_ids: &[String],
            caller_id: &str,
        ) -> Result<HashMap<String, LikeStats>> {
            let mut out: HashMap<String, LikeStats> = HashMap::new();
            for (post, user) in &self.likes {
                if post_ids.contains(post) {
                    let entry = out.entry(post.clone()).or_default();
                    entry.like_count += 1;
                    entry.liked_by_caller |= user == caller_id;
                }
            }
            Ok(out)
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn owner_feed(caller: &str, owner: &str, limit: u32, cursor: Option<String>) -> FeedRequest {
        FeedRequest {
            caller_id: caller.to_owned(),
            owner_id: Some(owner.to_owned()),
            limit,
            cursor,
        }
    }

    fn followed_feed(caller: &str, limit: u32, cursor: Option<String>) -> FeedRequest {
        FeedRequest {
            caller_id: caller.to_owned(),
            owner_id: None,
            limit,
            cursor,
        }
    }

    /// Page until exhausted, returning post ids in order.
    fn drain(
        paginator: &FeedPaginator,
        source: &mut MemorySource,
        make: impl Fn(Option<String>) -> FeedRequest,
    ) -> Vec<String> {
        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = block_on(paginator.page(source, &make(cursor.take()))).unwrap();
            let more = page.has_next();
            seen.extend(page.items.into_iter().map(|v| v.post.post_id));
            if !more {
                return seen;
            }
            cursor = page.next_cursor;
        }
    }

    #[test]
    fn owner_feed_is_newest_first_with_id_tiebreak() {
        let mut source = MemorySource::default();
        source.add_post("a", "bob", at(1));
        source.add_post("c", "bob", at(2));
        source.add_post("b", "bob", at(2));
        source.add_post("x", "carol", at(3));

        let page = block_on(FeedPaginator::new().page(&mut source, &owner_feed("alice", "bob", 10, None)))
            .unwrap();
        let ids: Vec<_> = page.items.iter().map(|v| v.post.post_id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "a"]);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn full_page_carries_cursor_and_short_page_does_not() {
        let mut source = MemorySource::default();
        for i in 0..4 {
            source.add_post(&format!("p{}", i), "bob", at(i));
        }
        let paginator = FeedPaginator::new();

        let first = block_on(paginator.page(&mut source, &owner_feed("alice", "bob", 2, None))).unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.next_cursor.is_some());

        let second =
            block_on(paginator.page(&mut source, &owner_feed("alice", "bob", 3, first.next_cursor)))
                .unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(second.next_cursor.is_none());
    }

    #[test]
    fn exact_multiple_ends_with_empty_page() {
        let mut source = MemorySource::default();
        source.add_post("p1", "bob", at(1));
        source.add_post("p2", "bob", at(2));
        let paginator = FeedPaginator::new();

        let first = block_on(paginator.page(&mut source, &owner_feed("alice", "bob", 2, None))).unwrap();
        let last =
            block_on(paginator.page(&mut source, &owner_feed("alice", "bob", 2, first.next_cursor)))
                .unwrap();
        assert!(last.items.is_empty());
        assert!(last.next_cursor.is_none());
    }

    #[test]
    fn insert_during_paging_neither_repeats_nor_skips() {
        let mut source = MemorySource::default();
        for i in 0..6 {
            source.add_post(&format!("p{}", i), "bob", at(i * 10));
        }
        let snapshot = source.expected(&["bob"]);
        let paginator = FeedPaginator::new();

        let first = block_on(paginator.page(&mut source, &owner_feed("alice", "bob", 2, None))).unwrap();
        let mut seen: Vec<String> = first.items.iter().map(|v| v.post.post_id.clone()).collect();

        // Newer than everything already read.
        source.add_post("fresh", "bob", at(1000));

        let mut cursor = first.next_cursor;
        while let Some(c) = cursor.take() {
            let page =
                block_on(paginator.page(&mut source, &owner_feed("alice", "bob", 2, Some(c)))).unwrap();
            seen.extend(page.items.into_iter().map(|v| v.post.post_id));
            cursor = page.next_cursor;
        }

        assert_eq!(seen, snapshot);
    }

    #[test]
    fn followed_feed_merges_across_owners() {
        let mut source = MemorySource::default();
        source.follow("alice", "bob");
        source.follow("alice", "carol");
        source.add_post("b1", "bob", at(1));
        source.add_post("c1", "carol", at(2));
        source.add_post("b2", "bob", at(3));
        source.add_post("d1", "dave", at(4));

        let seen = drain(&FeedPaginator::new(), &mut source, |c| followed_feed("alice", 2, c));
        assert_eq!(seen, ["b2", "c1", "b1"]);
    }

    #[test]
    fn followed_feed_without_follows_is_empty() {
        let mut source = MemorySource::default();
        source.add_post("b1", "bob", at(1));

        let page = block_on(FeedPaginator::new().page(&mut source, &followed_feed("alice", 5, None)))
            .unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_cursor.is_none());
        assert_eq!(source.queries, 0);
    }

    #[test]
    fn sharded_owner_sets_match_single_query() {
        let mut source = MemorySource::default();
        let owners: Vec<String> = (0..7).map(|i| format!("u{}", i)).collect();
        for (i, owner) in owners.iter().enumerate() {
            source.follow("alice", owner);
            for j in 0..3 {
                source.add_post(&format!("{}-{}", owner, j), owner, at(((i * 7 + j * 3) % 5) as i64));
            }
        }
        let owner_refs: Vec<&str> = owners.iter().map(String::as_str).collect();
        let expected = source.expected(&owner_refs);

        let sharded = drain(&FeedPaginator::with_shard_size(2), &mut source, |c| {
            followed_feed("alice", 4, c)
        });
        assert_eq!(sharded, expected);
        assert!(source.queries > 4);
    }

    #[test]
    fn like_stats_are_caller_relative() {
        let mut source = MemorySource::default();
        source.add_post("p1", "bob", at(1));
        source.add_post("p2", "bob", at(2));
        source.like("p1", "alice");
        source.like("p1", "carol");
        source.like("p2", "carol");

        let page = block_on(FeedPaginator::new().page(&mut source, &owner_feed("alice", "bob", 10, None)))
            .unwrap();
        let p2 = &page.items[0];
        let p1 = &page.items[1];
        assert_eq!((p2.like_count, p2.liked_by_caller), (1, false));
        assert_eq!((p1.like_count, p1.liked_by_caller), (2, true));
    }

    #[test]
    fn cursor_from_another_feed_is_rejected() {
        let mut source = MemorySource::default();
        source.follow("alice", "bob");
        source.add_post("p1", "bob", at(1));
        source.add_post("p2", "bob", at(2));
        let paginator = FeedPaginator::new();

        let page = block_on(paginator.page(&mut source, &owner_feed("alice", "bob", 1, None))).unwrap();
        let cursor = page.next_cursor.unwrap();

        let err = block_on(paginator.page(&mut source, &owner_feed("alice", "carol", 1, Some(cursor.clone()))))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = block_on(paginator.page(&mut source, &followed_feed("alice", 1, Some(cursor))))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn rejects_bad_requests() {
        let mut source = MemorySource::default();
        let paginator = FeedPaginator::new();

        for request in [
            owner_feed("alice", "bob", 0, None),
            owner_feed("", "bob", 5, None),
            owner_feed("alice", "", 5, None),
            owner_feed("alice", "bob", 5, Some("garbage".into())),
        ] {
            let err = block_on(paginator.page(&mut source, &request)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{:?}", request);
        }
    }

    #[test]
    fn merge_keeps_global_order() {
        let post = |id: &str, t: i64| Post {
            post_id: id.to_owned(),
            owner_id: "o".to_owned(),
            created_at: at(t),
            content: String::new(),
        };
        let merged = merge_newest_first(
            vec![
                vec![post("a", 5), post("b", 1)],
                vec![],
                vec![post("c", 4), post("d", 3), post("e", 2)],
            ],
            4,
        );
        let ids: Vec<_> = merged.iter().map(|p| p.post_id.as_str()).collect();
        assert_eq!(ids, ["a", "c", "d", "e"]);
    }

    proptest! {
        /// Property: successive cursors visit every post exactly once, in order
        #[test]
        fn prop_owner_paging_is_complete(
            stamps in prop::collection::vec(0i64..8, 1..40),
            limit in 1u32..12,
        ) {
            let mut source = MemorySource::default();
            for (i, t) in stamps.iter().enumerate() {
                source.add_post(&format!("p{:03}", i), "bob", at(*t));
            }
            let expected = source.expected(&["bob"]);

            let seen = drain(&FeedPaginator::new(), &mut source, |c| owner_feed("alice", "bob", limit, c));
            prop_assert_eq!(seen, expected);
        }

        /// Property: the followed feed pages like one merged query, for any shard size
        #[test]
        fn prop_followed_paging_matches_union(
            posts in prop::collection::vec((0usize..5, 0i64..6), 0..40),
            limit in 1u32..10,
            shard_size in 1usize..4,
        ) {
            let mut source = MemorySource::default();
            let owners = ["u0", "u1", "u2", "u3", "u4"];
            for owner in &owners[..3] {
                source.follow("alice", owner);
            }
            for (i, (owner, t)) in posts.iter().enumerate() {
                source.add_post(&format!("p{:03}", i), owners[*owner], at(*t));
            }
            let expected = source.expected(&owners[..3]);

            let seen = drain(&FeedPaginator::with_shard_size(shard_size), &mut source, |c| {
                followed_feed("alice", limit, c)
            });
            prop_assert_eq!(seen, expected);
        }
    }
}
