//! In-memory `ContentSource` used by unit and integration tests.
//!
//! Mirrors the query plans of the Postgres adapter closely enough for the
//! assemblers and the HTTP surface to be exercised without a database.
//! Every call bumps a counter so tests can tell cache hits from misses.

use std::{
    cmp::Reverse,
    collections::{HashMap, HashSet},
    sync::{
        PoisonError, RwLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;

use super::{ContentSource, DaoError, Paged};
use crate::models::{
    comment::{Comment, CommentContent, CommentReply, ReactionMaps, ReactionState},
    post::{ContentType, Post, PostContent, Visibility},
    query::{CommentStyle, SearchType},
    tag::Topic,
    user::User,
};

#[derive(Debug, Clone)]
struct TagRow {
    id: i64,
    user_id: i64,
    tag: String,
    quote_num: i64,
}

#[derive(Debug, Clone)]
struct CommentVote {
    user_id: i64,
    post_id: i64,
    comment_id: i64,
    reply_id: Option<i64>,
    state: ReactionState,
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    friends: HashSet<(i64, i64)>,
    follows: HashSet<(i64, i64)>,
    posts: Vec<Post>,
    post_contents: Vec<PostContent>,
    // (user_id, post_id, state), in insertion order
    post_reactions: Vec<(i64, i64, ReactionState)>,
    comments: Vec<Comment>,
    comment_contents: Vec<CommentContent>,
    replies: Vec<CommentReply>,
    comment_votes: Vec<CommentVote>,
    tags: Vec<TagRow>,
    // (user_id, tag_id, is_pin)
    tag_follows: Vec<(i64, i64, bool)>,
    next_row_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_row_id += 1;
        self.next_row_id
    }

    fn live_post(&self, id: i64) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id && !p.is_deleted())
    }

    fn live_posts(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter().filter(|p| !p.is_deleted())
    }
}

#[derive(Debug, Default)]
pub struct MemorySource {
    tables: RwLock<Tables>,
    queries: AtomicUsize,
    failing: AtomicBool,
}

fn slice<T>(rows: Vec<T>, limit: i64, offset: i64) -> Paged<T> {
    let total = rows.len() as i64;
    let offset = usize::try_from(offset).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    (rows.into_iter().skip(offset).take(limit).collect(), total)
}

fn by_id_desc(posts: &mut [Post]) {
    posts.sort_by_key(|p| Reverse(p.id));
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of data-source calls served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Makes every subsequent call fail until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, DaoError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DaoError::InvalidData("data source unavailable".to_owned()));
        }
        Ok(self.tables.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    // Seeding.

    pub fn add_user(&self, id: i64, username: &str) -> &Self {
        self.insert_user(id, username, false)
    }

    pub fn add_admin(&self, id: i64, username: &str) -> &Self {
        self.insert_user(id, username, true)
    }

    fn insert_user(&self, id: i64, username: &str, is_admin: bool) -> &Self {
        self.write().users.push(User {
            id,
            username: username.to_owned(),
            nickname: username.to_owned(),
            avatar: String::new(),
            status: 1,
            is_admin,
            tweets_count: 0,
            created_at: Some(Utc::now()),
        });
        self
    }

    /// Friendship is mutual.
    pub fn befriend(&self, a: i64, b: i64) -> &Self {
        let mut tables = self.write();
        tables.friends.insert((a, b));
        tables.friends.insert((b, a));
        drop(tables);
        self
    }

    pub fn follow(&self, follower: i64, followee: i64) -> &Self {
        self.write().follows.insert((follower, followee));
        self
    }

    /// A post with a single text paragraph.
    pub fn add_post(&self, id: i64, user_id: i64, visibility: Visibility, text: &str) -> &Self {
        let mut tables = self.write();
        let now = Utc::now();
        tables.posts.push(Post {
            id,
            user_id,
            visibility: visibility.code(),
            comment_count: 0,
            upvote_count: 0,
            collection_count: 0,
            share_count: 0,
            is_top: false,
            is_essence: false,
            tags: Vec::new(),
            created_at: Some(now),
            modified_at: Some(now),
            latest_replied_at: Some(now),
            deleted_at: None,
        });
        let content_id = tables.next_id();
        tables.post_contents.push(PostContent {
            id: content_id,
            post_id: id,
            user_id,
            content: text.to_owned(),
            content_type: ContentType::Text.code(),
            sort: 100,
        });
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == user_id) {
            user.tweets_count += 1;
        }
        drop(tables);
        self
    }

    pub fn add_content(&self, post_id: i64, content_type: ContentType, content: &str) -> &Self {
        let mut tables = self.write();
        let id = tables.next_id();
        let user_id = tables
            .posts
            .iter()
            .find(|p| p.id == post_id)
            .map(|p| p.user_id)
            .unwrap_or_default();
        tables.post_contents.push(PostContent {
            id,
            post_id,
            user_id,
            content: content.to_owned(),
            content_type: content_type.code(),
            sort: 100 + id,
        });
        drop(tables);
        self
    }

    pub fn tag_post(&self, post_id: i64, tag: &str) -> &Self {
        self.edit_post(post_id, |p| p.tags.push(tag.to_owned()))
    }

    pub fn mark_essence(&self, post_id: i64) -> &Self {
        self.edit_post(post_id, |p| p.is_essence = true)
    }

    pub fn pin_to_top(&self, post_id: i64) -> &Self {
        self.edit_post(post_id, |p| p.is_top = true)
    }

    pub fn delete_post(&self, post_id: i64) -> &Self {
        self.edit_post(post_id, |p| p.deleted_at = Some(Utc::now()))
    }

    pub fn edit_post(&self, post_id: i64, edit: impl FnOnce(&mut Post)) -> &Self {
        if let Some(post) = self.write().posts.iter_mut().find(|p| p.id == post_id) {
            edit(post);
        }
        self
    }

    pub fn react_post(&self, user_id: i64, post_id: i64, state: ReactionState) -> &Self {
        let mut tables = self.write();
        tables
            .post_reactions
            .retain(|(u, p, _)| !(*u == user_id && *p == post_id));
        tables.post_reactions.push((user_id, post_id, state));
        drop(tables);
        self
    }

    /// Up-votes a post, which is what "starring" means for listings.
    pub fn star(&self, user_id: i64, post_id: i64) -> &Self {
        self.react_post(
            user_id,
            post_id,
            ReactionState {
                is_upvoted: true,
                is_downvoted: false,
            },
        )
    }

    pub fn add_comment(&self, id: i64, post_id: i64, user_id: i64, text: &str) -> &Self {
        let mut tables = self.write();
        tables.comments.push(Comment {
            id,
            post_id,
            user_id,
            ip_loc: String::new(),
            thumbs_up_count: 0,
            thumbs_down_count: 0,
            reply_count: 0,
            is_essence: false,
            created_at: Some(Utc::now()),
        });
        let content_id = tables.next_id();
        tables.comment_contents.push(CommentContent {
            id: content_id,
            comment_id: id,
            user_id,
            content: text.to_owned(),
            content_type: ContentType::Text.code(),
            sort: 100,
        });
        if let Some(post) = tables.posts.iter_mut().find(|p| p.id == post_id) {
            post.comment_count += 1;
            post.latest_replied_at = Some(Utc::now());
        }
        drop(tables);
        self
    }

    pub fn add_comment_content(
        &self,
        comment_id: i64,
        content_type: ContentType,
        content: &str,
        sort: i64,
    ) -> &Self {
        let mut tables = self.write();
        let id = tables.next_id();
        let user_id = tables
            .comments
            .iter()
            .find(|c| c.id == comment_id)
            .map(|c| c.user_id)
            .unwrap_or_default();
        tables.comment_contents.push(CommentContent {
            id,
            comment_id,
            user_id,
            content: content.to_owned(),
            content_type: content_type.code(),
            sort,
        });
        drop(tables);
        self
    }

    pub fn thumbs_up_comment(&self, comment_id: i64, count: i64) -> &Self {
        if let Some(comment) = self.write().comments.iter_mut().find(|c| c.id == comment_id) {
            comment.thumbs_up_count = count;
        }
        self
    }

    pub fn add_reply(
        &self,
        id: i64,
        comment_id: i64,
        user_id: i64,
        at_user_id: Option<i64>,
        text: &str,
    ) -> &Self {
        let mut tables = self.write();
        tables.replies.push(CommentReply {
            id,
            comment_id,
            user_id,
            at_user_id,
            content: text.to_owned(),
            ip_loc: String::new(),
            thumbs_up_count: 0,
            thumbs_down_count: 0,
            created_at: Some(Utc::now()),
        });
        if let Some(comment) = tables.comments.iter_mut().find(|c| c.id == comment_id) {
            comment.reply_count += 1;
        }
        drop(tables);
        self
    }

    pub fn react_comment(
        &self,
        user_id: i64,
        comment_id: i64,
        reply_id: Option<i64>,
        state: ReactionState,
    ) -> &Self {
        let mut tables = self.write();
        let post_id = tables
            .comments
            .iter()
            .find(|c| c.id == comment_id)
            .map(|c| c.post_id)
            .unwrap_or_default();
        tables.comment_votes.push(CommentVote {
            user_id,
            post_id,
            comment_id,
            reply_id,
            state,
        });
        drop(tables);
        self
    }

    pub fn add_tag(&self, id: i64, tag: &str, quote_num: i64) -> &Self {
        self.write().tags.push(TagRow {
            id,
            user_id: 0,
            tag: tag.to_owned(),
            quote_num,
        });
        self
    }

    pub fn follow_tag(&self, user_id: i64, tag_id: i64, is_pin: bool) -> &Self {
        self.write().tag_follows.push((user_id, tag_id, is_pin));
        self
    }
}

fn topic(row: &TagRow, follow: Option<&(i64, i64, bool)>) -> Topic {
    Topic {
        id: row.id,
        user_id: row.user_id,
        tag: row.tag.clone(),
        quote_num: row.quote_num,
        is_following: follow.is_some(),
        is_pin: follow.is_some_and(|(_, _, pin)| *pin),
    }
}

fn ranked_tags(
    tables: &Tables,
    viewer_id: Option<i64>,
    num: i64,
    order: impl Fn(&TagRow) -> (i64, i64),
) -> Vec<Topic> {
    let mut rows: Vec<&TagRow> = tables.tags.iter().collect();
    rows.sort_by_key(|row| Reverse(order(row)));
    rows.into_iter()
        .take(usize::try_from(num).unwrap_or(0))
        .map(|row| {
            let follow = viewer_id.and_then(|viewer| {
                tables
                    .tag_follows
                    .iter()
                    .find(|(u, t, _)| *u == viewer && *t == row.id)
            });
            topic(row, follow)
        })
        .collect()
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn list_index_newest(&self, limit: i64, offset: i64) -> Result<Paged<Post>, DaoError> {
        let tables = self.read()?;
        let mut posts: Vec<Post> = tables
            .live_posts()
            .filter(|p| p.visibility() == Visibility::Public)
            .cloned()
            .collect();
        by_id_desc(&mut posts);
        Ok(slice(posts, limit, offset))
    }

    async fn list_index_hots(&self, limit: i64, offset: i64) -> Result<Paged<Post>, DaoError> {
        let tables = self.read()?;
        let mut posts: Vec<Post> = tables
            .live_posts()
            .filter(|p| p.visibility() == Visibility::Public)
            .cloned()
            .collect();
        posts.sort_by_key(|p| Reverse((p.comment_count, p.latest_replied_at, p.id)));
        Ok(slice(posts, limit, offset))
    }

    async fn list_following(
        &self,
        viewer_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError> {
        let tables = self.read()?;
        let mut posts: Vec<Post> = tables
            .live_posts()
            .filter(|p| {
                let visibility = p.visibility();
                p.user_id == viewer_id
                    || (tables.follows.contains(&(viewer_id, p.user_id))
                        && matches!(visibility, Visibility::Public | Visibility::Following))
                    || (tables.friends.contains(&(viewer_id, p.user_id))
                        && matches!(visibility, Visibility::Public | Visibility::Friend))
            })
            .cloned()
            .collect();
        by_id_desc(&mut posts);
        Ok(slice(posts, limit, offset))
    }

    async fn list_user_posts(
        &self,
        user_id: i64,
        tiers: &[Visibility],
        highlight_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError> {
        let tables = self.read()?;
        let mut posts: Vec<Post> = tables
            .live_posts()
            .filter(|p| p.user_id == user_id && tiers.contains(&p.visibility()))
            .filter(|p| !highlight_only || p.is_essence)
            .cloned()
            .collect();
        posts.sort_by_key(|p| Reverse((p.is_top, p.id)));
        Ok(slice(posts, limit, offset))
    }

    async fn list_user_media(
        &self,
        user_id: i64,
        tiers: &[Visibility],
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError> {
        let tables = self.read()?;
        let mut posts: Vec<Post> = tables
            .live_posts()
            .filter(|p| p.user_id == user_id && tiers.contains(&p.visibility()))
            .filter(|p| {
                tables.post_contents.iter().any(|c| {
                    c.post_id == p.id && ContentType::from_code(c.content_type).is_media()
                })
            })
            .cloned()
            .collect();
        by_id_desc(&mut posts);
        Ok(slice(posts, limit, offset))
    }

    async fn list_user_commented(
        &self,
        user_id: i64,
        tiers: &[Visibility],
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError> {
        let tables = self.read()?;
        let commented: HashSet<i64> = tables
            .comments
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.post_id)
            .collect();
        let mut posts: Vec<Post> = tables
            .live_posts()
            .filter(|p| commented.contains(&p.id) && tiers.contains(&p.visibility()))
            .cloned()
            .collect();
        posts.sort_by_key(|p| Reverse((p.latest_replied_at, p.id)));
        Ok(slice(posts, limit, offset))
    }

    async fn list_user_stars(
        &self,
        user_id: i64,
        tiers: &[Visibility],
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError> {
        let tables = self.read()?;
        let posts: Vec<Post> = tables
            .post_reactions
            .iter()
            .rev()
            .filter(|(u, _, state)| *u == user_id && state.is_upvoted)
            .filter_map(|(_, post_id, _)| tables.live_post(*post_id))
            .filter(|p| tiers.contains(&p.visibility()))
            .cloned()
            .collect();
        Ok(slice(posts, limit, offset))
    }

    async fn search_posts(
        &self,
        query: &str,
        search_type: SearchType,
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError> {
        let tables = self.read()?;
        let needle = query.to_lowercase();
        let mut posts: Vec<Post> = tables
            .live_posts()
            .filter(|p| p.visibility() == Visibility::Public)
            .filter(|p| match search_type {
                SearchType::Tag => p.tags.iter().any(|tag| tag == query),
                SearchType::Search => tables.post_contents.iter().any(|c| {
                    c.post_id == p.id
                        && matches!(
                            ContentType::from_code(c.content_type),
                            ContentType::Title | ContentType::Text
                        )
                        && c.content.to_lowercase().contains(&needle)
                }),
            })
            .cloned()
            .collect();
        by_id_desc(&mut posts);
        Ok(slice(posts, limit, offset))
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, DaoError> {
        Ok(self.read()?.live_post(id).cloned())
    }

    async fn get_post_contents_by_ids(&self, post_ids: &[i64]) -> Result<Vec<PostContent>, DaoError> {
        let tables = self.read()?;
        let mut contents: Vec<PostContent> = tables
            .post_contents
            .iter()
            .filter(|c| post_ids.contains(&c.post_id))
            .cloned()
            .collect();
        contents.sort_by_key(|c| (c.post_id, c.sort, c.id));
        Ok(contents)
    }

    async fn get_post_reactions(
        &self,
        viewer_id: i64,
        post_ids: &[i64],
    ) -> Result<HashMap<i64, ReactionState>, DaoError> {
        let tables = self.read()?;
        Ok(tables
            .post_reactions
            .iter()
            .filter(|(u, p, _)| *u == viewer_id && post_ids.contains(p))
            .map(|(_, p, state)| (*p, *state))
            .collect())
    }

    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, DaoError> {
        let tables = self.read()?;
        Ok(tables
            .users
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DaoError> {
        let tables = self.read()?;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn is_friend(&self, user_id: i64, other_id: i64) -> Result<bool, DaoError> {
        Ok(self.read()?.friends.contains(&(user_id, other_id)))
    }

    async fn is_following(&self, user_id: i64, other_id: i64) -> Result<bool, DaoError> {
        Ok(self.read()?.follows.contains(&(user_id, other_id)))
    }

    async fn friend_ids_among(&self, user_id: i64, ids: &[i64]) -> Result<HashSet<i64>, DaoError> {
        let tables = self.read()?;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| tables.friends.contains(&(user_id, *id)))
            .collect())
    }

    async fn following_ids_among(
        &self,
        user_id: i64,
        ids: &[i64],
    ) -> Result<HashSet<i64>, DaoError> {
        let tables = self.read()?;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| tables.follows.contains(&(user_id, *id)))
            .collect())
    }

    async fn follow_counts(&self, user_id: i64) -> Result<(i64, i64), DaoError> {
        let tables = self.read()?;
        let followers = tables.follows.iter().filter(|(_, b)| *b == user_id).count();
        let following = tables.follows.iter().filter(|(a, _)| *a == user_id).count();
        Ok((followers as i64, following as i64))
    }

    async fn list_comments(
        &self,
        post_id: i64,
        style: CommentStyle,
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Comment>, DaoError> {
        let tables = self.read()?;
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        match style {
            CommentStyle::Default => comments.sort_by_key(|c| (Reverse(c.is_essence), c.id)),
            CommentStyle::Hots => comments.sort_by_key(|c| Reverse((c.thumbs_up_count, c.id))),
            CommentStyle::Newest => comments.sort_by_key(|c| Reverse(c.id)),
        }
        Ok(slice(comments, limit, offset))
    }

    async fn get_comment_contents_by_ids(
        &self,
        comment_ids: &[i64],
    ) -> Result<Vec<CommentContent>, DaoError> {
        // Storage order; fragments are ordered by the thread assembler.
        let tables = self.read()?;
        Ok(tables
            .comment_contents
            .iter()
            .filter(|c| comment_ids.contains(&c.comment_id))
            .cloned()
            .collect())
    }

    async fn get_comment_replies_by_ids(
        &self,
        comment_ids: &[i64],
    ) -> Result<Vec<CommentReply>, DaoError> {
        let tables = self.read()?;
        let mut replies: Vec<CommentReply> = tables
            .replies
            .iter()
            .filter(|r| comment_ids.contains(&r.comment_id))
            .cloned()
            .collect();
        replies.sort_by_key(|r| r.id);
        Ok(replies)
    }

    async fn get_reaction_map(&self, viewer_id: i64, post_id: i64) -> Result<ReactionMaps, DaoError> {
        let tables = self.read()?;
        let mut maps = ReactionMaps::default();
        for vote in tables
            .comment_votes
            .iter()
            .filter(|v| v.user_id == viewer_id && v.post_id == post_id)
        {
            match vote.reply_id {
                Some(reply_id) => maps.replies.insert(reply_id, vote.state),
                None => maps.comments.insert(vote.comment_id, vote.state),
            };
        }
        Ok(maps)
    }

    async fn hot_tags(&self, viewer_id: Option<i64>, num: i64) -> Result<Vec<Topic>, DaoError> {
        let tables = self.read()?;
        Ok(ranked_tags(&tables, viewer_id, num, |row| (row.quote_num, row.id)))
    }

    async fn newest_tags(&self, viewer_id: Option<i64>, num: i64) -> Result<Vec<Topic>, DaoError> {
        let tables = self.read()?;
        Ok(ranked_tags(&tables, viewer_id, num, |row| (row.id, 0)))
    }

    async fn followed_tags(
        &self,
        user_id: i64,
        pinned_only: bool,
        num: i64,
    ) -> Result<Vec<Topic>, DaoError> {
        let tables = self.read()?;
        let mut topics: Vec<Topic> = tables
            .tag_follows
            .iter()
            .filter(|(u, _, pin)| *u == user_id && (!pinned_only || *pin))
            .filter_map(|follow| {
                tables
                    .tags
                    .iter()
                    .find(|row| row.id == follow.1)
                    .map(|row| topic(row, Some(follow)))
            })
            .collect();
        topics.sort_by_key(|t| Reverse((t.is_pin, t.quote_num, t.id)));
        topics.truncate(usize::try_from(num).unwrap_or(0));
        Ok(topics)
    }
}
