//! Data-source port.
//!
//! Everything the read path needs from the relational store. Batched lookups
//! take id slices so assemblers can join a whole page in one round trip.

pub mod postgres;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    comment::{Comment, CommentContent, CommentReply, ReactionMaps, ReactionState},
    post::{Post, PostContent, Visibility},
    query::{CommentStyle, SearchType},
    tag::Topic,
    user::User,
};

pub use postgres::PgContentSource;

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// A page of rows plus the total number of rows matching the query.
pub type Paged<T> = (Vec<T>, i64);

#[async_trait]
pub trait ContentSource: Send + Sync {
    // Post listings. `tiers` restricts the visibility codes returned.

    async fn list_index_newest(&self, limit: i64, offset: i64) -> Result<Paged<Post>, DaoError>;

    async fn list_index_hots(&self, limit: i64, offset: i64) -> Result<Paged<Post>, DaoError>;

    /// The viewer's own posts plus what followed users and friends let them see.
    async fn list_following(
        &self,
        viewer_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError>;

    async fn list_user_posts(
        &self,
        user_id: i64,
        tiers: &[Visibility],
        highlight_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError>;

    async fn list_user_media(
        &self,
        user_id: i64,
        tiers: &[Visibility],
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError>;

    /// Posts `user_id` commented on.
    async fn list_user_commented(
        &self,
        user_id: i64,
        tiers: &[Visibility],
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError>;

    /// Posts `user_id` starred, most recent star first.
    async fn list_user_stars(
        &self,
        user_id: i64,
        tiers: &[Visibility],
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError>;

    /// Public posts matching a free-text query or a tag.
    async fn search_posts(
        &self,
        query: &str,
        search_type: SearchType,
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError>;

    /// A live (not soft-deleted) post.
    async fn get_post(&self, id: i64) -> Result<Option<Post>, DaoError>;

    async fn get_post_contents_by_ids(&self, post_ids: &[i64]) -> Result<Vec<PostContent>, DaoError>;

    async fn get_post_reactions(
        &self,
        viewer_id: i64,
        post_ids: &[i64],
    ) -> Result<HashMap<i64, ReactionState>, DaoError>;

    // Users and relationships.

    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, DaoError>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DaoError>;

    async fn is_friend(&self, user_id: i64, other_id: i64) -> Result<bool, DaoError>;

    async fn is_following(&self, user_id: i64, other_id: i64) -> Result<bool, DaoError>;

    /// The subset of `ids` that are friends of `user_id`.
    async fn friend_ids_among(&self, user_id: i64, ids: &[i64]) -> Result<HashSet<i64>, DaoError>;

    /// The subset of `ids` that `user_id` follows.
    async fn following_ids_among(
        &self,
        user_id: i64,
        ids: &[i64],
    ) -> Result<HashSet<i64>, DaoError>;

    /// `(followers, following)` of a user.
    async fn follow_counts(&self, user_id: i64) -> Result<(i64, i64), DaoError>;

    // Comment threads.

    async fn list_comments(
        &self,
        post_id: i64,
        style: CommentStyle,
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Comment>, DaoError>;

    async fn get_comment_contents_by_ids(
        &self,
        comment_ids: &[i64],
    ) -> Result<Vec<CommentContent>, DaoError>;

    /// All live replies of the given comments, oldest first.
    async fn get_comment_replies_by_ids(
        &self,
        comment_ids: &[i64],
    ) -> Result<Vec<CommentReply>, DaoError>;

    /// The viewer's votes on every comment and reply under one post.
    async fn get_reaction_map(&self, viewer_id: i64, post_id: i64)
    -> Result<ReactionMaps, DaoError>;

    // Topics.

    async fn hot_tags(&self, viewer_id: Option<i64>, num: i64) -> Result<Vec<Topic>, DaoError>;

    async fn newest_tags(&self, viewer_id: Option<i64>, num: i64) -> Result<Vec<Topic>, DaoError>;

    async fn followed_tags(
        &self,
        user_id: i64,
        pinned_only: bool,
        num: i64,
    ) -> Result<Vec<Topic>, DaoError>;
}

/// Distinct ids in first-seen order.
pub fn distinct_ids(ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_ids_keeps_first_occurrence_order() {
        assert_eq!(distinct_ids([3, 1, 3, 2, 1]), vec![3, 1, 2]);
        assert!(distinct_ids(Vec::new()).is_empty());
    }
}
