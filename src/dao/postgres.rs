//! `ContentSource` backed by PostgreSQL.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::PgPool;

use super::{ContentSource, DaoError, Paged};
use crate::{
    models::{
        comment::{Comment, CommentContent, CommentReply, ReactionMaps, ReactionState},
        post::{ContentType, Post, PostContent, Visibility},
        query::{CommentStyle, SearchType},
        tag::Topic,
        user::User,
    },
    services::visibility::VisitorRelation,
};

const POST_COLUMNS: &str = "p.id, p.user_id, p.visibility, p.comment_count, p.upvote_count, \
     p.collection_count, p.share_count, p.is_top, p.is_essence, p.tags, \
     p.created_at, p.modified_at, p.latest_replied_at, p.deleted_at";

const USER_COLUMNS: &str =
    "id, username, nickname, avatar, status, is_admin, tweets_count, created_at";

const TOPIC_COLUMNS: &str = "t.id, t.user_id, t.tag, t.quote_num";

fn codes(tiers: &[Visibility]) -> Vec<i16> {
    tiers.iter().map(|tier| tier.code()).collect()
}

#[derive(Clone)]
pub struct PgContentSource {
    pool: PgPool,
}

impl PgContentSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs `SELECT <posts> FROM posts p <tail>` and `SELECT COUNT(*) ...`
    /// over the same filter. `$1`.. are the filter binds, followed by limit
    /// and offset for the page query.
    async fn paged_posts(
        &self,
        from_where: &str,
        order_by: &str,
        binds: PostBinds<'_>,
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError> {
        let next = binds.len() + 1;
        let sql = format!(
            "SELECT {POST_COLUMNS} {from_where} ORDER BY {order_by} LIMIT ${} OFFSET ${}",
            next,
            next + 1
        );
        let count_sql = format!("SELECT COUNT(*) {from_where}");

        let query = binds.apply_as(sqlx::query_as::<_, Post>(&sql));
        let posts = query.bind(limit).bind(offset).fetch_all(&self.pool).await?;

        let total = binds
            .apply_scalar(sqlx::query_scalar::<_, i64>(&count_sql))
            .fetch_one(&self.pool)
            .await?;

        Ok((posts, total))
    }
}

/// Positional binds shared by a page query and its count query.
#[derive(Clone, Copy)]
enum PostBinds<'a> {
    None,
    User(i64, &'a [i16]),
    UserFlag(i64, &'a [i16], bool),
    UserTypes(i64, &'a [i16], &'a [i16]),
    Following(i64, &'a [i16], &'a [i16]),
    Text(&'a str),
}

type PgQueryAs<'q, T> = sqlx::query::QueryAs<'q, sqlx::Postgres, T, sqlx::postgres::PgArguments>;
type PgQueryScalar<'q, T> =
    sqlx::query::QueryScalar<'q, sqlx::Postgres, T, sqlx::postgres::PgArguments>;

impl<'a> PostBinds<'a> {
    fn len(&self) -> usize {
        match self {
            PostBinds::None => 0,
            PostBinds::Text(_) => 1,
            PostBinds::User(..) => 2,
            PostBinds::UserFlag(..) | PostBinds::UserTypes(..) | PostBinds::Following(..) => 3,
        }
    }

    fn apply_as<'q, T>(self, query: PgQueryAs<'q, T>) -> PgQueryAs<'q, T>
    where
        'a: 'q,
    {
        match self {
            PostBinds::None => query,
            PostBinds::Text(text) => query.bind(text),
            PostBinds::User(id, tiers) => query.bind(id).bind(tiers),
            PostBinds::UserFlag(id, tiers, flag) => query.bind(id).bind(tiers).bind(flag),
            PostBinds::UserTypes(id, tiers, types) => query.bind(id).bind(tiers).bind(types),
            PostBinds::Following(id, follow, friend) => query.bind(id).bind(follow).bind(friend),
        }
    }

    fn apply_scalar<'q, T>(self, query: PgQueryScalar<'q, T>) -> PgQueryScalar<'q, T>
    where
        'a: 'q,
    {
        match self {
            PostBinds::None => query,
            PostBinds::Text(text) => query.bind(text),
            PostBinds::User(id, tiers) => query.bind(id).bind(tiers),
            PostBinds::UserFlag(id, tiers, flag) => query.bind(id).bind(tiers).bind(flag),
            PostBinds::UserTypes(id, tiers, types) => query.bind(id).bind(tiers).bind(types),
            PostBinds::Following(id, follow, friend) => query.bind(id).bind(follow).bind(friend),
        }
    }
}

#[async_trait]
impl ContentSource for PgContentSource {
    async fn list_index_newest(&self, limit: i64, offset: i64) -> Result<Paged<Post>, DaoError> {
        self.paged_posts(
            "FROM posts p WHERE p.deleted_at IS NULL AND p.visibility = 0",
            "p.id DESC",
            PostBinds::None,
            limit,
            offset,
        )
        .await
    }

    async fn list_index_hots(&self, limit: i64, offset: i64) -> Result<Paged<Post>, DaoError> {
        self.paged_posts(
            "FROM posts p WHERE p.deleted_at IS NULL AND p.visibility = 0",
            "p.comment_count DESC, p.latest_replied_at DESC, p.id DESC",
            PostBinds::None,
            limit,
            offset,
        )
        .await
    }

    async fn list_following(
        &self,
        viewer_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError> {
        let follow_tiers = codes(&VisitorRelation::Following.visible_tiers());
        let friend_tiers = codes(&VisitorRelation::Friend.visible_tiers());
        self.paged_posts(
            "FROM posts p WHERE p.deleted_at IS NULL AND ( \
                 p.user_id = $1 \
                 OR (p.visibility = ANY($2) AND p.user_id IN (SELECT follow_id FROM follows WHERE user_id = $1)) \
                 OR (p.visibility = ANY($3) AND p.user_id IN (SELECT friend_id FROM friends WHERE user_id = $1)) \
             )",
            "p.id DESC",
            PostBinds::Following(viewer_id, &follow_tiers, &friend_tiers),
            limit,
            offset,
        )
        .await
    }

    async fn list_user_posts(
        &self,
        user_id: i64,
        tiers: &[Visibility],
        highlight_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError> {
        let tiers = codes(tiers);
        self.paged_posts(
            "FROM posts p WHERE p.user_id = $1 AND p.deleted_at IS NULL \
             AND p.visibility = ANY($2) AND ($3 = FALSE OR p.is_essence)",
            "p.is_top DESC, p.id DESC",
            PostBinds::UserFlag(user_id, &tiers, highlight_only),
            limit,
            offset,
        )
        .await
    }

    async fn list_user_media(
        &self,
        user_id: i64,
        tiers: &[Visibility],
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError> {
        let tiers = codes(tiers);
        let media: Vec<i16> = [ContentType::Image, ContentType::Video]
            .iter()
            .map(|kind| kind.code())
            .collect();
        self.paged_posts(
            "FROM posts p WHERE p.user_id = $1 AND p.deleted_at IS NULL \
             AND p.visibility = ANY($2) AND EXISTS ( \
                 SELECT 1 FROM post_contents c \
                 WHERE c.post_id = p.id AND c.deleted_at IS NULL AND c.type = ANY($3) \
             )",
            "p.id DESC",
            PostBinds::UserTypes(user_id, &tiers, &media),
            limit,
            offset,
        )
        .await
    }

    async fn list_user_commented(
        &self,
        user_id: i64,
        tiers: &[Visibility],
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError> {
        let tiers = codes(tiers);
        self.paged_posts(
            "FROM posts p WHERE p.deleted_at IS NULL AND p.visibility = ANY($2) \
             AND p.id IN (SELECT post_id FROM comments WHERE user_id = $1 AND deleted_at IS NULL)",
            "p.latest_replied_at DESC, p.id DESC",
            PostBinds::User(user_id, &tiers),
            limit,
            offset,
        )
        .await
    }

    async fn list_user_stars(
        &self,
        user_id: i64,
        tiers: &[Visibility],
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError> {
        let tiers = codes(tiers);
        self.paged_posts(
            "FROM post_reactions r JOIN posts p ON p.id = r.post_id \
             WHERE r.user_id = $1 AND r.is_upvoted AND p.deleted_at IS NULL \
             AND p.visibility = ANY($2)",
            "r.created_at DESC, p.id DESC",
            PostBinds::User(user_id, &tiers),
            limit,
            offset,
        )
        .await
    }

    async fn search_posts(
        &self,
        query: &str,
        search_type: SearchType,
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Post>, DaoError> {
        let from_where = match search_type {
            SearchType::Search => {
                "FROM posts p WHERE p.deleted_at IS NULL AND p.visibility = 0 AND EXISTS ( \
                     SELECT 1 FROM post_contents c \
                     WHERE c.post_id = p.id AND c.deleted_at IS NULL AND c.type IN (1, 2) \
                     AND strpos(lower(c.content), lower($1)) > 0 \
                 )"
            }
            SearchType::Tag => {
                "FROM posts p WHERE p.deleted_at IS NULL AND p.visibility = 0 AND $1 = ANY(p.tags)"
            }
        };
        self.paged_posts(from_where, "p.id DESC", PostBinds::Text(query), limit, offset)
            .await
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, DaoError> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1 AND p.deleted_at IS NULL");
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn get_post_contents_by_ids(&self, post_ids: &[i64]) -> Result<Vec<PostContent>, DaoError> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let contents = sqlx::query_as::<_, PostContent>(
            r#"
            SELECT id, post_id, user_id, content, type, sort
            FROM post_contents
            WHERE post_id = ANY($1) AND deleted_at IS NULL
            ORDER BY post_id, sort, id
            "#,
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(contents)
    }

    async fn get_post_reactions(
        &self,
        viewer_id: i64,
        post_ids: &[i64],
    ) -> Result<HashMap<i64, ReactionState>, DaoError> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, (i64, bool, bool)>(
            "SELECT post_id, is_upvoted, is_downvoted FROM post_reactions \
             WHERE user_id = $1 AND post_id = ANY($2)",
        )
        .bind(viewer_id)
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(post_id, is_upvoted, is_downvoted)| {
                (
                    post_id,
                    ReactionState {
                        is_upvoted,
                        is_downvoted,
                    },
                )
            })
            .collect())
    }

    async fn get_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, DaoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)");
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DaoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn is_friend(&self, user_id: i64, other_id: i64) -> Result<bool, DaoError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM friends WHERE user_id = $1 AND friend_id = $2)",
        )
        .bind(user_id)
        .bind(other_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn is_following(&self, user_id: i64, other_id: i64) -> Result<bool, DaoError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE user_id = $1 AND follow_id = $2)",
        )
        .bind(user_id)
        .bind(other_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn friend_ids_among(&self, user_id: i64, ids: &[i64]) -> Result<HashSet<i64>, DaoError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT friend_id FROM friends WHERE user_id = $1 AND friend_id = ANY($2)",
        )
        .bind(user_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(found.into_iter().collect())
    }

    async fn following_ids_among(
        &self,
        user_id: i64,
        ids: &[i64],
    ) -> Result<HashSet<i64>, DaoError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT follow_id FROM follows WHERE user_id = $1 AND follow_id = ANY($2)",
        )
        .bind(user_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(found.into_iter().collect())
    }

    async fn follow_counts(&self, user_id: i64) -> Result<(i64, i64), DaoError> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM follows WHERE follow_id = $1) AS followers,
                (SELECT COUNT(*) FROM follows WHERE user_id = $1) AS following
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(counts)
    }

    async fn list_comments(
        &self,
        post_id: i64,
        style: CommentStyle,
        limit: i64,
        offset: i64,
    ) -> Result<Paged<Comment>, DaoError> {
        let order_by = match style {
            CommentStyle::Default => "is_essence DESC, id ASC",
            CommentStyle::Hots => "thumbs_up_count DESC, id DESC",
            CommentStyle::Newest => "id DESC",
        };
        let sql = format!(
            "SELECT id, post_id, user_id, ip_loc, thumbs_up_count, thumbs_down_count, \
                    reply_count, is_essence, created_at \
             FROM comments WHERE post_id = $1 AND deleted_at IS NULL \
             ORDER BY {order_by} LIMIT $2 OFFSET $3"
        );
        let comments = sqlx::query_as::<_, Comment>(&sql)
            .bind(post_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND deleted_at IS NULL",
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((comments, total))
    }

    async fn get_comment_contents_by_ids(
        &self,
        comment_ids: &[i64],
    ) -> Result<Vec<CommentContent>, DaoError> {
        if comment_ids.is_empty() {
            return Ok(Vec::new());
        }
        let contents = sqlx::query_as::<_, CommentContent>(
            r#"
            SELECT id, comment_id, user_id, content, type, sort
            FROM comment_contents
            WHERE comment_id = ANY($1) AND deleted_at IS NULL
            ORDER BY comment_id, sort, id
            "#,
        )
        .bind(comment_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(contents)
    }

    async fn get_comment_replies_by_ids(
        &self,
        comment_ids: &[i64],
    ) -> Result<Vec<CommentReply>, DaoError> {
        if comment_ids.is_empty() {
            return Ok(Vec::new());
        }
        let replies = sqlx::query_as::<_, CommentReply>(
            r#"
            SELECT id, comment_id, user_id, at_user_id, content, ip_loc,
                   thumbs_up_count, thumbs_down_count, created_at
            FROM comment_replies
            WHERE comment_id = ANY($1) AND deleted_at IS NULL
            ORDER BY id ASC
            "#,
        )
        .bind(comment_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(replies)
    }

    async fn get_reaction_map(&self, viewer_id: i64, post_id: i64) -> Result<ReactionMaps, DaoError> {
        let rows = sqlx::query_as::<_, (i64, Option<i64>, bool, bool)>(
            "SELECT comment_id, reply_id, is_upvoted, is_downvoted FROM comment_reactions \
             WHERE user_id = $1 AND post_id = $2",
        )
        .bind(viewer_id)
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        let mut maps = ReactionMaps::default();
        for (comment_id, reply_id, is_upvoted, is_downvoted) in rows {
            let state = ReactionState {
                is_upvoted,
                is_downvoted,
            };
            match reply_id {
                Some(reply_id) => maps.replies.insert(reply_id, state),
                None => maps.comments.insert(comment_id, state),
            };
        }
        Ok(maps)
    }

    async fn hot_tags(&self, viewer_id: Option<i64>, num: i64) -> Result<Vec<Topic>, DaoError> {
        self.tags_with_follow_state(viewer_id, "t.quote_num DESC, t.id DESC", num)
            .await
    }

    async fn newest_tags(&self, viewer_id: Option<i64>, num: i64) -> Result<Vec<Topic>, DaoError> {
        self.tags_with_follow_state(viewer_id, "t.id DESC", num).await
    }

    async fn followed_tags(
        &self,
        user_id: i64,
        pinned_only: bool,
        num: i64,
    ) -> Result<Vec<Topic>, DaoError> {
        let sql = format!(
            "SELECT {TOPIC_COLUMNS}, TRUE AS is_following, tf.is_pin \
             FROM tags t JOIN tag_follows tf ON tf.tag_id = t.id \
             WHERE tf.user_id = $1 AND t.deleted_at IS NULL AND ($2 = FALSE OR tf.is_pin) \
             ORDER BY tf.is_pin DESC, t.quote_num DESC, t.id DESC LIMIT $3"
        );
        let topics = sqlx::query_as::<_, Topic>(&sql)
            .bind(user_id)
            .bind(pinned_only)
            .bind(num)
            .fetch_all(&self.pool)
            .await?;
        Ok(topics)
    }
}

impl PgContentSource {
    async fn tags_with_follow_state(
        &self,
        viewer_id: Option<i64>,
        order_by: &str,
        num: i64,
    ) -> Result<Vec<Topic>, DaoError> {
        let sql = format!(
            "SELECT {TOPIC_COLUMNS}, (tf.user_id IS NOT NULL) AS is_following, \
                    COALESCE(tf.is_pin, FALSE) AS is_pin \
             FROM tags t LEFT JOIN tag_follows tf ON tf.tag_id = t.id AND tf.user_id = $1 \
             WHERE t.deleted_at IS NULL \
             ORDER BY {order_by} LIMIT $2"
        );
        let topics = sqlx::query_as::<_, Topic>(&sql)
            .bind(viewer_id)
            .bind(num)
            .fetch_all(&self.pool)
            .await?;
        Ok(topics)
    }
}
