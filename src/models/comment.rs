use std::collections::HashMap;

use serde::Serialize;
use sqlx::FromRow;

use crate::models::{post::ContentType, user::UserFormatted};

/// A viewer's vote on a post, comment or reply.
/// A missing vote row means neutral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReactionState {
    pub is_upvoted: bool,
    pub is_downvoted: bool,
}

/// Represents the 'comments' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub ip_loc: String,
    pub thumbs_up_count: i64,
    pub thumbs_down_count: i64,
    pub reply_count: i64,
    pub is_essence: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'comment_contents' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct CommentContent {
    pub id: i64,
    pub comment_id: i64,
    pub user_id: i64,
    pub content: String,
    #[sqlx(rename = "type")]
    pub content_type: i16,
    pub sort: i64,
}

/// Represents the 'comment_replies' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct CommentReply {
    pub id: i64,
    pub comment_id: i64,
    pub user_id: i64,
    /// The user this reply is addressed to, if any.
    pub at_user_id: Option<i64>,
    pub content: String,
    pub ip_loc: String,
    pub thumbs_up_count: i64,
    pub thumbs_down_count: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A viewer's votes within one post's thread, split by target kind.
#[derive(Debug, Clone, Default)]
pub struct ReactionMaps {
    pub comments: HashMap<i64, ReactionState>,
    pub replies: HashMap<i64, ReactionState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentContentFormatted {
    pub id: i64,
    pub comment_id: i64,
    pub content: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub sort: i64,
}

impl From<CommentContent> for CommentContentFormatted {
    fn from(row: CommentContent) -> Self {
        Self {
            id: row.id,
            comment_id: row.comment_id,
            content: row.content,
            content_type: ContentType::from_code(row.content_type),
            sort: row.sort,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyFormatted {
    pub id: i64,
    pub comment_id: i64,
    pub user: Option<UserFormatted>,
    pub at_user: Option<UserFormatted>,
    pub content: String,
    pub ip_loc: String,
    pub thumbs_up_count: i64,
    pub thumbs_down_count: i64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(flatten)]
    pub reaction: ReactionState,
}

impl ReplyFormatted {
    pub fn from_row(reply: CommentReply) -> Self {
        Self {
            id: reply.id,
            comment_id: reply.comment_id,
            user: None,
            at_user: None,
            content: reply.content,
            ip_loc: reply.ip_loc,
            thumbs_up_count: reply.thumbs_up_count,
            thumbs_down_count: reply.thumbs_down_count,
            created_at: reply.created_at,
            reaction: ReactionState::default(),
        }
    }
}

/// A top-level comment with its author, contents, replies and the viewer's vote.
#[derive(Debug, Clone, Serialize)]
pub struct CommentFormatted {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub user: Option<UserFormatted>,
    pub contents: Vec<CommentContentFormatted>,
    /// Always present; empty when nobody replied.
    pub replies: Vec<ReplyFormatted>,
    pub ip_loc: String,
    pub thumbs_up_count: i64,
    pub thumbs_down_count: i64,
    pub reply_count: i64,
    pub is_essence: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(flatten)]
    pub reaction: ReactionState,
}

impl CommentFormatted {
    pub fn from_row(comment: Comment) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            user: None,
            contents: Vec::new(),
            replies: Vec::new(),
            ip_loc: comment.ip_loc,
            thumbs_up_count: comment.thumbs_up_count,
            thumbs_down_count: comment.thumbs_down_count,
            reply_count: comment.reply_count,
            is_essence: comment.is_essence,
            created_at: comment.created_at,
            reaction: ReactionState::default(),
        }
    }
}
