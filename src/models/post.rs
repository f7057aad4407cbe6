// src/models/post.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{comment::ReactionState, user::UserFormatted};

/// Who may see a post.
/// Stored as a SMALLINT in the 'posts.visibility' column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
    Friend,
    Following,
}

impl Visibility {
    pub const ALL: [Visibility; 4] = [
        Visibility::Public,
        Visibility::Private,
        Visibility::Friend,
        Visibility::Following,
    ];

    /// Unknown codes fall back to `Private`, so they are only ever shown to
    /// the author and admins.
    pub fn from_code(code: i16) -> Self {
        match code {
            0 => Visibility::Public,
            2 => Visibility::Friend,
            3 => Visibility::Following,
            _ => Visibility::Private,
        }
    }

    pub fn code(self) -> i16 {
        match self {
            Visibility::Public => 0,
            Visibility::Private => 1,
            Visibility::Friend => 2,
            Visibility::Following => 3,
        }
    }
}

/// Kind of a content fragment attached to a post or a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Title,
    Text,
    Image,
    Video,
    Audio,
    Link,
    File,
}

impl ContentType {
    /// Unrecognised codes are rendered as plain text.
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => ContentType::Title,
            3 => ContentType::Image,
            4 => ContentType::Video,
            5 => ContentType::Audio,
            6 => ContentType::Link,
            7 => ContentType::File,
            _ => ContentType::Text,
        }
    }

    pub fn code(self) -> i16 {
        match self {
            ContentType::Title => 1,
            ContentType::Text => 2,
            ContentType::Image => 3,
            ContentType::Video => 4,
            ContentType::Audio => 5,
            ContentType::Link => 6,
            ContentType::File => 7,
        }
    }

    pub fn is_media(self) -> bool {
        matches!(self, ContentType::Image | ContentType::Video)
    }
}

/// Represents the 'posts' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub visibility: i16,

    pub comment_count: i64,
    pub upvote_count: i64,
    pub collection_count: i64,
    pub share_count: i64,

    /// Pinned posts sort before everything else on the author's page.
    pub is_top: bool,
    /// Highlighted ("essence") posts.
    pub is_essence: bool,

    pub tags: Vec<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub modified_at: Option<chrono::DateTime<chrono::Utc>>,
    pub latest_replied_at: Option<chrono::DateTime<chrono::Utc>>,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Post {
    pub fn visibility(&self) -> Visibility {
        Visibility::from_code(self.visibility)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Represents the 'post_contents' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct PostContent {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    #[sqlx(rename = "type")]
    pub content_type: i16,
    /// Ordinal of the fragment within its post.
    pub sort: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostContentFormatted {
    pub id: i64,
    pub post_id: i64,
    pub content: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub sort: i64,
}

impl From<PostContent> for PostContentFormatted {
    fn from(row: PostContent) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            content: row.content,
            content_type: ContentType::from_code(row.content_type),
            sort: row.sort,
        }
    }
}

/// A post merged with its author, contents and the viewer's reaction.
#[derive(Debug, Clone, Serialize)]
pub struct PostFormatted {
    pub id: i64,
    pub user_id: i64,
    /// `None` only when the author row no longer exists.
    pub user: Option<UserFormatted>,
    pub contents: Vec<PostContentFormatted>,
    pub visibility: Visibility,

    pub comment_count: i64,
    pub upvote_count: i64,
    pub collection_count: i64,
    pub share_count: i64,
    pub is_top: bool,
    pub is_essence: bool,
    pub tags: Vec<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub modified_at: Option<chrono::DateTime<chrono::Utc>>,
    pub latest_replied_at: Option<chrono::DateTime<chrono::Utc>>,

    #[serde(flatten)]
    pub reaction: ReactionState,
}

impl PostFormatted {
    /// Formats a raw row without any joined data.
    pub fn from_row(post: Post) -> Self {
        Self {
            id: post.id,
            user_id: post.user_id,
            user: None,
            contents: Vec::new(),
            visibility: post.visibility(),
            comment_count: post.comment_count,
            upvote_count: post.upvote_count,
            collection_count: post.collection_count,
            share_count: post.share_count,
            is_top: post.is_top,
            is_essence: post.is_essence,
            tags: post.tags,
            created_at: post.created_at,
            modified_at: post.modified_at,
            latest_replied_at: post.latest_replied_at,
            reaction: ReactionState::default(),
        }
    }
}
