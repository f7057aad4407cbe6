// src/models/query.rs

use std::{fmt, str::FromStr};

use serde::Deserialize;
use validator::Validate;

/// Returned when a `style`/`type` discriminator names nothing we serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStyle(pub String);

impl fmt::Display for UnknownStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown style '{}'", self.0)
    }
}

impl std::error::Error for UnknownStyle {}

/// Home timeline feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexStyle {
    Newest,
    Hots,
    Following,
}

impl FromStr for IndexStyle {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(IndexStyle::Newest),
            "hots" => Ok(IndexStyle::Hots),
            "following" => Ok(IndexStyle::Following),
            other => Err(UnknownStyle(other.to_owned())),
        }
    }
}

/// Listings shown on a user's page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserPostsStyle {
    /// Posts the user wrote.
    Post,
    /// Posts the user commented on.
    Comment,
    /// The user's highlighted posts.
    Highlight,
    /// The user's posts carrying images or videos.
    Media,
    /// Posts the user starred.
    Star,
}

impl UserPostsStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            UserPostsStyle::Post => "post",
            UserPostsStyle::Comment => "comment",
            UserPostsStyle::Highlight => "highlight",
            UserPostsStyle::Media => "media",
            UserPostsStyle::Star => "star",
        }
    }
}

impl FromStr for UserPostsStyle {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(UserPostsStyle::Post),
            "comment" => Ok(UserPostsStyle::Comment),
            "highlight" => Ok(UserPostsStyle::Highlight),
            "media" => Ok(UserPostsStyle::Media),
            "star" => Ok(UserPostsStyle::Star),
            other => Err(UnknownStyle(other.to_owned())),
        }
    }
}

/// Sort order of a post's comment thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentStyle {
    /// Highlighted comments first, then oldest first.
    Default,
    /// Most up-voted first.
    Hots,
    /// Newest first.
    Newest,
}

impl CommentStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentStyle::Default => "default",
            CommentStyle::Hots => "hots",
            CommentStyle::Newest => "newest",
        }
    }
}

impl FromStr for CommentStyle {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(CommentStyle::Default),
            "hots" => Ok(CommentStyle::Hots),
            "newest" => Ok(CommentStyle::Newest),
            other => Err(UnknownStyle(other.to_owned())),
        }
    }
}

/// How a timeline search query is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    /// Free text over post contents.
    Search,
    /// Exact topic tag.
    Tag,
}

impl FromStr for SearchType {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search" => Ok(SearchType::Search),
            "tag" => Ok(SearchType::Tag),
            other => Err(UnknownStyle(other.to_owned())),
        }
    }
}

/// Topic list variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    Hot,
    New,
    Follow,
    Pin,
    /// Hot topics plus the viewer's followed topics.
    HotExtral,
}

impl FromStr for TagType {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hot" => Ok(TagType::Hot),
            "new" => Ok(TagType::New),
            "follow" => Ok(TagType::Follow),
            "pin" => Ok(TagType::Pin),
            "hot_extral" => Ok(TagType::HotExtral),
            other => Err(UnknownStyle(other.to_owned())),
        }
    }
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

fn default_index_style() -> String {
    "newest".to_owned()
}

fn default_search_type() -> String {
    "search".to_owned()
}

fn default_user_posts_style() -> String {
    "post".to_owned()
}

fn default_comment_style() -> String {
    "default".to_owned()
}

fn default_tag_type() -> String {
    "hot".to_owned()
}

fn default_tag_num() -> i64 {
    10
}

/// Query parameters for `/v1/posts`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TimelineParams {
    /// Empty means "home feed"; anything else runs a search.
    #[serde(default)]
    #[validate(length(max = 128, message = "Query must be at most 128 characters"))]
    pub query: String,

    #[serde(rename = "type", default = "default_search_type")]
    pub search_type: String,

    #[serde(default = "default_index_style")]
    pub style: String,

    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "Page starts at 1"))]
    pub page: i64,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 50, message = "Page size must be between 1 and 50"))]
    pub page_size: i64,
}

/// Query parameters for `/v1/user/posts`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserPostsParams {
    #[validate(length(min = 1, max = 50, message = "Username length must be between 1 and 50"))]
    pub username: String,

    #[serde(default = "default_user_posts_style")]
    pub style: String,

    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "Page starts at 1"))]
    pub page: i64,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 50, message = "Page size must be between 1 and 50"))]
    pub page_size: i64,
}

/// Query parameters for `/v1/post/comments`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommentsParams {
    /// The post whose thread is listed.
    #[validate(range(min = 1))]
    pub id: i64,

    #[serde(default = "default_comment_style")]
    pub style: String,

    #[serde(default = "default_page")]
    #[validate(range(min = 1, message = "Page starts at 1"))]
    pub page: i64,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 50, message = "Page size must be between 1 and 50"))]
    pub page_size: i64,
}

/// Query parameters for `/v1/post`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PostDetailParams {
    #[validate(range(min = 1))]
    pub id: i64,
}

/// Query parameters for `/v1/user/profile`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProfileParams {
    #[validate(length(min = 1, max = 50, message = "Username length must be between 1 and 50"))]
    pub username: String,
}

/// Query parameters for `/v1/tags`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TopicParams {
    #[serde(rename = "type", default = "default_tag_type")]
    pub tag_type: String,

    #[serde(default = "default_tag_num")]
    #[validate(range(min = 1, max = 50))]
    pub num: i64,

    /// Size of the followed-topics list for `hot_extral`; `<= 0` reuses `num`.
    #[serde(default)]
    #[validate(range(max = 50))]
    pub extral_num: i64,
}
