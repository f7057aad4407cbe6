// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    pub nickname: String,
    pub avatar: String,

    /// 1 = active, 2 = suspended.
    pub status: i16,

    pub is_admin: bool,

    /// Denormalized count of live posts.
    pub tweets_count: i64,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl User {
    /// Author view without any viewer-relative flags.
    pub fn format(&self) -> UserFormatted {
        UserFormatted {
            id: self.id,
            username: self.username.clone(),
            nickname: self.nickname.clone(),
            avatar: self.avatar.clone(),
            is_admin: self.is_admin,
            is_friend: false,
            is_following: false,
        }
    }
}

/// Author view embedded in posts, comments and replies.
///
/// `is_friend` and `is_following` are relative to the requesting viewer and
/// recomputed for every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFormatted {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub avatar: String,
    pub is_admin: bool,
    pub is_friend: bool,
    pub is_following: bool,
}

/// The authenticated requester, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

/// Public profile page of a user.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub avatar: String,
    pub status: i16,
    pub is_admin: bool,
    pub is_friend: bool,
    pub is_following: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub follows: i64,
    pub followings: i64,
    pub tweets_count: i64,
}
