use serde::Serialize;
use sqlx::FromRow;

/// A topic tag joined with the viewer's follow state.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Topic {
    pub id: i64,
    pub user_id: i64,
    pub tag: String,
    /// Number of live posts quoting this tag.
    pub quote_num: i64,
    /// Whether the viewer follows the tag. Always false for anonymous viewers.
    pub is_following: bool,
    /// Whether the viewer pinned the tag.
    pub is_pin: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct TopicList {
    pub topics: Vec<Topic>,
    pub extral_topics: Vec<Topic>,
}
