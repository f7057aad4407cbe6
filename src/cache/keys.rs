//! Cache key derivation.
//!
//! A key encodes exactly the inputs that change the set of rows a listing
//! returns. Each resource kind owns a distinct prefix from `KeyPrefixes`, so
//! keys of two kinds can never meet.

use std::fmt;

use crate::{
    config::KeyPrefixes,
    models::query::{CommentStyle, IndexStyle, UserPostsStyle},
    services::{pagination::PageRequest, visibility::VisitorRelation},
};

/// Identity token of an unauthenticated viewer.
///
/// Usernames are rendered as `@name`, so no username can produce it.
pub const GUEST_TOKEN: &str = "_";

/// Opaque, comparable cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Everything a listing request contributes to its cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRequest<'a> {
    /// Home timeline. `viewer` is the username of the requester.
    Index {
        style: IndexStyle,
        viewer: Option<&'a str>,
        page: PageRequest,
    },
    /// A listing on a user's page.
    User {
        target_id: i64,
        style: UserPostsStyle,
        relation: VisitorRelation,
        viewer: Option<&'a str>,
        page: PageRequest,
    },
    /// One page of a post's comment thread.
    Thread {
        post_id: i64,
        style: CommentStyle,
        page: PageRequest,
    },
    /// Search results are never cached.
    Search,
}

#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    prefixes: KeyPrefixes,
}

fn identity(viewer: Option<&str>) -> String {
    match viewer {
        Some(username) => format!("@{}", username),
        None => GUEST_TOKEN.to_owned(),
    }
}

impl CacheKeyBuilder {
    pub fn new(prefixes: KeyPrefixes) -> Self {
        Self { prefixes }
    }

    /// `None` means the request bypasses the cache.
    pub fn build(&self, request: &KeyRequest<'_>) -> Option<CacheKey> {
        let key = match *request {
            KeyRequest::Index {
                style,
                viewer,
                page,
            } => {
                let prefix = match style {
                    IndexStyle::Newest => &self.prefixes.index_newest,
                    IndexStyle::Hots => &self.prefixes.index_hots,
                    IndexStyle::Following => &self.prefixes.index_following,
                };
                format!(
                    "{}{}:{}:{}",
                    prefix,
                    identity(viewer),
                    page.offset(),
                    page.limit()
                )
            }
            KeyRequest::User {
                target_id,
                style,
                relation,
                viewer,
                page,
            } => {
                // Own comments and stars depend on who is asking, the other
                // listings only on how the asker relates to the target.
                let scope = match style {
                    UserPostsStyle::Post | UserPostsStyle::Highlight | UserPostsStyle::Media => {
                        relation.as_str().to_owned()
                    }
                    UserPostsStyle::Comment | UserPostsStyle::Star => identity(viewer),
                };
                format!(
                    "{}{}:{}:{}:{}:{}",
                    self.prefixes.user_tweets,
                    target_id,
                    style.as_str(),
                    scope,
                    page.page,
                    page.page_size
                )
            }
            KeyRequest::Thread {
                post_id,
                style,
                page,
            } => format!(
                "{}{}:{}:{}:{}",
                self.prefixes.tweet_comments,
                post_id,
                style.as_str(),
                page.limit(),
                page.offset()
            ),
            KeyRequest::Search => return None,
        };
        Some(CacheKey(key))
    }
}
