//! Post hydration and per-item visibility filtering.

use std::{collections::HashMap, sync::Arc};

use thiserror::Error;

use crate::{
    dao::{ContentSource, DaoError, Paged, distinct_ids},
    models::{
        post::{Post, PostContentFormatted, PostFormatted},
        user::{User, Viewer},
    },
    services::{
        pagination::{PageEnvelope, PageRequest},
        visibility::{PermissionDenied, Ties, can_read, ensure_visible},
    },
};

#[derive(Debug, Error)]
pub enum DetailError {
    #[error("post not found")]
    NotFound,
    #[error("post is not visible to the viewer")]
    Denied(PermissionDenied),
    #[error(transparent)]
    Source(#[from] DaoError),
}

/// The viewer's ties to the author of an already hydrated post.
fn ties_to_author(post: &PostFormatted) -> Ties {
    post.user
        .as_ref()
        .map(|user| Ties {
            is_friend: user.is_friend,
            is_following: user.is_following,
        })
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct FeedAssembler {
    source: Arc<dyn ContentSource>,
}

impl FeedAssembler {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self { source }
    }

    /// Attaches authors, content fragments and the viewer's reactions.
    ///
    /// Output order equals input order. Every join is a single batched lookup;
    /// anonymous viewers skip the reaction and relationship lookups.
    pub async fn merge_posts(
        &self,
        posts: Vec<Post>,
        viewer: Option<&Viewer>,
    ) -> Result<Vec<PostFormatted>, DaoError> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids = distinct_ids(posts.iter().map(|p| p.id));
        let author_ids = distinct_ids(posts.iter().map(|p| p.user_id));

        let users: HashMap<i64, User> = self
            .source
            .get_users_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        let mut contents: HashMap<i64, Vec<PostContentFormatted>> = HashMap::new();
        for content in self.source.get_post_contents_by_ids(&post_ids).await? {
            contents
                .entry(content.post_id)
                .or_default()
                .push(content.into());
        }
        for fragments in contents.values_mut() {
            fragments.sort_by_key(|c| (c.sort, c.id));
        }

        let (reactions, friends, followings) = match viewer {
            Some(viewer) => (
                self.source.get_post_reactions(viewer.id, &post_ids).await?,
                self.source.friend_ids_among(viewer.id, &author_ids).await?,
                self.source.following_ids_among(viewer.id, &author_ids).await?,
            ),
            None => Default::default(),
        };

        Ok(posts
            .into_iter()
            .map(|post| {
                let mut formatted = PostFormatted::from_row(post);
                formatted.user = users.get(&formatted.user_id).map(|user| {
                    let mut author = user.format();
                    author.is_friend = friends.contains(&user.id);
                    author.is_following = followings.contains(&user.id);
                    author
                });
                formatted.contents = contents.get(&formatted.id).cloned().unwrap_or_default();
                if let Some(reaction) = reactions.get(&formatted.id) {
                    formatted.reaction = *reaction;
                }
                formatted
            })
            .collect())
    }

    /// Hydrates `posts` and silently drops the ones the viewer may not see.
    pub async fn assemble(
        &self,
        posts: Vec<Post>,
        viewer: Option<&Viewer>,
    ) -> Result<Vec<PostFormatted>, DaoError> {
        let merged = self.merge_posts(posts, viewer).await?;
        Ok(merged
            .into_iter()
            .filter(|post| can_read(post.visibility, viewer, post.user_id, ties_to_author(post)))
            .collect())
    }

    pub async fn page(
        &self,
        (posts, total_rows): Paged<Post>,
        page: PageRequest,
        viewer: Option<&Viewer>,
    ) -> Result<PageEnvelope<PostFormatted>, DaoError> {
        let items = self.assemble(posts, viewer).await?;
        Ok(PageEnvelope::build(items, page, total_rows))
    }

    /// A single post, gated. Hidden posts are reported as denied, not missing.
    pub async fn detail(
        &self,
        post_id: i64,
        viewer: Option<&Viewer>,
    ) -> Result<PostFormatted, DetailError> {
        let post = self
            .source
            .get_post(post_id)
            .await?
            .ok_or(DetailError::NotFound)?;

        let post = self
            .merge_posts(vec![post], viewer)
            .await?
            .pop()
            .ok_or(DetailError::NotFound)?;

        ensure_visible(post.visibility, viewer, post.user_id, ties_to_author(&post))
            .map_err(DetailError::Denied)?;

        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::memory::MemorySource,
        models::{
            comment::ReactionState,
            post::{ContentType, Visibility},
        },
    };

    fn viewer(id: i64, username: &str) -> Viewer {
        Viewer {
            id,
            username: username.to_owned(),
            is_admin: false,
        }
    }

    fn seeded() -> Arc<MemorySource> {
        let source = Arc::new(MemorySource::new());
        source
            .add_user(1, "alice")
            .add_user(2, "bob")
            .add_user(3, "carol")
            .befriend(1, 2)
            .add_post(10, 2, Visibility::Public, "hello")
            .add_content(10, ContentType::Image, "https://img/1.png")
            .add_post(11, 2, Visibility::Friend, "friends only")
            .add_post(12, 3, Visibility::Public, "carol says hi")
            .add_post(13, 3, Visibility::Private, "carol's diary");
        source
    }

    async fn rows(source: &MemorySource, ids: &[i64]) -> Vec<Post> {
        let mut posts = Vec::new();
        for id in ids {
            posts.push(source.get_post(*id).await.unwrap().unwrap());
        }
        posts
    }

    #[tokio::test]
    async fn keeps_input_order_and_joins_authors_and_contents() {
        let source = seeded();
        let feed = FeedAssembler::new(source.clone());
        let posts = rows(&source, &[12, 10]).await;

        let merged = feed.merge_posts(posts, None).await.unwrap();

        let ids: Vec<i64> = merged.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![12, 10]);
        assert_eq!(merged[0].user.as_ref().unwrap().username, "carol");
        assert_eq!(merged[1].user.as_ref().unwrap().username, "bob");

        let kinds: Vec<ContentType> = merged[1].contents.iter().map(|c| c.content_type).collect();
        assert_eq!(kinds, vec![ContentType::Text, ContentType::Image]);
    }

    #[tokio::test]
    async fn anonymous_viewer_skips_reaction_and_relation_lookups() {
        let source = seeded();
        let feed = FeedAssembler::new(source.clone());
        let posts = rows(&source, &[10, 12]).await;

        let before = source.query_count();
        feed.merge_posts(posts.clone(), None).await.unwrap();
        let anonymous = source.query_count() - before;

        let before = source.query_count();
        feed.merge_posts(posts, Some(&viewer(1, "alice")))
            .await
            .unwrap();
        let authenticated = source.query_count() - before;

        assert_eq!(anonymous, 2);
        assert_eq!(authenticated, 5);
    }

    #[tokio::test]
    async fn attaches_the_viewers_reactions_and_relations() {
        let source = seeded();
        source.react_post(
            1,
            10,
            ReactionState {
                is_upvoted: true,
                is_downvoted: false,
            },
        );
        let feed = FeedAssembler::new(source.clone());
        let posts = rows(&source, &[10, 12]).await;

        let merged = feed
            .merge_posts(posts, Some(&viewer(1, "alice")))
            .await
            .unwrap();

        assert!(merged[0].reaction.is_upvoted);
        assert!(merged[0].user.as_ref().unwrap().is_friend);
        assert_eq!(merged[1].reaction, ReactionState::default());
        assert!(!merged[1].user.as_ref().unwrap().is_friend);
    }

    #[tokio::test]
    async fn list_assembly_drops_hidden_posts() {
        let source = seeded();
        let feed = FeedAssembler::new(source.clone());
        let posts = rows(&source, &[10, 11, 12, 13]).await;

        let guest = feed.assemble(posts.clone(), None).await.unwrap();
        let ids: Vec<i64> = guest.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![10, 12]);

        let friend = feed
            .assemble(posts, Some(&viewer(1, "alice")))
            .await
            .unwrap();
        let ids: Vec<i64> = friend.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
    }

    #[tokio::test]
    async fn detail_distinguishes_denied_from_missing() {
        let source = seeded();
        let feed = FeedAssembler::new(source.clone());

        assert!(matches!(
            feed.detail(11, None).await,
            Err(DetailError::Denied(PermissionDenied))
        ));
        assert!(matches!(
            feed.detail(404, None).await,
            Err(DetailError::NotFound)
        ));
        assert_eq!(
            feed.detail(11, Some(&viewer(1, "alice"))).await.unwrap().id,
            11
        );
        assert_eq!(
            feed.detail(13, Some(&viewer(3, "carol"))).await.unwrap().id,
            13
        );
    }

    #[tokio::test]
    async fn friend_who_also_follows_sees_following_only_posts() {
        let source = seeded();
        source
            .follow(1, 2)
            .add_post(14, 2, Visibility::Following, "followers only");
        let feed = FeedAssembler::new(source.clone());
        let alice = viewer(1, "alice");

        assert_eq!(feed.detail(14, Some(&alice)).await.unwrap().id, 14);

        let rows = source.list_following(1, 20, 0).await.unwrap();
        let envelope = feed
            .page(rows, PageRequest::new(1, 20), Some(&alice))
            .await
            .unwrap();
        let ids: Vec<i64> = envelope.list.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![14, 11, 10]);
        assert_eq!(envelope.pager.total_rows, 3);
    }

    #[tokio::test]
    async fn page_keeps_the_source_total() {
        let source = seeded();
        let feed = FeedAssembler::new(source.clone());
        let rows = source.list_index_newest(1, 0).await.unwrap();

        let envelope = feed
            .page(rows, PageRequest::new(1, 1), None)
            .await
            .unwrap();

        assert_eq!(envelope.list.len(), 1);
        assert_eq!(envelope.pager.total_rows, 2);
    }
}
