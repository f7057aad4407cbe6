//! Read endpoints open to anonymous and signed-in viewers alike.
//!
//! Each operation resolves the viewer's relation once, picks the query for
//! the requested style, and runs list assembly through the response cache.

use std::sync::Arc;

use serde_json::value::RawValue;

use crate::{
    cache::{CacheKeyBuilder, CacheStore, KeyRequest, ReadThroughCache},
    config::CacheSettings,
    dao::{ContentSource, DaoError},
    error::AppError,
    models::{
        post::{PostFormatted, Visibility},
        query::{
            CommentStyle, CommentsParams, IndexStyle, SearchType, TagType, TimelineParams,
            TopicParams, UserPostsParams, UserPostsStyle,
        },
        tag::TopicList,
        user::{UserProfile, Viewer},
    },
    services::{
        feed::{DetailError, FeedAssembler},
        pagination::PageRequest,
        thread::ThreadAssembler,
        visibility::VisitorRelation,
    },
};

/// Logs a data-source failure and replaces it with the opaque client error.
fn source_failed(op: &'static str, code: AppError) -> impl FnOnce(DaoError) -> AppError {
    move |e| {
        tracing::error!("{} failed: {:?}", op, e);
        code
    }
}

pub struct LooseService {
    source: Arc<dyn ContentSource>,
    cache: ReadThroughCache,
    settings: CacheSettings,
    feed: FeedAssembler,
    thread: ThreadAssembler,
}

impl LooseService {
    pub fn new(
        source: Arc<dyn ContentSource>,
        store: Arc<dyn CacheStore>,
        settings: CacheSettings,
    ) -> Self {
        let keys = CacheKeyBuilder::new(settings.prefixes.clone());
        Self {
            cache: ReadThroughCache::new(store, keys),
            feed: FeedAssembler::new(source.clone()),
            thread: ThreadAssembler::new(source.clone()),
            source,
            settings,
        }
    }

    /// How `viewer` relates to `owner_id`. Social ties are only queried for
    /// signed-in viewers who are neither the owner nor an admin.
    pub async fn resolve_relation(
        &self,
        viewer: Option<&Viewer>,
        owner_id: i64,
    ) -> Result<VisitorRelation, DaoError> {
        let Some(current) = viewer else {
            return Ok(VisitorRelation::Guest);
        };
        if current.id == owner_id || current.is_admin {
            return Ok(VisitorRelation::derive(viewer, owner_id, false, false));
        }

        let is_friend = self.source.is_friend(current.id, owner_id).await?;
        let is_following = !is_friend && self.source.is_following(current.id, owner_id).await?;
        Ok(VisitorRelation::derive(
            viewer,
            owner_id,
            is_friend,
            is_following,
        ))
    }

    /// Home timeline, or search results when `query` is non-empty.
    pub async fn timeline(
        &self,
        viewer: Option<&Viewer>,
        params: &TimelineParams,
    ) -> Result<Box<RawValue>, AppError> {
        let page = PageRequest::new(params.page, params.page_size);

        if !params.query.is_empty() {
            let search_type: SearchType = params.search_type.parse()?;
            return self
                .cache
                .get_or_compute(&KeyRequest::Search, self.settings.index_tweets_expire, || async {
                    let rows = self
                        .source
                        .search_posts(&params.query, search_type, page.limit(), page.offset())
                        .await
                        .map_err(source_failed("search_posts", AppError::GetPostsFailed))?;
                    self.feed
                        .page(rows, page, viewer)
                        .await
                        .map_err(source_failed("merge search results", AppError::GetPostsFailed))
                })
                .await;
        }

        let style: IndexStyle = params.style.parse()?;
        let request = KeyRequest::Index {
            style,
            viewer: viewer.map(|v| v.username.as_str()),
            page,
        };

        self.cache
            .get_or_compute(&request, self.settings.index_tweets_expire, || async {
                let rows = match (style, viewer) {
                    (IndexStyle::Following, Some(current)) => {
                        self.source
                            .list_following(current.id, page.limit(), page.offset())
                            .await
                    }
                    // Signed-out "following" degrades to the newest feed.
                    (IndexStyle::Newest, _) | (IndexStyle::Following, None) => {
                        self.source
                            .list_index_newest(page.limit(), page.offset())
                            .await
                    }
                    (IndexStyle::Hots, _) => {
                        self.source.list_index_hots(page.limit(), page.offset()).await
                    }
                }
                .map_err(source_failed("list index posts", AppError::GetPostsFailed))?;

                self.feed
                    .page(rows, page, viewer)
                    .await
                    .map_err(source_failed("merge index posts", AppError::GetPostsFailed))
            })
            .await
    }

    /// One of the listings on a user's page.
    pub async fn user_posts(
        &self,
        viewer: Option<&Viewer>,
        params: &UserPostsParams,
    ) -> Result<Box<RawValue>, AppError> {
        let style: UserPostsStyle = params.style.parse()?;
        let page = PageRequest::new(params.page, params.page_size);

        let target = self
            .source
            .get_user_by_username(&params.username)
            .await
            .map_err(source_failed("get_user_by_username", AppError::GetPostsFailed))?
            .ok_or(AppError::NoExistUsername)?;

        let relation = self
            .resolve_relation(viewer, target.id)
            .await
            .map_err(source_failed("resolve relation", AppError::GetPostsFailed))?;

        let request = KeyRequest::User {
            target_id: target.id,
            style,
            relation,
            viewer: viewer.map(|v| v.username.as_str()),
            page,
        };

        self.cache
            .get_or_compute(&request, self.settings.user_tweets_expire, || async {
                let tiers = relation.visible_tiers();
                // Commented and starred posts belong to other authors; only the
                // owner and admins get past the public tier before gating.
                let foreign_tiers = match relation {
                    VisitorRelation::Myself | VisitorRelation::Admin => Visibility::ALL.to_vec(),
                    _ => vec![Visibility::Public],
                };
                let (limit, offset) = (page.limit(), page.offset());
                let failed = || source_failed("list user posts", AppError::GetPostsFailed);

                let rows = match style {
                    UserPostsStyle::Post => self
                        .source
                        .list_user_posts(target.id, &tiers, false, limit, offset)
                        .await
                        .map_err(failed())?,
                    UserPostsStyle::Highlight => self
                        .source
                        .list_user_posts(target.id, &tiers, true, limit, offset)
                        .await
                        .map_err(failed())?,
                    UserPostsStyle::Media => self
                        .source
                        .list_user_media(target.id, &tiers, limit, offset)
                        .await
                        .map_err(failed())?,
                    UserPostsStyle::Comment => self
                        .source
                        .list_user_commented(target.id, &foreign_tiers, limit, offset)
                        .await
                        .map_err(failed())?,
                    UserPostsStyle::Star => self
                        .source
                        .list_user_stars(target.id, &foreign_tiers, limit, offset)
                        .await
                        .map_err(source_failed("list_user_stars", AppError::GetStarsFailed))?,
                };

                self.feed
                    .page(rows, page, viewer)
                    .await
                    .map_err(source_failed("merge user posts", AppError::GetPostsFailed))
            })
            .await
    }

    /// One page of a post's comment thread.
    pub async fn tweet_comments(
        &self,
        viewer: Option<&Viewer>,
        params: &CommentsParams,
    ) -> Result<Box<RawValue>, AppError> {
        let style: CommentStyle = params.style.parse()?;
        let page = PageRequest::new(params.page, params.page_size);
        let request = KeyRequest::Thread {
            post_id: params.id,
            style,
            page,
        };

        self.cache
            .get_or_compute(&request, self.settings.tweet_comments_expire, || async {
                let rows = self
                    .source
                    .list_comments(params.id, style, page.limit(), page.offset())
                    .await
                    .map_err(source_failed("list_comments", AppError::GetCommentsFailed))?;

                self.thread
                    .page(params.id, rows, page, viewer)
                    .await
                    .map_err(source_failed("merge comments", AppError::GetCommentsFailed))
            })
            .await
    }

    pub async fn tweet_detail(
        &self,
        viewer: Option<&Viewer>,
        id: i64,
    ) -> Result<PostFormatted, AppError> {
        self.feed.detail(id, viewer).await.map_err(|e| match e {
            DetailError::NotFound => AppError::PostNotFound,
            DetailError::Denied(_) => {
                tracing::debug!(post_id = id, "Post detail denied");
                AppError::NoPermission
            }
            DetailError::Source(e) => source_failed("post detail", AppError::GetPostFailed)(e),
        })
    }

    pub async fn user_profile(
        &self,
        viewer: Option<&Viewer>,
        username: &str,
    ) -> Result<UserProfile, AppError> {
        let user = self
            .source
            .get_user_by_username(username)
            .await
            .map_err(source_failed("get_user_by_username", AppError::NoExistUsername))?
            .ok_or(AppError::NoExistUsername)?;

        let (is_friend, is_following) = match viewer {
            Some(current) if current.id != user.id => {
                let is_friend = self
                    .source
                    .is_friend(current.id, user.id)
                    .await
                    .map_err(source_failed("is_friend", AppError::Internal))?;
                let is_following = self
                    .source
                    .is_following(current.id, user.id)
                    .await
                    .map_err(source_failed("is_following", AppError::Internal))?;
                (is_friend, is_following)
            }
            _ => (false, false),
        };

        let (follows, followings) = self
            .source
            .follow_counts(user.id)
            .await
            .map_err(source_failed("follow_counts", AppError::Internal))?;

        Ok(UserProfile {
            id: user.id,
            username: user.username,
            nickname: user.nickname,
            avatar: user.avatar,
            status: user.status,
            is_admin: user.is_admin,
            is_friend,
            is_following,
            created_at: user.created_at,
            follows,
            followings,
            tweets_count: user.tweets_count,
        })
    }

    pub async fn topic_list(
        &self,
        viewer: Option<&Viewer>,
        params: &TopicParams,
    ) -> Result<TopicList, AppError> {
        let tag_type: TagType = params.tag_type.parse()?;
        let viewer_id = viewer.map(|v| v.id);
        let failed = || source_failed("list topics", AppError::GetPostTagsFailed);

        let mut list = TopicList::default();
        match (tag_type, viewer_id) {
            (TagType::Hot, _) => {
                list.topics = self
                    .source
                    .hot_tags(viewer_id, params.num)
                    .await
                    .map_err(failed())?;
            }
            (TagType::New, _) => {
                list.topics = self
                    .source
                    .newest_tags(viewer_id, params.num)
                    .await
                    .map_err(failed())?;
            }
            (TagType::Follow, Some(id)) => {
                list.topics = self
                    .source
                    .followed_tags(id, false, params.num)
                    .await
                    .map_err(failed())?;
            }
            (TagType::Pin, Some(id)) => {
                list.topics = self
                    .source
                    .followed_tags(id, true, params.num)
                    .await
                    .map_err(failed())?;
            }
            (TagType::HotExtral, _) => {
                list.topics = self
                    .source
                    .hot_tags(viewer_id, params.num)
                    .await
                    .map_err(failed())?;
                if let Some(id) = viewer_id {
                    let extral_num = if params.extral_num <= 0 {
                        params.num
                    } else {
                        params.extral_num
                    };
                    list.extral_topics = self
                        .source
                        .followed_tags(id, false, extral_num)
                        .await
                        .map_err(failed())?;
                }
            }
            (TagType::Follow | TagType::Pin, None) => {}
        }

        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::MemoryCache,
        dao::memory::MemorySource,
    };

    fn service(source: Arc<MemorySource>) -> LooseService {
        LooseService::new(
            source,
            Arc::new(MemoryCache::new(64)),
            CacheSettings::default(),
        )
    }

    fn viewer(id: i64, username: &str, is_admin: bool) -> Viewer {
        Viewer {
            id,
            username: username.to_owned(),
            is_admin,
        }
    }

    fn seeded() -> Arc<MemorySource> {
        let source = Arc::new(MemorySource::new());
        source
            .add_user(1, "alice")
            .add_user(2, "bob")
            .add_user(3, "carol")
            .add_admin(9, "root")
            .befriend(1, 2)
            .follow(3, 2);
        source
    }

    #[tokio::test]
    async fn relation_resolution_prefers_ownership_and_admin() {
        let svc = service(seeded());
        let cases = [
            (None, VisitorRelation::Guest),
            (Some(viewer(2, "bob", false)), VisitorRelation::Myself),
            (Some(viewer(9, "root", true)), VisitorRelation::Admin),
            (Some(viewer(1, "alice", false)), VisitorRelation::Friend),
            (Some(viewer(3, "carol", false)), VisitorRelation::Following),
            (Some(viewer(4, "dave", false)), VisitorRelation::Guest),
        ];
        for (viewer, expected) in cases {
            assert_eq!(
                svc.resolve_relation(viewer.as_ref(), 2).await.unwrap(),
                expected
            );
        }
    }

    #[tokio::test]
    async fn profile_flags_depend_on_the_viewer() {
        let svc = service(seeded());

        let profile = svc
            .user_profile(Some(&viewer(1, "alice", false)), "bob")
            .await
            .unwrap();
        assert!(profile.is_friend);
        assert!(!profile.is_following);
        assert_eq!(profile.follows, 1);

        let own = svc
            .user_profile(Some(&viewer(2, "bob", false)), "bob")
            .await
            .unwrap();
        assert!(!own.is_friend);

        assert_eq!(
            svc.user_profile(None, "nobody").await.unwrap_err(),
            AppError::NoExistUsername
        );
    }

    #[tokio::test]
    async fn followed_topic_lists_need_a_viewer() {
        let source = seeded();
        source
            .add_tag(1, "rust", 10)
            .add_tag(2, "go", 5)
            .follow_tag(1, 2, true);
        let svc = service(source);
        let params = |tag_type: &str, extral_num| TopicParams {
            tag_type: tag_type.to_owned(),
            num: 10,
            extral_num,
        };

        let anonymous = svc.topic_list(None, &params("follow", 0)).await.unwrap();
        assert!(anonymous.topics.is_empty());

        let alice = viewer(1, "alice", false);
        let pinned = svc
            .topic_list(Some(&alice), &params("pin", 0))
            .await
            .unwrap();
        assert_eq!(pinned.topics.len(), 1);
        assert!(pinned.topics[0].is_pin);

        let extral = svc
            .topic_list(Some(&alice), &params("hot_extral", 0))
            .await
            .unwrap();
        assert_eq!(extral.topics[0].tag, "rust");
        assert!(extral.topics[1].is_following);
        assert_eq!(extral.extral_topics.len(), 1);

        assert_eq!(
            svc.topic_list(None, &params("trending", 0)).await.unwrap_err(),
            AppError::GetPostsUnknownStyle
        );
    }

    #[tokio::test]
    async fn source_failures_become_opaque_codes() {
        let source = seeded();
        let svc = service(source.clone());
        source.set_failing(true);

        let params = CommentsParams {
            id: 1,
            style: "default".to_owned(),
            page: 1,
            page_size: 20,
        };
        assert_eq!(
            svc.tweet_comments(None, &params).await.unwrap_err(),
            AppError::GetCommentsFailed
        );
        assert_eq!(
            svc.tweet_detail(None, 1).await.unwrap_err(),
            AppError::GetPostFailed
        );
    }
}
