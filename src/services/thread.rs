//! Comment thread assembly.

use std::{collections::HashMap, sync::Arc};

use crate::{
    dao::{ContentSource, DaoError, Paged, distinct_ids},
    models::{
        comment::{Comment, CommentContentFormatted, CommentFormatted, ReactionMaps, ReplyFormatted},
        user::{User, Viewer},
    },
    services::pagination::{PageEnvelope, PageRequest},
};

#[derive(Clone)]
pub struct ThreadAssembler {
    source: Arc<dyn ContentSource>,
}

impl ThreadAssembler {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self { source }
    }

    /// Nests replies under their comments and attaches authors, contents and
    /// the viewer's votes. Comment order is preserved; replies keep source
    /// order within each comment.
    pub async fn assemble(
        &self,
        post_id: i64,
        comments: Vec<Comment>,
        viewer: Option<&Viewer>,
    ) -> Result<Vec<CommentFormatted>, DaoError> {
        if comments.is_empty() {
            return Ok(Vec::new());
        }

        let comment_ids = distinct_ids(comments.iter().map(|c| c.id));
        let replies = self.source.get_comment_replies_by_ids(&comment_ids).await?;

        let user_ids = distinct_ids(
            comments
                .iter()
                .map(|c| c.user_id)
                .chain(replies.iter().map(|r| r.user_id))
                .chain(replies.iter().filter_map(|r| r.at_user_id)),
        );
        let users: HashMap<i64, User> = self
            .source
            .get_users_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        let mut contents: HashMap<i64, Vec<CommentContentFormatted>> = HashMap::new();
        for content in self.source.get_comment_contents_by_ids(&comment_ids).await? {
            contents
                .entry(content.comment_id)
                .or_default()
                .push(content.into());
        }
        for fragments in contents.values_mut() {
            fragments.sort_by_key(|c| (c.sort, c.id));
        }

        let reactions = match viewer {
            Some(viewer) => self.source.get_reaction_map(viewer.id, post_id).await?,
            None => ReactionMaps::default(),
        };

        let mut grouped: HashMap<i64, Vec<ReplyFormatted>> = HashMap::new();
        for reply in replies {
            let mut formatted = ReplyFormatted::from_row(reply.clone());
            formatted.user = users.get(&reply.user_id).map(User::format);
            formatted.at_user = reply
                .at_user_id
                .and_then(|id| users.get(&id))
                .map(User::format);
            if let Some(state) = reactions.replies.get(&reply.id) {
                formatted.reaction = *state;
            }
            grouped.entry(reply.comment_id).or_default().push(formatted);
        }

        Ok(comments
            .into_iter()
            .map(|comment| {
                let mut formatted = CommentFormatted::from_row(comment);
                formatted.user = users.get(&formatted.user_id).map(User::format);
                formatted.contents = contents.remove(&formatted.id).unwrap_or_default();
                formatted.replies = grouped.remove(&formatted.id).unwrap_or_default();
                if let Some(state) = reactions.comments.get(&formatted.id) {
                    formatted.reaction = *state;
                }
                formatted
            })
            .collect())
    }

    pub async fn page(
        &self,
        post_id: i64,
        (comments, total_rows): Paged<Comment>,
        page: PageRequest,
        viewer: Option<&Viewer>,
    ) -> Result<PageEnvelope<CommentFormatted>, DaoError> {
        let items = self.assemble(post_id, comments, viewer).await?;
        Ok(PageEnvelope::build(items, page, total_rows))
    }
}
