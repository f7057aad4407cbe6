//! Per-post access decisions.

use std::fmt;

use crate::models::{post::Visibility, user::Viewer};

/// How the requester relates to the owner of some content.
///
/// Resolved once per request before any visibility decision and never
/// changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisitorRelation {
    /// The viewer owns the content.
    Myself,
    Admin,
    Friend,
    Following,
    Guest,
}

impl VisitorRelation {
    /// Ownership and admin rights are checked before social ties.
    pub fn derive(
        viewer: Option<&Viewer>,
        owner_id: i64,
        is_friend: bool,
        is_following: bool,
    ) -> Self {
        match viewer {
            None => VisitorRelation::Guest,
            Some(viewer) if viewer.id == owner_id => VisitorRelation::Myself,
            Some(viewer) if viewer.is_admin => VisitorRelation::Admin,
            Some(_) if is_friend => VisitorRelation::Friend,
            Some(_) if is_following => VisitorRelation::Following,
            Some(_) => VisitorRelation::Guest,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VisitorRelation::Myself => "self",
            VisitorRelation::Admin => "admin",
            VisitorRelation::Friend => "friend",
            VisitorRelation::Following => "following",
            VisitorRelation::Guest => "guest",
        }
    }

    /// Every visibility tier this relation may read, for query filters.
    pub fn visible_tiers(self) -> Vec<Visibility> {
        Visibility::ALL
            .into_iter()
            .filter(|visibility| is_visible(*visibility, self))
            .collect()
    }
}

impl fmt::Display for VisitorRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The visibility table.
///
/// Owner and admin always pass. Tiers that are not listed (private and any
/// unknown code) are denied to everybody else.
pub fn is_visible(visibility: Visibility, relation: VisitorRelation) -> bool {
    match relation {
        VisitorRelation::Myself | VisitorRelation::Admin => true,
        VisitorRelation::Friend => {
            matches!(visibility, Visibility::Public | Visibility::Friend)
        }
        VisitorRelation::Following => {
            matches!(visibility, Visibility::Public | Visibility::Following)
        }
        VisitorRelation::Guest => visibility == Visibility::Public,
    }
}

/// The viewer's social ties to one author.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ties {
    pub is_friend: bool,
    pub is_following: bool,
}

/// Per-item gate for a concrete post.
///
/// Each tie is checked on its own, so a viewer who is both friend and
/// follower reads friend-only and following-only posts alike.
pub fn can_read(
    visibility: Visibility,
    viewer: Option<&Viewer>,
    owner_id: i64,
    ties: Ties,
) -> bool {
    let as_friend = VisitorRelation::derive(viewer, owner_id, ties.is_friend, false);
    let as_follower = VisitorRelation::derive(viewer, owner_id, false, ties.is_following);
    is_visible(visibility, as_friend) || is_visible(visibility, as_follower)
}

/// Denial of a single-item read. Distinct from "does not exist".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionDenied;

pub fn ensure_visible(
    visibility: Visibility,
    viewer: Option<&Viewer>,
    owner_id: i64,
    ties: Ties,
) -> Result<(), PermissionDenied> {
    if can_read(visibility, viewer, owner_id, ties) {
        Ok(())
    } else {
        Err(PermissionDenied)
    }
}
