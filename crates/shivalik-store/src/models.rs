//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` so it can be handed straight to the HTTP
//! layer. Field names follow the public JSON contract: camelCase, ids as
//! `_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shivalik_shared::{CommentId, Edges, PostId, UserId};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A registered account together with its relationship edges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Unique display name.
    pub name: String,
    pub class_section: String,
    /// URI of the avatar image.
    pub profile_pic: String,
    /// Opaque credential produced by the auth collaborator. Never serialized.
    #[serde(skip_serializing, default)]
    pub password: String,
    pub joined_at: DateTime<Utc>,
    /// Mirrored friendship edges, in the order they were made.
    pub friends: Vec<UserId>,
    /// Identities that sent this user a request still awaiting a decision.
    #[serde(rename = "friendRequests")]
    pub pending_inbound: Vec<UserId>,
}

impl User {
    pub fn public(&self) -> PublicProfile {
        PublicProfile {
            id: self.id,
            name: self.name.clone(),
            class_section: self.class_section.clone(),
            profile_pic: self.profile_pic.clone(),
        }
    }

    pub fn edges(&self) -> Edges {
        Edges::from_parts(
            self.id,
            self.friends.iter().copied(),
            self.pending_inbound.iter().copied(),
        )
    }
}

/// Input for [`crate::Database::create_user`].
#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub class_section: &'a str,
    pub password: &'a str,
    /// Blank or missing falls back to the default avatar.
    pub profile_pic: Option<&'a str>,
}

/// View of an identity that is safe to hand to anyone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub name: String,
    pub class_section: String,
    pub profile_pic: String,
}

/// A single user's page: profile plus populated relationship lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(flatten)]
    pub profile: PublicProfile,
    pub joined_at: DateTime<Utc>,
    pub friends: Vec<PublicProfile>,
    pub friend_requests: Vec<PublicProfile>,
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// A post with its like-set and comment log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: PostId,
    #[serde(rename = "author")]
    pub author_id: UserId,
    pub content: String,
    /// Identities that currently like the post; no duplicates.
    pub likes: Vec<UserId>,
    /// Append-only, oldest first.
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: CommentId,
    /// The commenter.
    pub user: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
