//! Read-side composition of posts with their authors' public profiles.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shivalik_shared::{PostId, UserId};
use tracing::warn;

use crate::database::Database;
use crate::error::Result;
use crate::models::{Comment, Post, PublicProfile};

/// A post as shown in a feed, with the author resolved.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeedPost {
    #[serde(rename = "_id")]
    pub id: PostId,
    pub author: PublicProfile,
    pub content: String,
    pub likes: Vec<UserId>,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Posts latest first plus the author profiles needed to render them.
///
/// Composition happens on iteration. A post whose author cannot be resolved
/// is skipped.
#[derive(Debug, Default)]
pub struct Feed {
    posts: Vec<Post>,
    authors: HashMap<UserId, PublicProfile>,
}

impl Feed {
    pub fn iter(&self) -> impl Iterator<Item = FeedPost> + '_ {
        self.posts.iter().filter_map(|post| {
            let Some(author) = self.authors.get(&post.author_id) else {
                warn!(post = %post.id, author = %post.author_id, "feed post has no resolvable author");
                return None;
            };
            Some(FeedPost {
                id: post.id,
                author: author.clone(),
                content: post.content.clone(),
                likes: post.likes.clone(),
                comments: post.comments.clone(),
                created_at: post.created_at,
                updated_at: post.updated_at,
            })
        })
    }

    /// Number of stored posts, including any that will be skipped.
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn into_posts(self) -> Vec<FeedPost> {
        self.iter().collect()
    }
}

impl Database {
    /// Every post, latest first.
    pub fn feed(&self) -> Result<Feed> {
        let posts = self.list_posts()?;
        self.compose(posts)
    }

    /// One author's posts, latest first.
    pub fn author_feed(&self, author: UserId) -> Result<Feed> {
        let posts = self.list_posts_by_author(author)?;
        self.compose(posts)
    }

    fn compose(&self, posts: Vec<Post>) -> Result<Feed> {
        let mut ids: Vec<UserId> = Vec::new();
        for post in &posts {
            if !ids.contains(&post.author_id) {
                ids.push(post.author_id);
            }
        }
        let authors = self
            .profiles_by_ids(&ids)?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        Ok(Feed { posts, authors })
    }
}
