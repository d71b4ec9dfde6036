//! Posts and their owned like-set and comment log.
//!
//! Likes are rows keyed by `(post_id, user_id)`, so a toggle is a keyed
//! delete-else-insert inside one IMMEDIATE transaction and can never
//! duplicate or lose an entry. Comments are appended with an AUTOINCREMENT
//! sequence and the table refuses UPDATE and DELETE.

use rusqlite::{params, Connection};
use serde::Serialize;
use shivalik_shared::content::{validate_comment_text, validate_post_text};
use shivalik_shared::{CommentId, PostId, UserId};
use tracing::{debug, info};

use crate::columns::{now, ts_col, ts_to_sql, uuid_col};
use crate::database::Database;
use crate::edges::user_exists;
use crate::error::{not_found, Result, StoreError};
use crate::models::{Comment, Post};

const POST_COLUMNS: &str = "id, author_id, content, created_at, updated_at";

/// Result of [`Database::toggle_like`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeToggle {
    /// Whether the user likes the post after the toggle.
    pub liked: bool,
    /// Like count after the toggle.
    pub likes: u64,
}

impl Database {
    pub fn create_post(&mut self, author: UserId, content: &str) -> Result<Post> {
        validate_post_text(content)?;

        let ts = now();
        let post = Post {
            id: PostId::new(),
            author_id: author,
            content: content.to_string(),
            likes: Vec::new(),
            comments: Vec::new(),
            created_at: ts,
            updated_at: ts,
        };

        self.write_tx(|tx| {
            if !user_exists(tx, author)? {
                return Err(StoreError::NotFound("User"));
            }
            tx.execute(
                "INSERT INTO posts (id, author_id, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    post.id.to_string(),
                    post.author_id.to_string(),
                    post.content,
                    ts_to_sql(&post.created_at),
                    ts_to_sql(&post.updated_at),
                ],
            )?;
            Ok(())
        })?;

        info!(post = %post.id, author = %author.short(), "post created");
        Ok(post)
    }

    /// Like the post if `user` has not, otherwise take the like back.
    pub fn toggle_like(&mut self, post: PostId, user: UserId) -> Result<LikeToggle> {
        let toggle = self.write_tx(|tx| {
            ensure_post(tx, post)?;
            if !user_exists(tx, user)? {
                return Err(StoreError::NotFound("User"));
            }

            let removed = tx.execute(
                "DELETE FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                params![post.to_string(), user.to_string()],
            )?;
            let ts = ts_to_sql(&now());
            if removed == 0 {
                tx.execute(
                    "INSERT INTO post_likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    params![post.to_string(), user.to_string(), ts],
                )?;
            }
            touch(tx, post, &ts)?;

            let likes: i64 = tx.query_row(
                "SELECT COUNT(*) FROM post_likes WHERE post_id = ?1",
                params![post.to_string()],
                |row| row.get(0),
            )?;
            Ok(LikeToggle {
                liked: removed == 0,
                likes: likes as u64,
            })
        })?;

        debug!(post = %post, user = %user.short(), liked = toggle.liked, likes = toggle.likes, "like toggled");
        Ok(toggle)
    }

    /// Append a comment and return the post's full comment log.
    pub fn add_comment(&mut self, post: PostId, user: UserId, text: &str) -> Result<Vec<Comment>> {
        validate_comment_text(text)?;

        let comments = self.write_tx(|tx| {
            ensure_post(tx, post)?;
            if !user_exists(tx, user)? {
                return Err(StoreError::NotFound("User"));
            }

            let ts = ts_to_sql(&now());
            tx.execute(
                "INSERT INTO post_comments (id, post_id, user_id, text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    CommentId::new().to_string(),
                    post.to_string(),
                    user.to_string(),
                    text,
                    ts,
                ],
            )?;
            touch(tx, post, &ts)?;
            load_comments(tx, post)
        })?;

        debug!(post = %post, user = %user.short(), count = comments.len(), "comment added");
        Ok(comments)
    }

    pub fn find_post(&self, id: PostId) -> Result<Post> {
        let post = self
            .conn()
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
                params![id.to_string()],
                row_to_post,
            )
            .map_err(not_found("Post"))?;
        hydrate(self.conn(), post)
    }

    /// All posts, latest first.
    pub fn list_posts(&self) -> Result<Vec<Post>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map([], row_to_post)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(hydrate(self.conn(), row?)?);
        }
        Ok(posts)
    }

    /// Posts by one author, latest first. Unknown authors simply have none.
    pub fn list_posts_by_author(&self, author: UserId) -> Result<Vec<Post>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE author_id = ?1 ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![author.to_string()], row_to_post)?;
        let mut posts = Vec::new();
        for row in rows {
            posts.push(hydrate(self.conn(), row?)?);
        }
        Ok(posts)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ensure_post(conn: &Connection, id: PostId) -> Result<()> {
    let found: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
        params![id.to_string()],
        |row| row.get(0),
    )?;
    if found == 0 {
        return Err(StoreError::NotFound("Post"));
    }
    Ok(())
}

fn touch(conn: &Connection, id: PostId, ts: &str) -> Result<()> {
    conn.execute(
        "UPDATE posts SET updated_at = ?1 WHERE id = ?2",
        params![ts, id.to_string()],
    )?;
    Ok(())
}

fn hydrate(conn: &Connection, mut post: Post) -> Result<Post> {
    let mut stmt = conn.prepare_cached(
        "SELECT user_id FROM post_likes WHERE post_id = ?1 ORDER BY rowid ASC",
    )?;
    let likes = stmt.query_map(params![post.id.to_string()], |row| uuid_col(row, 0).map(UserId))?;
    post.likes = likes.collect::<std::result::Result<Vec<_>, _>>()?;
    post.comments = load_comments(conn, post.id)?;
    Ok(post)
}

fn load_comments(conn: &Connection, post: PostId) -> Result<Vec<Comment>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, user_id, text, created_at FROM post_comments
         WHERE post_id = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map(params![post.to_string()], |row| {
        Ok(Comment {
            id: CommentId(uuid_col(row, 0)?),
            user: UserId(uuid_col(row, 1)?),
            text: row.get(2)?,
            created_at: ts_col(row, 3)?,
        })
    })?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StoreError::from)
}

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: PostId(uuid_col(row, 0)?),
        author_id: UserId(uuid_col(row, 1)?),
        content: row.get(2)?,
        likes: Vec::new(),
        comments: Vec::new(),
        created_at: ts_col(row, 3)?,
        updated_at: ts_col(row, 4)?,
    })
}
