//! Atomic read-modify-write over identities' relationship edges.
//!
//! Edges are loaded and written back inside one `BEGIN IMMEDIATE`
//! transaction. Write-back is a row-level diff against what was loaded, so a
//! mutation only touches the rows it actually changed.

use rusqlite::{params, Connection};
use shivalik_shared::relationship::EdgeDiff;
use shivalik_shared::{Edges, UserId};
use tracing::debug;

use crate::columns::{now, ts_to_sql, uuid_col};
use crate::database::Database;
use crate::error::{Result, StoreError};

/// Edges of several identities, loaded in one transaction.
pub struct EdgeSet {
    original: Vec<Edges>,
    current: Vec<Edges>,
}

impl EdgeSet {
    fn position(&self, id: UserId) -> Option<usize> {
        self.current.iter().position(|e| e.owner() == id)
    }

    pub fn get(&self, id: UserId) -> Option<&Edges> {
        self.position(id).map(|i| &self.current[i])
    }

    pub fn get_mut(&mut self, id: UserId) -> Option<&mut Edges> {
        self.position(id).map(move |i| &mut self.current[i])
    }

    /// Mutable access to two distinct identities at once.
    pub fn pair_mut(&mut self, a: UserId, b: UserId) -> Option<(&mut Edges, &mut Edges)> {
        let ia = self.position(a)?;
        let ib = self.position(b)?;
        if ia == ib {
            return None;
        }
        if ia < ib {
            let (left, right) = self.current.split_at_mut(ib);
            Some((&mut left[ia], &mut right[0]))
        } else {
            let (left, right) = self.current.split_at_mut(ia);
            Some((&mut right[0], &mut left[ib]))
        }
    }
}

impl Database {
    /// Atomically read, modify and write back one identity's edges.
    ///
    /// Fails with `NotFound` if the identity does not exist. If `f` returns an
    /// error nothing is written.
    pub fn mutate_edges<T>(
        &mut self,
        id: UserId,
        f: impl FnOnce(&mut Edges) -> Result<T>,
    ) -> Result<T> {
        self.with_edges(&[id], |set| {
            let edges = set.get_mut(id).ok_or(StoreError::NotFound("User"))?;
            f(edges)
        })
    }

    /// Multi-record form of [`Database::mutate_edges`]: every listed identity
    /// is loaded, `f` may change any of them, and all changes commit together.
    pub fn with_edges<T>(
        &mut self,
        ids: &[UserId],
        f: impl FnOnce(&mut EdgeSet) -> Result<T>,
    ) -> Result<T> {
        self.write_tx(|tx| {
            let mut loaded = Vec::with_capacity(ids.len());
            for id in ids {
                if loaded.iter().any(|e: &Edges| e.owner() == *id) {
                    continue;
                }
                loaded.push(load_edges(tx, *id)?);
            }

            let mut set = EdgeSet {
                original: loaded.clone(),
                current: loaded,
            };
            let value = f(&mut set)?;

            for (before, after) in set.original.iter().zip(set.current.iter()) {
                save_edges(tx, after.owner(), &before.diff(after))?;
            }
            Ok(value)
        })
    }
}

pub(crate) fn user_exists(conn: &Connection, id: UserId) -> Result<bool> {
    let found: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
        params![id.to_string()],
        |row| row.get(0),
    )?;
    Ok(found != 0)
}

/// Load an identity's edges, failing with `NotFound` if it does not exist.
pub(crate) fn load_edges(conn: &Connection, id: UserId) -> Result<Edges> {
    if !user_exists(conn, id)? {
        return Err(StoreError::NotFound("User"));
    }
    let (friends, pending) = load_edge_lists(conn, id)?;
    Ok(Edges::from_parts(id, friends, pending))
}

/// Friend ids and pending sender ids, both in insertion order.
pub(crate) fn load_edge_lists(conn: &Connection, id: UserId) -> Result<(Vec<UserId>, Vec<UserId>)> {
    let friends = id_list(
        conn,
        "SELECT friend_id FROM friendships WHERE user_id = ?1 ORDER BY rowid ASC",
        id,
    )?;
    let pending = id_list(
        conn,
        "SELECT sender_id FROM friend_requests WHERE receiver_id = ?1 ORDER BY rowid ASC",
        id,
    )?;
    Ok((friends, pending))
}

fn id_list(conn: &Connection, sql: &str, id: UserId) -> Result<Vec<UserId>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params![id.to_string()], |row| uuid_col(row, 0).map(UserId))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(StoreError::from)
}

fn save_edges(conn: &Connection, owner: UserId, diff: &EdgeDiff) -> Result<()> {
    if diff.is_empty() {
        return Ok(());
    }
    let owner_str = owner.to_string();
    let ts = ts_to_sql(&now());

    for friend in &diff.friends_added {
        conn.execute(
            "INSERT OR IGNORE INTO friendships (user_id, friend_id, created_at) VALUES (?1, ?2, ?3)",
            params![owner_str, friend.to_string(), ts],
        )?;
    }
    for friend in &diff.friends_removed {
        conn.execute(
            "DELETE FROM friendships WHERE user_id = ?1 AND friend_id = ?2",
            params![owner_str, friend.to_string()],
        )?;
    }
    for sender in &diff.pending_added {
        conn.execute(
            "INSERT OR IGNORE INTO friend_requests (receiver_id, sender_id, created_at) VALUES (?1, ?2, ?3)",
            params![owner_str, sender.to_string(), ts],
        )?;
    }
    for sender in &diff.pending_removed {
        conn.execute(
            "DELETE FROM friend_requests WHERE receiver_id = ?1 AND sender_id = ?2",
            params![owner_str, sender.to_string()],
        )?;
    }

    debug!(user = %owner.short(), ?diff, "edges written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{db, user};

    #[test]
    fn mutate_edges_persists_changes() {
        let mut db = db();
        let a = user(&mut db, "a");
        let b = user(&mut db, "b");

        let changed = db.mutate_edges(b, |edges| Ok(edges.insert_pending(a))).unwrap();
        assert!(changed);

        let stored = db.find_user(b).unwrap();
        assert_eq!(stored.pending_inbound, vec![a]);
    }

    #[test]
    fn mutate_edges_unknown_user_is_not_found() {
        let mut db = db();
        let err = db.mutate_edges(UserId::new(), |_| Ok(())).unwrap_err();
        assert!(matches!(err, StoreError::NotFound("User")));
    }

    #[test]
    fn error_in_closure_writes_nothing() {
        let mut db = db();
        let a = user(&mut db, "a");
        let b = user(&mut db, "b");

        let res: Result<()> = db.with_edges(&[a, b], |set| {
            let (ea, eb) = set.pair_mut(a, b).unwrap();
            ea.insert_friend(b);
            eb.insert_friend(a);
            Err(StoreError::Invalid("nope".into()))
        });
        assert!(res.is_err());
        assert!(db.find_user(a).unwrap().friends.is_empty());
        assert!(db.find_user(b).unwrap().friends.is_empty());
    }

    #[test]
    fn pair_mut_rejects_same_identity() {
        let mut db = db();
        let a = user(&mut db, "a");
        db.with_edges(&[a, a], |set| {
            assert!(set.pair_mut(a, a).is_none());
            assert!(set.get(a).is_some());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn store_rejects_self_edges() {
        let db = db();
        let conn = db.conn();
        let id = UserId::new().to_string();
        conn.execute(
            "INSERT INTO users (id, name, class_section, profile_pic, password, joined_at)
             VALUES (?1, 'x', 'c', 'p', 'pw', 't')",
            params![id],
        )
        .unwrap();
        let res = conn.execute(
            "INSERT INTO friend_requests (receiver_id, sender_id, created_at) VALUES (?1, ?1, 't')",
            params![id],
        );
        assert!(res.is_err());
    }
}
