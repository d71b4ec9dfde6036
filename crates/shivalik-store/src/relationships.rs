//! Friend requests and friendship.
//!
//! Each operation loads both identities' edges in a single IMMEDIATE
//! transaction, runs the pure transition from
//! [`shivalik_shared::relationship`], and writes the row diff back before
//! committing. Neither side of a paired update is ever visible alone.

use rusqlite::params;
use shivalik_shared::relationship::{self, state_between};
use shivalik_shared::{AcceptOutcome, RelationshipError, RelationshipState, UserId};
use tracing::{info, warn};

use crate::database::Database;
use crate::edges::load_edges;
use crate::error::{Result, StoreError};
use crate::models::PublicProfile;
use crate::users::row_to_profile;

impl Database {
    /// Record a pending request from `sender` to `receiver`.
    pub fn send_request(&mut self, sender: UserId, receiver: UserId) -> Result<()> {
        if sender == receiver {
            return Err(RelationshipError::SelfRequest.into());
        }

        self.with_edges(&[sender, receiver], |set| {
            let (s, r) = set
                .pair_mut(sender, receiver)
                .ok_or(StoreError::NotFound("User"))?;
            relationship::send_request(s, r)?;
            Ok(())
        })?;

        info!(sender = %sender.short(), receiver = %receiver.short(), "friend request sent");
        Ok(())
    }

    /// `receiver` accepts the request `sender` made.
    ///
    /// Removing the request and recording both friendship edges commit as one
    /// transaction. Repeating the call after success is a no-op, and a pair
    /// whose friendship is recorded on one side only gets its missing half
    /// restored.
    pub fn accept_request(&mut self, sender: UserId, receiver: UserId) -> Result<AcceptOutcome> {
        if sender == receiver {
            self.find_user(sender)?;
            return Err(RelationshipError::NoSuchRequest.into());
        }

        let outcome = self.with_edges(&[sender, receiver], |set| {
            let (s, r) = set
                .pair_mut(sender, receiver)
                .ok_or(StoreError::NotFound("User"))?;
            Ok(relationship::accept_request(s, r)?)
        })?;

        match outcome {
            AcceptOutcome::Accepted => {
                info!(sender = %sender.short(), receiver = %receiver.short(), "friend request accepted")
            }
            AcceptOutcome::AlreadyFriends => {
                info!(sender = %sender.short(), receiver = %receiver.short(), "accept retried on existing friendship")
            }
            AcceptOutcome::Repaired => {
                warn!(sender = %sender.short(), receiver = %receiver.short(), "repaired one-sided friendship")
            }
        }
        Ok(outcome)
    }

    /// Drop any pending request between the two, whoever sent it.
    ///
    /// Returns `true` if a request was removed. Nothing pending is a
    /// successful no-op; friendship is never touched.
    pub fn cancel_request(&mut self, requester: UserId, other: UserId) -> Result<bool> {
        if requester == other {
            self.find_user(requester)?;
            return Ok(false);
        }

        let removed = self.with_edges(&[requester, other], |set| {
            let (a, b) = set
                .pair_mut(requester, other)
                .ok_or(StoreError::NotFound("User"))?;
            Ok(relationship::cancel_request(a, b))
        })?;

        if removed {
            info!(requester = %requester.short(), other = %other.short(), "friend request removed");
        }
        Ok(removed)
    }

    /// Friends of `id` as public profiles, oldest friendship first.
    pub fn list_friends(&self, id: UserId) -> Result<Vec<PublicProfile>> {
        if !crate::edges::user_exists(self.conn(), id)? {
            return Err(StoreError::NotFound("User"));
        }

        let mut stmt = self.conn().prepare_cached(
            "SELECT u.id, u.name, u.class_section, u.profile_pic
             FROM friendships f
             JOIN users u ON u.id = f.friend_id
             WHERE f.user_id = ?1
             ORDER BY f.rowid ASC",
        )?;
        let rows = stmt.query_map(params![id.to_string()], row_to_profile)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    /// Current state between two identities.
    pub fn relationship(&self, a: UserId, b: UserId) -> Result<RelationshipState> {
        let ea = load_edges(self.conn(), a)?;
        let eb = load_edges(self.conn(), b)?;
        Ok(state_between(&ea, &eb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{db, on_disk, user};
    use shivalik_shared::ErrorKind;
    use std::time::Duration;

    fn assert_friends(db: &Database, a: UserId, b: UserId) {
        let ua = db.find_user(a).unwrap();
        let ub = db.find_user(b).unwrap();
        assert!(ua.friends.contains(&b));
        assert!(ub.friends.contains(&a));
        assert!(!ua.pending_inbound.contains(&b));
        assert!(!ub.pending_inbound.contains(&a));
    }

    #[test]
    fn request_accept_scenario() {
        let mut db = db();
        let a = user(&mut db, "a");
        let b = user(&mut db, "b");

        db.send_request(a, b).unwrap();
        assert_eq!(db.find_user(b).unwrap().pending_inbound, vec![a]);
        assert_eq!(
            db.relationship(a, b).unwrap(),
            RelationshipState::Pending { from: a, to: b }
        );

        assert_eq!(db.accept_request(a, b).unwrap(), AcceptOutcome::Accepted);
        let ua = db.find_user(a).unwrap();
        let ub = db.find_user(b).unwrap();
        assert_eq!(ua.friends, vec![b]);
        assert_eq!(ub.friends, vec![a]);
        assert!(ua.pending_inbound.is_empty());
        assert!(ub.pending_inbound.is_empty());

        let err = db.send_request(a, b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let err = db.send_request(b, a).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn self_request_is_validation() {
        let mut db = db();
        let a = user(&mut db, "a");
        let err = db.send_request(a, a).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Even for an unknown id: the self check comes first.
        let ghost = UserId::new();
        assert_eq!(
            db.send_request(ghost, ghost).unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn unknown_identities_are_not_found() {
        let mut db = db();
        let a = user(&mut db, "a");
        let ghost = UserId::new();

        assert_eq!(db.send_request(a, ghost).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(db.send_request(ghost, a).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(db.accept_request(ghost, a).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(db.cancel_request(a, ghost).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(db.list_friends(ghost).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn duplicate_request_conflicts() {
        let mut db = db();
        let a = user(&mut db, "a");
        let b = user(&mut db, "b");
        db.send_request(a, b).unwrap();

        let err = db.send_request(a, b).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Relationship(RelationshipError::AlreadyRequested)
        ));
        assert_eq!(db.find_user(b).unwrap().pending_inbound, vec![a]);
    }

    #[test]
    fn accept_without_request_conflicts() {
        let mut db = db();
        let a = user(&mut db, "a");
        let b = user(&mut db, "b");

        let err = db.accept_request(a, b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.to_string(), "No such request found");
        assert_eq!(db.accept_request(a, a).unwrap_err().kind(), ErrorKind::Conflict);
    }

    #[test]
    fn accept_retry_succeeds_without_changes() {
        let mut db = db();
        let a = user(&mut db, "a");
        let b = user(&mut db, "b");
        db.send_request(a, b).unwrap();
        db.accept_request(a, b).unwrap();

        assert_eq!(
            db.accept_request(a, b).unwrap(),
            AcceptOutcome::AlreadyFriends
        );
        assert_eq!(db.find_user(a).unwrap().friends, vec![b]);
        assert_eq!(db.find_user(b).unwrap().friends, vec![a]);
    }

    #[test]
    fn accept_restores_missing_mirror() {
        let mut db = db();
        let a = user(&mut db, "a");
        let b = user(&mut db, "b");
        // Simulate a legacy partial write: only b -> a recorded.
        db.conn()
            .execute(
                "INSERT INTO friendships (user_id, friend_id, created_at) VALUES (?1, ?2, 't')",
                params![b.to_string(), a.to_string()],
            )
            .unwrap();
        assert_eq!(db.relationship(a, b).unwrap(), RelationshipState::HalfLinked);

        assert_eq!(db.accept_request(a, b).unwrap(), AcceptOutcome::Repaired);
        assert_friends(&db, a, b);
    }

    #[test]
    fn cancel_is_idempotent_and_symmetric() {
        let mut db = db();
        let a = user(&mut db, "a");
        let b = user(&mut db, "b");
        db.send_request(b, a).unwrap();

        // a cancels a request b sent.
        assert!(db.cancel_request(a, b).unwrap());
        let first = (db.find_user(a).unwrap(), db.find_user(b).unwrap());
        assert!(!db.cancel_request(a, b).unwrap());
        let second = (db.find_user(a).unwrap(), db.find_user(b).unwrap());
        assert_eq!(first, second);
        assert_eq!(db.relationship(a, b).unwrap(), RelationshipState::None);

        // Re-sending after a cancel is allowed.
        db.send_request(a, b).unwrap();
        assert!(db.cancel_request(a, b).unwrap());
        assert!(db.find_user(b).unwrap().pending_inbound.is_empty());
    }

    #[test]
    fn cancel_never_unfriends() {
        let mut db = db();
        let a = user(&mut db, "a");
        let b = user(&mut db, "b");
        db.send_request(a, b).unwrap();
        db.accept_request(a, b).unwrap();

        assert!(!db.cancel_request(b, a).unwrap());
        assert_friends(&db, a, b);
        assert!(!db.cancel_request(a, a).unwrap());
    }

    #[test]
    fn list_friends_in_insertion_order() {
        let mut db = db();
        let a = user(&mut db, "a");
        let b = user(&mut db, "b");
        let c = user(&mut db, "c");

        db.send_request(c, a).unwrap();
        db.send_request(b, a).unwrap();
        db.accept_request(c, a).unwrap();
        db.accept_request(b, a).unwrap();

        let friends = db.list_friends(a).unwrap();
        assert_eq!(friends.iter().map(|p| p.id).collect::<Vec<_>>(), vec![c, b]);
        assert_eq!(friends[0].name, "c");
        assert!(db.list_friends(b).unwrap().iter().all(|p| p.id == a));
    }

    #[test]
    fn busy_store_surfaces_as_transient() {
        let dir = tempfile::tempdir().unwrap();
        let mut holder = on_disk(&dir, Duration::from_secs(1));
        let a = user(&mut holder, "a");
        let b = user(&mut holder, "b");

        let mut contender = on_disk(&dir, Duration::from_millis(20));

        holder.conn().execute_batch("BEGIN IMMEDIATE").unwrap();
        let err = contender.send_request(a, b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(err.kind().is_retryable());
        holder.conn().execute_batch("ROLLBACK").unwrap();

        contender.send_request(a, b).unwrap();
        assert_eq!(holder.find_user(b).unwrap().pending_inbound, vec![a]);
    }

    #[test]
    fn concurrent_accept_and_cancel_leave_consistent_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut setup = on_disk(&dir, Duration::from_secs(5));
        let a = user(&mut setup, "a");
        let b = user(&mut setup, "b");
        setup.send_request(a, b).unwrap();

        let path = dir.path().to_path_buf();
        let accept = {
            let dir = path.clone();
            std::thread::spawn(move || {
                let mut db = Database::open_at(&dir.join("test.db"), Duration::from_secs(5)).unwrap();
                db.accept_request(a, b).map(|_| ())
            })
        };
        let cancel = std::thread::spawn(move || {
            let mut db = Database::open_at(&path.join("test.db"), Duration::from_secs(5)).unwrap();
            db.cancel_request(b, a).map(|_| ())
        });
        let accepted = accept.join().unwrap();
        cancel.join().unwrap().unwrap();

        let ua = setup.find_user(a).unwrap();
        let ub = setup.find_user(b).unwrap();
        assert!(ub.pending_inbound.is_empty());
        // Either accept won (friends both ways) or cancel won (no edges at all).
        match accepted {
            Ok(()) => assert_friends(&setup, a, b),
            Err(e) => {
                assert_eq!(e.kind(), ErrorKind::Conflict);
                assert!(ua.friends.is_empty() && ub.friends.is_empty());
            }
        }
    }
}
