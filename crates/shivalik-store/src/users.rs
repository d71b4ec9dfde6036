//! Identity records: signup, lookup, search and profile updates.

use rusqlite::{params, OptionalExtension};
use shivalik_shared::constants::DEFAULT_PROFILE_PIC;
use shivalik_shared::UserId;
use tracing::info;

use crate::columns::{now, ts_col, ts_to_sql, uuid_col};
use crate::database::Database;
use crate::edges::load_edge_lists;
use crate::error::{not_found, Result, StoreError};
use crate::models::{NewUser, PublicProfile, User, UserDetail};

const USER_COLUMNS: &str = "id, name, class_section, profile_pic, password, joined_at";
const PROFILE_COLUMNS: &str = "id, name, class_section, profile_pic";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Register a new identity. Names are unique; a clash is a `Conflict`.
    pub fn create_user(&mut self, new: NewUser<'_>) -> Result<User> {
        let name = required("name", new.name)?;
        let class_section = required("classSection", new.class_section)?;
        let password = required("password", new.password)?;
        let profile_pic = new
            .profile_pic
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PROFILE_PIC);

        let user = User {
            id: UserId::new(),
            name: name.to_string(),
            class_section: class_section.to_string(),
            profile_pic: profile_pic.to_string(),
            password: password.to_string(),
            joined_at: now(),
            friends: Vec::new(),
            pending_inbound: Vec::new(),
        };

        self.write_tx(|tx| {
            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE name = ?1)",
                params![user.name],
                |row| row.get(0),
            )?;
            if taken {
                return Err(StoreError::Conflict("User already exists".into()));
            }

            tx.execute(
                "INSERT INTO users (id, name, class_section, profile_pic, password, joined_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id.to_string(),
                    user.name,
                    user.class_section,
                    user.profile_pic,
                    user.password,
                    ts_to_sql(&user.joined_at),
                ],
            )
            .map_err(StoreError::from)
            .map_err(|e| {
                if e.is_constraint_violation() {
                    StoreError::Conflict("User already exists".into())
                } else {
                    e
                }
            })?;
            Ok(())
        })?;

        info!(user = %user.id.short(), name = %user.name, "identity created");
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch an identity with its friend and pending-request ids.
    pub fn find_user(&self, id: UserId) -> Result<User> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .map_err(not_found("User"))?;
        self.with_edge_lists(user)
    }

    pub fn find_user_by_name(&self, name: &str) -> Result<User> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE name = ?1"),
                params![name.trim()],
                row_to_user,
            )
            .map_err(not_found("User"))?;
        self.with_edge_lists(user)
    }

    fn with_edge_lists(&self, mut user: User) -> Result<User> {
        let (friends, pending) = load_edge_lists(self.conn(), user.id)?;
        user.friends = friends;
        user.pending_inbound = pending;
        Ok(user)
    }

    /// Every identity, public fields only, in signup order.
    pub fn list_users(&self) -> Result<Vec<PublicProfile>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM users ORDER BY rowid ASC"
        ))?;
        let rows = stmt.query_map([], row_to_profile)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }

    /// Case-insensitive substring search. Blank filters are ignored; with no
    /// filters at all this is the full listing.
    pub fn search_users(
        &self,
        name: Option<&str>,
        class_section: Option<&str>,
    ) -> Result<Vec<PublicProfile>> {
        let name = filter_term(name);
        let class_section = filter_term(class_section);

        let matches = |field: &str, term: &Option<String>| {
            term.as_ref()
                .map_or(true, |t| field.to_lowercase().contains(t.as_str()))
        };

        Ok(self
            .list_users()?
            .into_iter()
            .filter(|p| matches(&p.name, &name) && matches(&p.class_section, &class_section))
            .collect())
    }

    /// Public profiles for `ids`, in the given order. Unknown ids are skipped.
    pub fn profiles_by_ids(&self, ids: &[UserId]) -> Result<Vec<PublicProfile>> {
        let mut stmt = self.conn().prepare_cached(&format!(
            "SELECT {PROFILE_COLUMNS} FROM users WHERE id = ?1"
        ))?;
        let mut profiles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(profile) = stmt
                .query_row(params![id.to_string()], row_to_profile)
                .optional()?
            {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }

    /// Profile plus populated friend and pending-request lists.
    pub fn user_detail(&self, id: UserId) -> Result<UserDetail> {
        let user = self.find_user(id)?;
        Ok(UserDetail {
            profile: user.public(),
            joined_at: user.joined_at,
            friends: self.profiles_by_ids(&user.friends)?,
            friend_requests: self.profiles_by_ids(&user.pending_inbound)?,
        })
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Point the identity's avatar at a new media URI.
    pub fn update_profile_pic(&self, id: UserId, uri: &str) -> Result<User> {
        let uri = required("profilePic", uri)?;
        let affected = self.conn().execute(
            "UPDATE users SET profile_pic = ?1 WHERE id = ?2",
            params![uri, id.to_string()],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound("User"));
        }
        info!(user = %id.short(), "profile picture updated");
        self.find_user(id)
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StoreError::Invalid(format!("{field} is required")));
    }
    Ok(value)
}

fn filter_term(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`User`] without edges.
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(uuid_col(row, 0)?),
        name: row.get(1)?,
        class_section: row.get(2)?,
        profile_pic: row.get(3)?,
        password: row.get(4)?,
        joined_at: ts_col(row, 5)?,
        friends: Vec::new(),
        pending_inbound: Vec::new(),
    })
}

pub(crate) fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<PublicProfile> {
    Ok(PublicProfile {
        id: UserId(uuid_col(row, 0)?),
        name: row.get(1)?,
        class_section: row.get(2)?,
        profile_pic: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{db, new_user, user};
    use shivalik_shared::ErrorKind;

    #[test]
    fn create_and_find() {
        let mut db = db();
        let created = db
            .create_user(NewUser {
                name: " asha ",
                class_section: "10-B",
                password: "opaque",
                profile_pic: None,
            })
            .unwrap();
        assert_eq!(created.name, "asha");
        assert_eq!(created.profile_pic, DEFAULT_PROFILE_PIC);

        let by_id = db.find_user(created.id).unwrap();
        assert_eq!(by_id, created);
        let by_name = db.find_user_by_name("asha").unwrap();
        assert_eq!(by_name.id, created.id);
    }

    #[test]
    fn duplicate_name_conflicts() {
        let mut db = db();
        user(&mut db, "asha");
        let err = db.create_user(new_user("asha")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn blank_fields_are_validation() {
        let mut db = db();
        let err = db
            .create_user(NewUser {
                name: "asha",
                class_section: "  ",
                password: "pw",
                profile_pic: None,
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "classSection is required");
    }

    #[test]
    fn blank_picture_falls_back_to_default() {
        let mut db = db();
        let created = db
            .create_user(NewUser {
                profile_pic: Some("   "),
                ..new_user("asha")
            })
            .unwrap();
        assert_eq!(created.profile_pic, DEFAULT_PROFILE_PIC);

        let custom = db
            .create_user(NewUser {
                profile_pic: Some("https://cdn.example/p.png"),
                ..new_user("ravi")
            })
            .unwrap();
        assert_eq!(custom.profile_pic, "https://cdn.example/p.png");
    }

    #[test]
    fn missing_user_is_not_found() {
        let db = db();
        assert_eq!(
            db.find_user(UserId::new()).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            db.find_user_by_name("ghost").unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let mut db = db();
        db.create_user(NewUser {
            class_section: "10-B",
            ..new_user("Asha Rao")
        })
        .unwrap();
        db.create_user(NewUser {
            class_section: "9-A",
            ..new_user("Ravi")
        })
        .unwrap();
        db.create_user(NewUser {
            class_section: "10-a",
            ..new_user("Kashish")
        })
        .unwrap();

        let names = |v: Vec<PublicProfile>| v.into_iter().map(|p| p.name).collect::<Vec<_>>();

        assert_eq!(
            names(db.search_users(Some("ASH"), None).unwrap()),
            vec!["Asha Rao", "Kashish"]
        );
        assert_eq!(
            names(db.search_users(None, Some("10")).unwrap()),
            vec!["Asha Rao", "Kashish"]
        );
        assert_eq!(
            names(db.search_users(Some("ash"), Some("-a")).unwrap()),
            vec!["Kashish"]
        );
        assert_eq!(db.search_users(None, Some(" ")).unwrap().len(), 3);
        assert_eq!(db.search_users(None, None).unwrap().len(), 3);
    }

    #[test]
    fn update_profile_pic() {
        let mut db = db();
        let id = user(&mut db, "asha");
        let updated = db.update_profile_pic(id, "http://media/x").unwrap();
        assert_eq!(updated.profile_pic, "http://media/x");

        assert_eq!(
            db.update_profile_pic(UserId::new(), "http://media/x")
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            db.update_profile_pic(id, "").unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn detail_populates_relationships() {
        let mut db = db();
        let a = user(&mut db, "a");
        let b = user(&mut db, "b");
        let c = user(&mut db, "c");
        db.send_request(a, b).unwrap();
        db.accept_request(a, b).unwrap();
        db.send_request(c, b).unwrap();

        let detail = db.user_detail(b).unwrap();
        assert_eq!(detail.profile.name, "b");
        assert_eq!(
            detail.friends.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![a]
        );
        assert_eq!(
            detail.friend_requests.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![c]
        );
    }
}
