//! # shivalik-shared
//!
//! Types shared by the store and the HTTP server: id newtypes, constants,
//! the error taxonomy, and the pure friend-request state machine.

pub mod constants;
pub mod content;
pub mod error;
pub mod relationship;
pub mod types;

pub use error::{ContentError, ErrorKind, RelationshipError};
pub use relationship::{AcceptOutcome, Edges, RelationshipState};
pub use types::{CommentId, PostId, UserId};
