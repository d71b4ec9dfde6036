//! # shivalik-store
//!
//! SQLite persistence for Shivalik: identities and their relationship edges,
//! posts with likes and comments, and the feed read model.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection`. Every multi-record write runs inside one
//! `BEGIN IMMEDIATE` transaction, so concurrent handles on the same file
//! serialize instead of overwriting each other.

pub mod database;
pub mod edges;
pub mod feed;
pub mod migrations;
pub mod models;
pub mod posts;
pub mod relationships;
pub mod users;

mod columns;
mod error;

pub use database::Database;
pub use edges::EdgeSet;
pub use error::{Result, StoreError};
pub use feed::{Feed, FeedPost};
pub use models::*;
pub use posts::LikeToggle;
