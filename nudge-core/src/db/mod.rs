//! Database layer for nudge
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for queries
//! - JSON documents for learned state

pub mod repo;
pub mod schema;

pub use repo::Database;
