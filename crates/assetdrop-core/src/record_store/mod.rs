//! Persistent record store (SQLite via sqlx).
//!
//! A plain key-value table; the download snapshot lives under one key. No
//! domain logic here: the state container decides what to write and the
//! reconciler decides what to trust.

mod db;

pub use db::*;

#[cfg(test)]
pub(crate) use db::open_memory;
