//! SQLite backend for the Shopr engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
