//! `PostgreSQL` course store for KiwiScript.
//!
//! This crate implements the `CourseStore` trait from `kiwiscript-core` on top of sqlx:
//!
//! - Row locks (`SELECT ... FOR UPDATE`) for the content and progress lock orders
//! - Deferred unique constraints on sibling positions so shifts can reorder freely
//! - `ON CONFLICT DO NOTHING` inserts for progress rows and certificates, so a lost race
//!   surfaces as `Conflict` without aborting the transaction
//! - Completion checks evaluated inside the counter update itself
//! - Bundled migrations
//!
//! # Example
//!
//! ```ignore
//! use kiwiscript_postgres::{PostgresConfig, PostgresCourseStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresCourseStore::connect(&PostgresConfig::new("postgres://localhost/kiwi")).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod rows;
mod store;

pub use config::PostgresConfig;
pub use error::PostgresError;
pub use store::{PostgresCourseStore, PostgresTransaction};
