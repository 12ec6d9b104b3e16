//! Epic-driven QA test case generation.
//!
//! Loads an epic with its stories and attachments from the issue tracker, asks a
//! language model for requirements and test cases, and runs a bounded
//! critique/fix loop over the result. Drafts, saved views and extracted
//! attachment text live in in-memory TTL stores.

pub mod app;
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use domain::error::{AppError, Result};
pub use infrastructure::bootstrap::{spawn_store_janitor, AppContext};
