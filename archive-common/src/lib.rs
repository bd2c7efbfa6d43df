//! # Archive Common Library
//!
//! Shared code for the archive services including:
//! - Error taxonomy used across request handling
//! - Domain models (works, chapters, pseuds, collections, tags)
//! - Configuration loading

pub mod config;
pub mod error;
pub mod models;

pub use error::{Error, Result};
