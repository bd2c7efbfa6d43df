//! Posting and authorization workflow
//!
//! The engine owns every mutating transition on a work; the surrounding
//! layers only translate requests into submissions and outcomes into
//! responses.

pub mod authorship;
pub mod bulk;
pub mod engine;
pub mod moderation;
pub mod outcome;

pub use bulk::{BatchReport, BulkPatch, BulkResult};
pub use engine::{ChapterContent, WorkSubmission, WorkflowEngine};
pub use outcome::{EditAction, Notice, Outcome, Problem, Target, View, WorkState};
