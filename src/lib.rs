//! threadpress - harvest paginated discussion threads with hidden replies
//! into a single PDF.
//!
//! The pipeline runs against any [`document::ThreadDocument`]: locate the
//! sub-pages of a thread, expand the collapsed replies on each, extract
//! comment records from a snapshot, deduplicate, and render once.

pub mod browser;
pub mod config;
pub mod document;
pub mod harvest;
pub mod models;
pub mod notify;
pub mod patterns;
pub mod render;
