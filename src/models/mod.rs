//! Data models for harvested threads.

mod comment;
mod page;
mod thread;

pub use comment::{CommentRecord, DeduplicationKey, NestingDepth, MAX_NESTING_DEPTH, UNKNOWN_FIELD};
pub use page::SubPageLocation;
pub use thread::{ThreadHead, MAX_HEAD_IMAGES};
