pub mod memory;

pub use memory::{BuildRecord, ObjectIndex, VersionIndex, COMMENT_SEPARATOR};
