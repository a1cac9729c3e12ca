//! # File cache
//!
//! Run-scoped bookkeeping of repository files under the batchai cache
//! directory:
//!
//! - [`ContentCache`] remembers the content last seen for each file and tells
//!   whether it changed since;
//! - [`ReportStore`] persists one JSON report per file and task;
//! - [`CacheLayout`] derives every artifact path from the cache directory,
//!   the repository root and the file's relative path.

pub mod code_file;
pub mod file_ops;
pub mod keyed_cache;
pub mod paths;
pub mod report_store;

pub use code_file::{CodeFile, ContentCache};
pub use file_ops::{read_file, read_json, write_file, write_json};
pub use keyed_cache::KeyedCache;
pub use paths::{CacheLayout, ReportKind};
pub use report_store::ReportStore;
