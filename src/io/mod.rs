//! File hashing, writing and diffing.

mod atomic;
mod diff;
mod stat;

pub use atomic::atomic_write;
pub use diff::{apply_diff, unified_diff};
pub use stat::{fast_hash, fast_hash_str, hash_file, read_tracked, FastHash};
