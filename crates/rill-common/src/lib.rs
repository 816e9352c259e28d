//! Shared infrastructure for the rill language crates.

mod interner;
mod paths;
mod span;

pub use interner::{Interner, Symbol};
pub use paths::canon_path;
pub use span::{BytePos, Span};
