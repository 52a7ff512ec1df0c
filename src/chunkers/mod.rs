//! Splitting source documents into token-bounded chunks.

pub mod base;
pub mod dedup;
pub mod fallback;
mod java_chunker;
pub mod scanner;

pub use base::{ApproximateCounter, TiktokenCounter, TokenCounter};
pub use dedup::dedupe;
pub use java_chunker::ChunkExtractor;
pub use scanner::{find_block_end, locate_header, BraceScanner};
