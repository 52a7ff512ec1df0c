//! File intake: repository acquisition, traversal and decoding.
//!
//! This module provides:
//! - Repository acquisition (local directory or GitHub clone)
//! - File filtering (build output, VCS and tooling directories, size)
//! - Encoding detection and line-ending normalization

pub mod acquire;
pub mod filter;
pub mod repository;

pub use acquire::{AcquiredRepository, GitAcquirer};
pub use filter::{FileFilter, FilterConfig};
pub use repository::{FileSource, LocalRepository};
