//! Structural parsing for brace-delimited sources.
//!
//! Tree-sitter gives the outline (which classes, which methods, where they
//! start); the brace scanner in [`crate::chunkers::scanner`] decides where
//! they end.

pub mod parser;

pub use parser::{BodyStart, ClassDecl, DeclKind, JavaParser, JavaSkeleton, MethodDecl};
