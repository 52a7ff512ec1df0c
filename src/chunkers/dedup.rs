//! Removal of repeated method chunks.

use std::collections::HashSet;

use tracing::debug;

use crate::types::Chunk;

/// Keep the first `Method`/`LargeMethod` chunk for each qualified name.
///
/// Other kinds pass through untouched and relative order is preserved, so
/// applying this twice gives the same result as applying it once.
pub fn dedupe(chunks: Vec<Chunk>) -> Vec<Chunk> {
    let mut seen: HashSet<String> = HashSet::new();
    chunks
        .into_iter()
        .filter(|chunk| {
            if !chunk.kind.is_method() {
                return true;
            }
            if seen.insert(chunk.qualified_name.clone()) {
                true
            } else {
                debug!(chunk = %chunk.qualified_name, "Dropping duplicate method chunk");
                false
            }
        })
        .collect()
}
