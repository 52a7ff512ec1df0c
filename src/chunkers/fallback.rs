//! Line-oriented chunking for sources the structural parser cannot handle.

use tracing::debug;

use super::base::TokenCounter;
use super::scanner::{build_header, is_comment_line, is_import_line, is_package_line};
use crate::types::{Chunk, ChunkKind, SourceDocument};

/// Lines where a split is unlikely to cut a statement in half.
pub fn is_logical_boundary(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || trimmed.ends_with('}')
        || trimmed.starts_with("//")
        || ["public", "private", "protected"]
            .iter()
            .any(|kw| trimmed.starts_with(kw))
}

/// Split a document into `TextFallback` chunks of roughly `max_tokens`.
///
/// Lines accumulate until the next line would push the running count (header
/// included) over budget. If that line is a logical boundary the chunk ends
/// just before it; otherwise the chunk is cut after the last boundary it
/// contains, or at the budget edge when it has none. Chunks that do not
/// already contain the header get it prepended.
pub fn fallback_chunks(doc: &SourceDocument, counter: &dyn TokenCounter, max_tokens: usize) -> Vec<Chunk> {
    let lines = doc.lines();
    let header = build_header(doc.package(), doc.imports());
    let header_tokens = counter.count_tokens(&header);
    let header_end = lines
        .iter()
        .enumerate()
        .take_while(|(_, l)| {
            let t = l.trim();
            t.is_empty() || is_comment_line(t) || is_package_line(t) || is_import_line(t)
        })
        .filter(|(_, l)| {
            let t = l.trim();
            is_package_line(t) || is_import_line(t)
        })
        .map(|(i, _)| i)
        .last();

    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    let mut running = header_tokens;
    let mut last_boundary: Option<usize> = None;
    let mut idx = 0;

    while idx < lines.len() {
        let line_tokens = counter.count_tokens(lines[idx]);
        if idx > start && running + line_tokens > max_tokens {
            let cut = match last_boundary {
                _ if is_logical_boundary(lines[idx]) => idx - 1,
                Some(b) => b,
                None => {
                    debug!(line = idx, "No logical boundary before budget edge, splitting mid-block");
                    idx - 1
                }
            };
            spans.push((start, cut));
            start = cut + 1;
            idx = start;
            running = header_tokens;
            last_boundary = None;
            continue;
        }

        running += line_tokens;
        if is_logical_boundary(lines[idx]) {
            last_boundary = Some(idx);
        }
        idx += 1;
    }
    if start < lines.len() || spans.is_empty() {
        spans.push((start, lines.len().saturating_sub(1)));
    }

    spans
        .into_iter()
        .enumerate()
        .map(|(n, (s, e))| {
            let body = lines.get(s..=e).map(|l| l.join("\n")).unwrap_or_default();
            let content = match header_end {
                Some(h) if s <= h => body,
                _ => format!("{header}{body}"),
            };
            Chunk {
                index: n,
                token_count: counter.count_tokens(&content),
                content,
                start_line: s + 1,
                end_line: e + 1,
                kind: ChunkKind::TextFallback,
                qualified_name: format!("chunk_{}", n + 1),
                package: doc.package().map(str::to_string),
                imports: doc.imports().to_vec(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunkers::base::tests::WordCounter;

    #[test]
    fn test_boundaries() {
        assert!(is_logical_boundary(""));
        assert!(is_logical_boundary("    }"));
        assert!(is_logical_boundary("  public void f() {"));
        assert!(is_logical_boundary("// note"));
        assert!(!is_logical_boundary("int x = a +"));
    }

    #[test]
    fn test_small_document_is_one_chunk() {
        let doc = SourceDocument::new("a b\nc d\n");
        let chunks = fallback_chunks(&doc, &WordCounter, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
        assert_eq!(chunks[0].qualified_name, "chunk_1");
    }

    #[test]
    fn test_cuts_after_last_boundary() {
        // three words per statement line
        let src = "x = 1;\ny = 2;\n}\nz = 3;\nw = 4;\nv = 5;\n";
        let doc = SourceDocument::new(src);
        let chunks = fallback_chunks(&doc, &WordCounter, 7);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
        assert_eq!(chunks[1].start_line, 4);
        assert_eq!(chunks.last().unwrap().end_line, 6);
        assert!(chunks.iter().all(|c| c.kind == ChunkKind::TextFallback));
    }

    #[test]
    fn test_boundary_line_starts_next_chunk() {
        let src = "x = 1;\n}\ny = 2;\npublic void f() {\nz = 3;\n";
        let doc = SourceDocument::new(src);
        let chunks = fallback_chunks(&doc, &WordCounter, 7);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 3));
        assert_eq!(chunks[1].start_line, 4);
        assert!(chunks[1].content.starts_with("public void f() {"));
    }

    #[test]
    fn test_cuts_at_budget_edge_without_boundary() {
        let src = "a b\nc d\ne f\ng h\n";
        let doc = SourceDocument::new(src);
        let chunks = fallback_chunks(&doc, &WordCounter, 4);
        let spans: Vec<_> = chunks.iter().map(|c| (c.start_line, c.end_line)).collect();
        assert_eq!(spans, vec![(1, 2), (3, 4)]);
    }

    #[test]
    fn test_header_prepended_only_when_missing() {
        let src = "package p;\nimport a.B;\nx y z\n}\nq r s\nt u v\n";
        let doc = SourceDocument::new(src);
        let chunks = fallback_chunks(&doc, &WordCounter, 14);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[1].index, 1);
        assert!(chunks[0].content.starts_with("package p;\nimport a.B;\nx y z"));
        let second = &chunks[1];
        assert!(second.content.starts_with("package p;\n\nimport a.B;\n\n"));
    }
}
