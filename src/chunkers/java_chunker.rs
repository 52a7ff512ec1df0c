//! Token-bounded chunk extraction for Java-shaped sources.
//!
//! Preference order per top-level declaration:
//!
//! 1. the whole file, when it fits the budget;
//! 2. one `ClassBody` chunk per class that fits;
//! 3. one chunk per method for classes that do not, each wrapped in the
//!    class header so the remote side sees a compilable shape;
//! 4. line-oriented fallback when the structural parse is unusable.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::base::TokenCounter;
use super::fallback::fallback_chunks;
use super::scanner::{build_header, find_block_end_at};
use crate::ast_engine::{BodyStart, ClassDecl, JavaParser};
use crate::types::{Chunk, ChunkKind, SourceDocument};

/// Splits documents into chunks that respect a token budget.
#[derive(Clone)]
pub struct ChunkExtractor {
    counter: Arc<dyn TokenCounter>,
    parser: JavaParser,
}

impl ChunkExtractor {
    pub fn new(counter: Arc<dyn TokenCounter>) -> Self {
        Self {
            counter,
            parser: JavaParser::new(),
        }
    }

    pub fn counter(&self) -> &dyn TokenCounter {
        self.counter.as_ref()
    }

    /// Partition `doc` into ordered chunks of at most `max_tokens` where the
    /// structure allows it.
    pub fn extract(&self, doc: &SourceDocument, max_tokens: usize) -> Vec<Chunk> {
        let total = self.counter.count_tokens(doc.text());
        if total <= max_tokens {
            return vec![self.full_file_chunk(doc, total)];
        }

        let skeleton = match self.parser.parse(doc.text()) {
            Ok(skeleton) if skeleton.is_usable() => skeleton,
            Ok(skeleton) => {
                warn!(
                    file = %doc.display_name(),
                    errors = skeleton.parse_errors.len(),
                    classes = skeleton.classes.len(),
                    "Structural parse unusable, falling back to line chunking"
                );
                return fallback_chunks(doc, self.counter.as_ref(), max_tokens);
            }
            Err(e) => {
                warn!(file = %doc.display_name(), error = %e, "Parser failed, falling back to line chunking");
                return fallback_chunks(doc, self.counter.as_ref(), max_tokens);
            }
        };

        let lines = doc.lines();
        let header = build_header(doc.package(), doc.imports());
        let mut chunks = Vec::new();

        for class in &skeleton.classes {
            let class_end = block_end(&lines, class.body, class.end_row);
            let class_text = lines[class.start_row..=class_end].join("\n");
            let content = format!("{header}{class_text}");
            let tokens = self.counter.count_tokens(&content);

            if tokens <= max_tokens || class.methods.is_empty() {
                if tokens > max_tokens {
                    warn!(class = %class.name, tokens, max_tokens, "Oversized class has no methods to split on");
                }
                chunks.push(self.chunk(
                    doc,
                    chunks.len(),
                    content,
                    tokens,
                    (class.start_row, class_end),
                    ChunkKind::ClassBody,
                    class.name.clone(),
                ));
                continue;
            }

            debug!(class = %class.name, tokens, max_tokens, "Class over budget, splitting by method");
            self.method_chunks(doc, &lines, &header, class, max_tokens, &mut chunks);
        }

        chunks
    }

    fn method_chunks(
        &self,
        doc: &SourceDocument,
        lines: &[&str],
        header: &str,
        class: &ClassDecl,
        max_tokens: usize,
        chunks: &mut Vec<Chunk>,
    ) {
        let open = class.body.map_or(class.decl_row, |body| body.row);
        let class_header = lines[class.decl_row..=open].join("\n");
        let mut seen = HashSet::new();

        for method in &class.methods {
            let name = format!("{}.{}", class.name, method.name);
            if !seen.insert(method.name.as_str()) {
                debug!(method = %name, "Method already extracted, skipping");
                continue;
            }

            let end = block_end(lines, method.body, method.end_row);
            let method_text = lines[method.start_row..=end].join("\n");
            let content = format!("{header}{class_header}\n{method_text}\n}}");
            let tokens = self.counter.count_tokens(&content);
            let kind = if tokens <= max_tokens {
                ChunkKind::Method
            } else {
                warn!(method = %name, tokens, max_tokens, "Method exceeds budget, sending as is");
                ChunkKind::LargeMethod
            };

            chunks.push(self.chunk(
                doc,
                chunks.len(),
                content,
                tokens,
                (method.start_row, end),
                kind,
                name,
            ));
        }
    }

    fn full_file_chunk(&self, doc: &SourceDocument, tokens: usize) -> Chunk {
        let name = doc.display_name();
        let name = name.strip_suffix(".java").unwrap_or(&name).to_string();
        self.chunk(
            doc,
            0,
            doc.text().to_string(),
            tokens,
            (0, doc.line_count() - 1),
            ChunkKind::FullFile,
            name,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn chunk(
        &self,
        doc: &SourceDocument,
        index: usize,
        content: String,
        token_count: usize,
        rows: (usize, usize),
        kind: ChunkKind,
        qualified_name: String,
    ) -> Chunk {
        Chunk {
            index,
            content,
            start_line: rows.0 + 1,
            end_line: rows.1 + 1,
            kind,
            qualified_name,
            token_count,
            package: doc.package().map(str::to_string),
            imports: doc.imports().to_vec(),
        }
    }
}

/// Row where a body closes, scanned from its opening brace so braces in
/// annotations or modifiers ahead of it are not counted. Bodiless
/// declarations end where the parser says.
fn block_end(lines: &[&str], body: Option<BodyStart>, end_row: usize) -> usize {
    match body {
        Some(body) => find_block_end_at(lines, body.row, body.column),
        None => end_row,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunkers::base::tests::WordCounter;
    use crate::chunkers::base::ApproximateCounter;

    fn extractor() -> ChunkExtractor {
        ChunkExtractor::new(Arc::new(WordCounter))
    }

    const THREE_METHODS: &str = r#"package demo;

public class Calc {
    private int total = 0; // running total of calls

    public int method1(int a, int b) {
        return a + b;
    }

    public int method2(int a, int b) {
        return a - b;
    }

    public int method3(int a, int b) {
        return a * b;
    }
}
"#;

    #[test]
    fn test_small_document_is_full_file() {
        let docs = [
            SourceDocument::new(THREE_METHODS),
            SourceDocument::new("class A {}"),
            SourceDocument::new(""),
            SourceDocument::from_file("Calc.java", "not even java {"),
        ];
        for doc in &docs {
            let chunks = ChunkExtractor::new(Arc::new(ApproximateCounter::new())).extract(doc, 10_000);
            assert_eq!(chunks.len(), 1);
            assert_eq!(chunks[0].kind, ChunkKind::FullFile);
            assert_eq!(chunks[0].start_line, 1);
            assert_eq!(chunks[0].end_line, doc.line_count());
            assert_eq!(chunks[0].content, doc.text());
        }
        let chunks = extractor().extract(&docs[3], 100);
        assert_eq!(chunks[0].qualified_name, "Calc");
    }

    #[test]
    fn test_three_methods_split_under_budget() {
        let doc = SourceDocument::new(THREE_METHODS);
        // whole file is 53 words, each method chunk 19
        let chunks = extractor().extract(&doc, 50);

        let names: Vec<_> = chunks.iter().map(|c| c.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["Calc.method1", "Calc.method2", "Calc.method3"]);
        assert!(chunks.iter().all(|c| c.kind == ChunkKind::Method));
        assert!(chunks.iter().all(|c| c.token_count <= 50));

        let first = &chunks[0];
        assert_eq!(first.index, 0);
        assert_eq!((first.start_line, first.end_line), (6, 8));
        assert_eq!(
            first.content,
            "package demo;\n\npublic class Calc {\n    public int method1(int a, int b) {\n        return a + b;\n    }\n}"
        );
        assert_eq!(first.package.as_deref(), Some("package demo;"));
    }

    #[test]
    fn test_classes_that_fit_stay_whole() {
        let src = format!("{THREE_METHODS}\nclass Small {{\n    int x;\n}}\n");
        let doc = SourceDocument::new(src);
        let chunks = extractor().extract(&doc, 50);

        let last = chunks.last().unwrap();
        assert_eq!(last.kind, ChunkKind::ClassBody);
        assert_eq!(last.qualified_name, "Small");
        assert_eq!(last.content, "package demo;\n\nclass Small {\n    int x;\n}");
        assert_eq!((last.start_line, last.end_line), (19, 21));
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn test_oversized_method_is_large_method() {
        let doc = SourceDocument::new(THREE_METHODS);
        let chunks = extractor().extract(&doc, 18);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.kind == ChunkKind::LargeMethod));
    }

    #[test]
    fn test_overloads_keep_first() {
        let src = "class O {\n  void f(int a) {\n    a++;\n  }\n  void f(String s) {\n    s.trim();\n  }\n}\n";
        let doc = SourceDocument::new(src);
        let chunks = extractor().extract(&doc, 12);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].qualified_name, "O.f");
        assert_eq!(chunks[0].end_line, 4);
    }

    #[test]
    fn test_broken_source_falls_back() {
        let src = "public class Broken {\n  void f( {\n    x = 1;\n  }\n\n  void g() {\n    y = 2;\n  }\n";
        let doc = SourceDocument::new(src);
        let chunks = extractor().extract(&doc, 10);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.kind == ChunkKind::TextFallback));
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks.last().unwrap().end_line, 8);
    }

    const ANNOTATED: &str = r#"package demo;

@SuppressWarnings({"unchecked"})
public class Calc {
    private int total = 0;

    @SuppressWarnings({"rawtypes", "unused"})
    public int method1(int a, int b) {
        return a + b;
    }

    public int method2(int a, int b) {
        return a - b;
    }
}

class Small {
    int x;
}
"#;

    #[test]
    fn test_annotated_class_keeps_body() {
        let doc = SourceDocument::new(ANNOTATED);
        // Calc is 39 words with the header, the whole file 45
        let chunks = extractor().extract(&doc, 40);

        assert_eq!(chunks.len(), 2);
        let calc = &chunks[0];
        assert_eq!(calc.kind, ChunkKind::ClassBody);
        assert_eq!((calc.start_line, calc.end_line), (3, 15));
        assert!(calc.content.contains("return a - b;"));
        assert!(calc.content.ends_with("    }\n}"));
        assert!(crate::chunkers::scanner::is_balanced(&calc.content));
    }

    #[test]
    fn test_annotated_method_keeps_body() {
        let doc = SourceDocument::new(ANNOTATED);
        let chunks = extractor().extract(&doc, 30);

        let names: Vec<_> = chunks.iter().map(|c| c.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["Calc.method1", "Calc.method2", "Small"]);

        let first = &chunks[0];
        assert_eq!((first.start_line, first.end_line), (7, 10));
        pretty_assertions::assert_eq!(
            first.content,
            "package demo;\n\n@SuppressWarnings({\"unchecked\"})\npublic class Calc {\n    @SuppressWarnings({\"rawtypes\", \"unused\"})\n    public int method1(int a, int b) {\n        return a + b;\n    }\n}"
        );
    }

    #[test]
    fn test_string_brace_does_not_end_method() {
        let src = "class S {\n  void f() {\n    String s = \"}\";\n    g();\n  }\n  void h() {\n    i();\n  }\n}\n";
        let doc = SourceDocument::new(src);
        let chunks = extractor().extract(&doc, 12);
        assert_eq!(chunks[0].qualified_name, "S.f");
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (2, 5));
        assert!(crate::chunkers::scanner::is_balanced(&chunks[0].content));
    }
}
