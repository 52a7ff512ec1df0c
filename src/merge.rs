//! Reassembly of transformed chunks into one document.
//!
//! Chunks may complete in any order and any of them may have failed; merge
//! keys on chunk index only. A failed chunk contributes its original content
//! through [`TransformedChunk::text`].

mod repair;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

pub use repair::{missing_imports, repair, validate, Issue, Repair};

use crate::ast_engine::JavaParser;
use crate::chunkers::scanner::{
    build_header, find_block_end, is_comment_line, is_import_line, is_package_line, locate_header,
};
use crate::error::MergeWarning;
use crate::types::{ChunkKind, TransformedChunk};

lazy_static! {
    static ref SIGNATURE: Regex = Regex::new(
        r"^\s*(?:public|private|protected|static|final|abstract|synchronized|native|default)\b[^=;]*\("
    )
    .expect("valid signature regex");
}

/// Result of a merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The merged document; always present, possibly degraded
    pub document: String,
    /// Validation failures that survived repair
    pub warning: Option<MergeWarning>,
    /// Repairs applied after the first validation pass
    pub repairs: Vec<Repair>,
}

/// Reassembles transformed chunks.
#[derive(Debug, Clone)]
pub struct Reassembler {
    parser: Option<JavaParser>,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    /// Reassembler that also runs the structural parser during validation.
    pub fn new() -> Self {
        Self {
            parser: Some(JavaParser::new()),
        }
    }

    /// Reassembler that only checks brace balance and imports.
    pub fn braces_only() -> Self {
        Self { parser: None }
    }

    /// Merge transformed chunks, then validate and repair once.
    pub fn merge(&self, chunks: &[TransformedChunk]) -> MergeOutcome {
        let mut ordered: Vec<&TransformedChunk> = chunks.iter().collect();
        ordered.sort_by_key(|c| c.chunk.index);

        if let [only] = ordered.as_slice() {
            if only.chunk.kind == ChunkKind::FullFile {
                let document = only.text().to_string();
                let issues = validate(&document, self.parser.as_ref());
                return MergeOutcome {
                    warning: self.warning(&document, issues),
                    document,
                    repairs: Vec::new(),
                };
            }
        }

        let document = assemble(&ordered);
        let issues = validate(&document, self.parser.as_ref());
        if issues.is_empty() {
            return MergeOutcome {
                document,
                warning: None,
                repairs: Vec::new(),
            };
        }

        debug!(issues = issues.len(), "Merged document failed validation, repairing");
        let (repaired, repairs) = repair(&document, &issues);
        let remaining = validate(&repaired, self.parser.as_ref());
        MergeOutcome {
            warning: self.warning(&repaired, remaining),
            document: repaired,
            repairs,
        }
    }

    fn warning(&self, document: &str, issues: Vec<Issue>) -> Option<MergeWarning> {
        if issues.is_empty() {
            return None;
        }
        let warning = MergeWarning {
            issues: issues.iter().map(|i| i.to_string()).collect(),
        };
        warn!(lines = document.lines().count(), warning = %warning, "Merged document kept with validation warning");
        Some(warning)
    }
}

/// Build the merged text from index-ordered chunks.
fn assemble(ordered: &[&TransformedChunk]) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(first) = ordered.first() {
        let imports = merged_imports(ordered);
        let header = build_header(first.chunk.package.as_deref(), &imports);
        let header = header.trim_end();
        if !header.is_empty() {
            parts.push(header.to_string());
        }
    }

    let mut idx = 0;
    while idx < ordered.len() {
        let current = ordered[idx];
        if current.chunk.kind.is_method() {
            let class = current.chunk.class_name().to_string();
            let run_end = ordered[idx..]
                .iter()
                .position(|c| !c.chunk.kind.is_method() || c.chunk.class_name() != class)
                .map_or(ordered.len(), |p| idx + p);
            parts.push(wrap_methods(&class, &ordered[idx..run_end]));
            idx = run_end;
        } else {
            let body = strip_leading_header(current.text());
            if !body.trim().is_empty() {
                parts.push(body.trim_end().to_string());
            }
            idx += 1;
        }
    }

    let mut document = parts.join("\n\n");
    document.push('\n');
    document
}

/// Document imports followed by imports the transformed texts introduced.
fn merged_imports(ordered: &[&TransformedChunk]) -> Vec<String> {
    let mut imports: Vec<String> = ordered
        .first()
        .map(|c| c.chunk.imports.clone())
        .unwrap_or_default();

    for chunk in ordered.iter().filter(|c| !c.is_fallback()) {
        let (_, found) = locate_header(chunk.text());
        for import in found {
            if !imports.contains(&import) {
                imports.push(import);
            }
        }
    }
    imports
}

/// Synthesize `class <Name> { ... }` around a run of method chunks.
fn wrap_methods(class: &str, run: &[&TransformedChunk]) -> String {
    let bodies: Vec<String> = run
        .iter()
        .filter_map(|c| {
            let method = method_name(&c.chunk.qualified_name);
            extract_method(c.text(), method)
                .or_else(|| {
                    debug!(chunk = %c.chunk.qualified_name, "No method signature in transformed text, using original");
                    extract_method(&c.chunk.content, method)
                })
                .or_else(|| {
                    warn!(chunk = %c.chunk.qualified_name, "Could not recover method body");
                    None
                })
        })
        .collect();

    format!("class {class} {{\n{}\n}}", bodies.join("\n\n"))
}

fn method_name(qualified_name: &str) -> &str {
    qualified_name
        .split_once('.')
        .map_or(qualified_name, |(_, m)| m)
}

/// Pull one method (with its leading comments and annotations) out of text
/// that wraps it in a package/import/class header.
pub fn extract_method(text: &str, method: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let call = format!("{method}(");

    let signature = lines
        .iter()
        .position(|l| SIGNATURE.is_match(l) && l.contains(&call))
        .or_else(|| lines.iter().position(|l| SIGNATURE.is_match(l)))
        .or_else(|| {
            lines.iter().position(|l| {
                let t = l.trim();
                t.contains(&call) && !is_comment_line(t) && !t.ends_with(';')
            })
        })?;

    let mut start = signature;
    while start > 0 {
        let prev = lines[start - 1].trim();
        let attached = prev.starts_with('@') || is_comment_line(prev) || prev.ends_with("*/");
        if !attached {
            break;
        }
        start -= 1;
    }

    let end = match bodyless_end(&lines, signature) {
        Some(end) => end,
        None => find_block_end(&lines, signature),
    };
    Some(lines[start..=end].join("\n"))
}

/// Line ending a declaration that terminates with `;` before any `{`.
fn bodyless_end(lines: &[&str], signature: usize) -> Option<usize> {
    for (idx, line) in lines.iter().enumerate().skip(signature) {
        let code = line.split("//").next().unwrap_or(line).trim_end();
        if code.contains('{') {
            return None;
        }
        if code.ends_with(';') {
            return Some(idx);
        }
    }
    None
}

/// Drop a re-emitted package/import header (and the blank or comment lines
/// before its last line); comments after the header are kept.
pub fn strip_leading_header(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut last_header = None;
    let mut in_block_comment = false;

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if in_block_comment {
            in_block_comment = !trimmed.contains("*/");
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        if trimmed.starts_with("/*") {
            in_block_comment = !trimmed.contains("*/");
            continue;
        }
        if is_package_line(trimmed) || is_import_line(trimmed) {
            last_header = Some(idx);
            continue;
        }
        break;
    }

    let rest = match last_header {
        Some(idx) => &lines[idx + 1..],
        None => &lines[..],
    };
    let first_content = rest.iter().position(|l| !l.trim().is_empty()).unwrap_or(rest.len());
    rest[first_content..].join("\n")
}
