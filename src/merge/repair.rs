//! Post-merge validation and the narrow set of repairs applied to merged
//! documents.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::ast_engine::JavaParser;
use crate::chunkers::scanner::{brace_balance, is_balanced, is_import_line, is_package_line, BraceScanner};

/// Standard-library types whose missing import is repaired.
const KNOWN_IMPORTS: &[(&str, &str)] = &[
    ("Scanner", "java.util.Scanner"),
    ("List", "java.util.List"),
    ("ArrayList", "java.util.ArrayList"),
    ("Map", "java.util.Map"),
    ("HashMap", "java.util.HashMap"),
    ("Set", "java.util.Set"),
    ("HashSet", "java.util.HashSet"),
    ("Optional", "java.util.Optional"),
    ("Collectors", "java.util.stream.Collectors"),
];

lazy_static! {
    static ref TYPE_USAGES: Vec<(&'static str, &'static str, Regex)> = KNOWN_IMPORTS
        .iter()
        .map(|(name, path)| {
            let re = Regex::new(&format!(r"\b{name}\b")).expect("valid type regex");
            (*name, *path, re)
        })
        .collect();
    static ref LOCAL_DECL: Regex =
        Regex::new(r"\b(?:class|interface|enum|record)\s+(\w+)").expect("valid declaration regex");
}

/// A structural problem found in a merged document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum Issue {
    /// Net brace depth is not zero (positive means unclosed blocks)
    UnbalancedBraces { depth: i64 },
    /// A known standard-library type is used without an import
    MissingImport { path: String },
    /// The structural parser reported errors
    SyntaxErrors { errors: Vec<String> },
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Issue::UnbalancedBraces { depth } => write!(f, "unbalanced braces (depth {depth})"),
            Issue::MissingImport { path } => write!(f, "missing import {path}"),
            Issue::SyntaxErrors { errors } => {
                write!(f, "{} syntax error(s)", errors.len())?;
                if let Some(first) = errors.first() {
                    write!(f, ", first: {first}")?;
                }
                Ok(())
            }
        }
    }
}

/// A change applied to a merged document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "repair", rename_all = "snake_case")]
pub enum Repair {
    ClosedBraces { count: usize },
    AddedImport { path: String },
}

/// Check a merged document.
pub fn validate(text: &str, parser: Option<&JavaParser>) -> Vec<Issue> {
    let mut issues = Vec::new();

    if !is_balanced(text) {
        issues.push(Issue::UnbalancedBraces {
            depth: brace_balance(text),
        });
    }

    issues.extend(
        missing_imports(text)
            .into_iter()
            .map(|path| Issue::MissingImport { path }),
    );

    if let Some(parser) = parser {
        match parser.syntax_errors(text) {
            Ok(errors) if !errors.is_empty() => issues.push(Issue::SyntaxErrors { errors }),
            Ok(_) => {}
            Err(e) => issues.push(Issue::SyntaxErrors {
                errors: vec![e.to_string()],
            }),
        }
    }

    issues
}

/// Apply the repairs that address `issues`. Returns the repaired text and
/// what was changed.
pub fn repair(text: &str, issues: &[Issue]) -> (String, Vec<Repair>) {
    let mut repaired = text.to_string();
    let mut repairs = Vec::new();

    let missing: Vec<&str> = issues
        .iter()
        .filter_map(|i| match i {
            Issue::MissingImport { path } => Some(path.as_str()),
            _ => None,
        })
        .collect();
    if !missing.is_empty() {
        repaired = insert_imports(&repaired, &missing);
        repairs.extend(missing.iter().map(|p| Repair::AddedImport {
            path: p.to_string(),
        }));
    }

    let depth = brace_balance(&repaired);
    if depth > 0 {
        let count = depth as usize;
        let trimmed_len = repaired.trim_end().len();
        repaired.truncate(trimmed_len);
        for _ in 0..count {
            repaired.push_str("\n}");
        }
        repaired.push('\n');
        repairs.push(Repair::ClosedBraces { count });
    }

    (repaired, repairs)
}

/// Fully qualified names of known types used without an import.
///
/// Only code counts: mentions inside literals and comments are ignored. A
/// single-type import of the same simple name from any package, or a
/// wildcard import of the type's own package, satisfies the type.
pub fn missing_imports(text: &str) -> Vec<String> {
    let mut imported: Vec<&str> = Vec::new();
    let mut code = String::new();
    let mut scanner = BraceScanner::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if is_import_line(trimmed) {
            imported.push(
                trimmed
                    .trim_start_matches("import ")
                    .trim_start_matches("static ")
                    .trim_end_matches(';')
                    .trim(),
            );
        } else if !is_package_line(trimmed) {
            code.push_str(&scanner.mask_line(line));
            code.push('\n');
        }
    }

    let declared: Vec<&str> = LOCAL_DECL
        .captures_iter(&code)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();

    TYPE_USAGES
        .iter()
        .filter(|(name, path, re)| {
            re.is_match(&code) && !declared.contains(name) && !is_imported(&imported, name, path)
        })
        .map(|(_, path, _)| path.to_string())
        .collect()
}

fn is_imported(imported: &[&str], name: &str, path: &str) -> bool {
    let package = path.rsplit_once('.').map_or("", |(p, _)| p);
    imported.iter().any(|import| match import.rsplit_once('.') {
        Some((_, last)) if last == name => true,
        Some((pkg, "*")) => pkg == package,
        _ => false,
    })
}

/// Insert import lines after the last existing import, else after the
/// package line, else at the top.
fn insert_imports(text: &str, paths: &[&str]) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let new_lines: Vec<String> = paths.iter().map(|p| format!("import {p};")).collect();

    let last_import = lines.iter().rposition(|l| is_import_line(l.trim()));
    let package = lines.iter().position(|l| is_package_line(l.trim()));

    let mut out: Vec<String> = Vec::with_capacity(lines.len() + new_lines.len() + 2);
    match (last_import, package) {
        (Some(at), _) => {
            out.extend(lines[..=at].iter().map(|l| l.to_string()));
            out.extend(new_lines);
            out.extend(lines[at + 1..].iter().map(|l| l.to_string()));
        }
        (None, Some(at)) => {
            out.extend(lines[..=at].iter().map(|l| l.to_string()));
            out.push(String::new());
            out.extend(new_lines);
            out.extend(lines[at + 1..].iter().map(|l| l.to_string()));
        }
        (None, None) => {
            out.extend(new_lines);
            out.push(String::new());
            out.extend(lines.iter().map(|l| l.to_string()));
        }
    }

    let mut joined = out.join("\n");
    if text.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_document_has_no_issues() {
        let text = "package a;\n\nimport java.util.List;\n\nclass A {\n  List<String> xs;\n}\n";
        assert!(validate(text, Some(&JavaParser::new())).is_empty());
    }

    #[test]
    fn test_missing_scanner_import() {
        let text = "package a;\n\nclass A {\n  Scanner in = new Scanner(System.in);\n}\n";
        assert_eq!(missing_imports(text), vec!["java.util.Scanner"]);

        let issues = validate(text, None);
        let (fixed, repairs) = repair(text, &issues);
        assert_eq!(
            fixed,
            "package a;\n\nimport java.util.Scanner;\n\nclass A {\n  Scanner in = new Scanner(System.in);\n}\n"
        );
        assert_eq!(repairs, vec![Repair::AddedImport { path: "java.util.Scanner".into() }]);
        assert!(validate(&fixed, None).is_empty());
    }

    #[test]
    fn test_wildcard_and_local_declarations_count_as_present() {
        assert!(missing_imports("import java.util.*;\nclass A { Map<String, Set<String>> m; }").is_empty());
        assert!(missing_imports("class List {}\nclass B { List l; }").is_empty());
        assert!(missing_imports("// a List of things\nclass B {}").is_empty());
    }

    #[test]
    fn test_same_simple_name_from_other_package_is_present() {
        let text = "package a;\n\nimport java.awt.List;\n\nclass A {\n  List items;\n}\n";
        assert!(missing_imports(text).is_empty());
        assert!(validate(text, Some(&JavaParser::new())).is_empty());
    }

    #[test]
    fn test_literals_and_comments_are_not_usages() {
        let text = "class A {\n  String s = \"Set up the Map\"; // then a HashMap\n  char c = 'L';\n  /* Optional\n     Collectors */\n}\n";
        assert!(missing_imports(text).is_empty());

        let (fixed, repairs) = repair(text, &validate(text, None));
        assert_eq!(fixed, text);
        assert!(repairs.is_empty());

        let text = "class A {\n  String s = \"List\";\n  Map<String, String> m;\n}\n";
        assert_eq!(missing_imports(text), vec!["java.util.Map"]);
    }

    #[test]
    fn test_closes_unbalanced_braces() {
        let text = "class A {\n  void f() {\n  }\n";
        let issues = validate(text, None);
        assert_eq!(issues, vec![Issue::UnbalancedBraces { depth: 1 }]);

        let (fixed, repairs) = repair(text, &issues);
        assert_eq!(fixed, "class A {\n  void f() {\n  }\n}\n");
        assert_eq!(repairs, vec![Repair::ClosedBraces { count: 1 }]);
    }

    #[test]
    fn test_extra_closing_brace_is_not_repaired() {
        let text = "class A {\n}\n}\n";
        let issues = validate(text, None);
        let (fixed, repairs) = repair(text, &issues);
        assert_eq!(fixed, text);
        assert!(repairs.is_empty());
        assert!(!validate(&fixed, None).is_empty());
    }

    #[test]
    fn test_insert_after_imports() {
        let text = "import x.Y;\n\nclass A { ArrayList<Y> a; }";
        let (fixed, _) = repair(text, &validate(text, None));
        assert_eq!(fixed, "import x.Y;\nimport java.util.ArrayList;\n\nclass A { ArrayList<Y> a; }");
    }
}
