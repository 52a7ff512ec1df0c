//! Brace/literal-aware boundary detection.
//!
//! One state machine drives every place that needs to know where a block
//! ends: class extents during extraction, method extents during extraction,
//! method bodies recovered from transformed text during merge, and the
//! balanced-brace check run over merged documents.

/// Where the scanner currently is within a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    Code,
    InString,
    InChar,
    /// The next character is consumed verbatim, then scanning resumes.
    Escaped(Resume),
    LineComment,
    BlockComment,
}

/// State to return to after an escaped character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    Code,
    InString,
    InChar,
}

impl From<Resume> for ScanState {
    fn from(resume: Resume) -> Self {
        match resume {
            Resume::Code => ScanState::Code,
            Resume::InString => ScanState::InString,
            Resume::InChar => ScanState::InChar,
        }
    }
}

/// Incremental brace-depth counter that ignores braces inside string or
/// character literals and comments.
///
/// Literal state does not survive a line break (an unterminated quote only
/// poisons its own line); block comments do.
#[derive(Debug, Clone, Default)]
pub struct BraceScanner {
    state: ScanState,
    depth: i64,
    min_depth: i64,
    opened: bool,
}

impl BraceScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its terminator).
    pub fn feed_line(&mut self, line: &str) {
        self.scan(line, |_, _| {});
    }

    /// Feed one line and return it with literal and comment characters
    /// blanked to spaces, leaving only code.
    pub fn mask_line(&mut self, line: &str) -> String {
        let mut masked = String::with_capacity(line.len());
        self.scan(line, |c, code| masked.push(if code { c } else { ' ' }));
        masked
    }

    fn scan(&mut self, line: &str, mut emit: impl FnMut(char, bool)) {
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            let before = self.state;
            self.state = match self.state {
                ScanState::Escaped(resume) => resume.into(),
                ScanState::LineComment => ScanState::LineComment,
                ScanState::BlockComment => {
                    if c == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        ScanState::Code
                    } else {
                        ScanState::BlockComment
                    }
                }
                ScanState::InString => match c {
                    '\\' => ScanState::Escaped(Resume::InString),
                    '"' => ScanState::Code,
                    _ => ScanState::InString,
                },
                ScanState::InChar => match c {
                    '\\' => ScanState::Escaped(Resume::InChar),
                    '\'' => ScanState::Code,
                    _ => ScanState::InChar,
                },
                ScanState::Code => match c {
                    '\\' => ScanState::Escaped(Resume::Code),
                    '"' => ScanState::InString,
                    '\'' => ScanState::InChar,
                    '/' if chars.peek() == Some(&'/') => {
                        chars.next();
                        ScanState::LineComment
                    }
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        ScanState::BlockComment
                    }
                    '{' => {
                        self.depth += 1;
                        self.opened = true;
                        ScanState::Code
                    }
                    '}' => {
                        self.depth -= 1;
                        self.min_depth = self.min_depth.min(self.depth);
                        ScanState::Code
                    }
                    _ => ScanState::Code,
                },
            };
            let code = (before == ScanState::Code && self.state == ScanState::Code)
                || before == ScanState::Escaped(Resume::Code);
            emit(c, code);
        }

        if self.state != ScanState::BlockComment {
            self.state = ScanState::Code;
        }
    }

    /// Current brace depth; negative when more braces closed than opened.
    pub fn depth(&self) -> i64 {
        self.depth
    }

    /// Whether a code-level `{` has been seen.
    pub fn has_opened(&self) -> bool {
        self.opened
    }

    /// Depth returned to zero (or below) after having been positive.
    pub fn is_closed(&self) -> bool {
        self.opened && self.depth <= 0
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Depth is zero and never dipped below zero.
    pub fn is_balanced(&self) -> bool {
        self.depth == 0 && self.min_depth == 0
    }
}

/// Index of the line where the block opened at or after `start` closes.
///
/// Returns the last line index when braces never balance.
pub fn find_block_end(lines: &[&str], start: usize) -> usize {
    find_block_end_at(lines, start, 0)
}

/// Like [`find_block_end`], but scanning of the first line begins at byte
/// `column`, so braces earlier on that line (annotation arguments, array
/// initializers) are not counted.
pub fn find_block_end_at(lines: &[&str], row: usize, column: usize) -> usize {
    let last = lines.len().saturating_sub(1);
    let mut scanner = BraceScanner::new();
    for (idx, line) in lines.iter().enumerate().skip(row) {
        let line = if idx == row {
            line.get(column..).unwrap_or(line)
        } else {
            line
        };
        scanner.feed_line(line);
        if scanner.is_closed() {
            return idx;
        }
    }
    last
}

/// Net brace depth over a whole text.
pub fn brace_balance(text: &str) -> i64 {
    let mut scanner = BraceScanner::new();
    text.lines().for_each(|l| scanner.feed_line(l));
    scanner.depth()
}

/// Whether a whole text has balanced braces.
pub fn is_balanced(text: &str) -> bool {
    let mut scanner = BraceScanner::new();
    text.lines().for_each(|l| scanner.feed_line(l));
    scanner.is_balanced()
}

pub fn is_package_line(trimmed: &str) -> bool {
    trimmed.starts_with("package ") && trimmed.ends_with(';')
}

pub fn is_import_line(trimmed: &str) -> bool {
    trimmed.starts_with("import ") && trimmed.ends_with(';')
}

pub fn is_comment_line(trimmed: &str) -> bool {
    trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*')
}

/// Locate the package declaration and the distinct import lines.
///
/// Scanning stops at the first line that is neither blank, a comment, nor a
/// package/import declaration.
pub fn locate_header(text: &str) -> (Option<String>, Vec<String>) {
    let mut package = None;
    let mut imports: Vec<String> = Vec::new();
    let mut in_block_comment = false;

    for line in text.lines() {
        let trimmed = line.trim();

        if in_block_comment {
            if trimmed.contains("*/") {
                in_block_comment = false;
            }
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        if trimmed.starts_with("/*") {
            in_block_comment = !trimmed.contains("*/");
            continue;
        }

        if is_package_line(trimmed) {
            if package.is_none() {
                package = Some(trimmed.to_string());
            }
        } else if is_import_line(trimmed) {
            if !imports.iter().any(|i| i == trimmed) {
                imports.push(trimmed.to_string());
            }
        } else {
            break;
        }
    }

    (package, imports)
}

/// Render the header block that precedes chunk content.
///
/// Package and imports are each followed by a blank line; an empty header
/// renders as an empty string.
pub fn build_header(package: Option<&str>, imports: &[String]) -> String {
    let mut header = String::new();
    if let Some(package) = package {
        header.push_str(package);
        header.push_str("\n\n");
    }
    if !imports.is_empty() {
        header.push_str(&imports.join("\n"));
        header.push_str("\n\n");
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn test_block_end_simple() {
        let src = "class A {\n  void f() {\n  }\n}\nclass B {}";
        assert_eq!(find_block_end(&lines(src), 0), 3);
        assert_eq!(find_block_end(&lines(src), 1), 2);
        assert_eq!(find_block_end(&lines(src), 4), 4);
    }

    #[test]
    fn test_brace_in_string_is_ignored() {
        let src = "void f() {\n  String s = \"{\";\n}\nint x = 1;\nint y = 2;";
        assert_eq!(find_block_end(&lines(src), 0), 2);

        let src = "void f() {\n  String s = \"}\"; char c = '}';\n  g();\n}\nrest();";
        assert_eq!(find_block_end(&lines(src), 0), 3);
    }

    #[test]
    fn test_escaped_quote_keeps_literal_open() {
        let src = "void f() {\n  String s = \"\\\"}\";\n}\n";
        assert_eq!(find_block_end(&lines(src), 0), 2);

        let src = "void f() {\n  char c = '\\'';\n  char d = '{';\n}\n";
        assert_eq!(find_block_end(&lines(src), 0), 3);
    }

    #[test]
    fn test_comments_ignored() {
        let src = "void f() { // }\n  /* }\n  } */\n}\nnext();";
        assert_eq!(find_block_end(&lines(src), 0), 3);
    }

    #[test]
    fn test_declaration_without_body_waits_for_open() {
        let src = "@Override\npublic void f()\n{\n}\n";
        assert_eq!(find_block_end(&lines(src), 0), 3);
    }

    #[test]
    fn test_block_end_from_body_skips_annotation_braces() {
        let src = "@SuppressWarnings({\"unchecked\"})\nvoid f() {\n  g();\n}\nh();";
        assert_eq!(find_block_end(&lines(src), 0), 0);
        assert_eq!(find_block_end_at(&lines(src), 1, 9), 3);

        let src = "} void f() {\n  g();\n}";
        assert_eq!(find_block_end_at(&lines(src), 0, 11), 2);
    }

    #[test]
    fn test_unbalanced_returns_last_line() {
        let src = "class A {\n  void f() {\n  }\n";
        assert_eq!(find_block_end(&lines(src), 0), 2);
        assert_eq!(find_block_end(&[], 0), 0);
    }

    #[test]
    fn test_literal_state_resets_per_line() {
        let mut scanner = BraceScanner::new();
        scanner.feed_line("String s = \"unterminated {");
        assert_eq!(scanner.state(), ScanState::Code);
        scanner.feed_line("{");
        assert_eq!(scanner.depth(), 1);

        scanner.feed_line("/* still");
        assert_eq!(scanner.state(), ScanState::BlockComment);
    }

    #[test]
    fn test_mask_keeps_only_code() {
        let words = |text: &str| {
            let mut scanner = BraceScanner::new();
            let masked: Vec<String> = text.lines().map(|l| scanner.mask_line(l)).collect();
            masked.join("\n").split_whitespace().map(str::to_string).collect::<Vec<_>>()
        };
        assert_eq!(words(r#"s = "Set {"; // List"#), vec!["s", "=", ";"]);
        assert_eq!(words("c = '}';"), vec!["c", "=", ";"]);
        assert_eq!(words("a /* List\n Map */ b"), vec!["a", "b"]);
        assert_eq!(words("x = \"\\\" Map\" + y;"), vec!["x", "=", "+", "y;"]);
    }

    #[test]
    fn test_balance() {
        assert!(is_balanced("class A {\n void f() { \"}\"; }\n}"));
        assert!(!is_balanced("class A {\n"));
        assert!(!is_balanced("}\n{"));
        assert_eq!(brace_balance("class A {\n  class B {\n"), 2);
    }

    #[test]
    fn test_locate_header() {
        let src = "/*\n * License\n */\npackage com.example;\n\n// utils\nimport java.util.List;\nimport java.util.Map;\nimport java.util.List;\n\npublic class A {\n}\nimport fake.After;\n";
        let (package, imports) = locate_header(src);
        assert_eq!(package.as_deref(), Some("package com.example;"));
        assert_eq!(imports, vec!["import java.util.List;", "import java.util.Map;"]);
    }

    #[test]
    fn test_locate_header_absent() {
        let (package, imports) = locate_header("class A {}\n");
        assert!(package.is_none());
        assert!(imports.is_empty());
    }

    #[test]
    fn test_build_header() {
        let imports = vec!["import a.B;".to_string(), "import a.C;".to_string()];
        assert_eq!(
            build_header(Some("package a;"), &imports),
            "package a;\n\nimport a.B;\nimport a.C;\n\n"
        );
        assert_eq!(build_header(None, &[]), "");
    }
}
