//! Tree-sitter based structural parser for Java-shaped sources.
//!
//! Produces a flat skeleton of top-level class-like declarations and the
//! methods directly inside them. Extents are reported as 0-based rows;
//! block ends are left to the brace scanner so that every caller agrees on
//! where a block closes.

use anyhow::{anyhow, Result};
use tree_sitter::{Node, Parser, Tree};

/// Kind of a top-level declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Class,
    Interface,
    Enum,
    Record,
}

impl DeclKind {
    fn from_node_kind(kind: &str) -> Option<Self> {
        match kind {
            "class_declaration" => Some(DeclKind::Class),
            "interface_declaration" => Some(DeclKind::Interface),
            "enum_declaration" => Some(DeclKind::Enum),
            "record_declaration" => Some(DeclKind::Record),
            _ => None,
        }
    }
}

/// Position of a body's opening brace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyStart {
    pub row: usize,
    /// Byte offset within the row
    pub column: usize,
}

impl BodyStart {
    fn of(node: Node) -> Self {
        let pos = node.start_position();
        Self {
            row: pos.row,
            column: pos.column,
        }
    }
}

/// A method or constructor inside a class body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    /// First row, including attached doc comments
    pub start_row: usize,
    /// Row of the declaration itself (modifiers and annotations included)
    pub decl_row: usize,
    /// Last row of the node as parsed
    pub end_row: usize,
    /// None for abstract and interface methods
    pub body: Option<BodyStart>,
}

/// A top-level class-like declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    pub name: String,
    pub kind: DeclKind,
    /// First row, including attached doc comments
    pub start_row: usize,
    /// Row of the declaration itself
    pub decl_row: usize,
    /// Last row of the node as parsed
    pub end_row: usize,
    pub body: Option<BodyStart>,
    pub methods: Vec<MethodDecl>,
}

/// Structural outline of one source file.
#[derive(Debug, Clone, Default)]
pub struct JavaSkeleton {
    pub classes: Vec<ClassDecl>,
    pub parse_errors: Vec<String>,
}

impl JavaSkeleton {
    /// A skeleton the extractor can trust: no syntax errors and at least
    /// one class-like declaration.
    pub fn is_usable(&self) -> bool {
        self.parse_errors.is_empty() && !self.classes.is_empty()
    }
}

/// Java parser built on tree-sitter-java.
#[derive(Debug, Default, Clone, Copy)]
pub struct JavaParser;

impl JavaParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_tree(&self, content: &str) -> Result<Tree> {
        // Parser is not Sync, so one is built per call
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_java::language())?;
        parser
            .parse(content.as_bytes(), None)
            .ok_or_else(|| anyhow!("Failed to parse content"))
    }

    /// Parse source into a skeleton.
    pub fn parse(&self, content: &str) -> Result<JavaSkeleton> {
        let tree = self.parse_tree(content)?;
        let root = tree.root_node();

        let mut classes = Vec::new();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if let Some(kind) = DeclKind::from_node_kind(child.kind()) {
                classes.push(self.class_decl(child, kind, content));
            }
        }

        Ok(JavaSkeleton {
            classes,
            parse_errors: collect_errors(root),
        })
    }

    /// Syntax errors reported for a whole text.
    pub fn syntax_errors(&self, content: &str) -> Result<Vec<String>> {
        let tree = self.parse_tree(content)?;
        Ok(collect_errors(tree.root_node()))
    }

    fn class_decl(&self, node: Node, kind: DeclKind, content: &str) -> ClassDecl {
        let mut methods = Vec::new();
        let body = node.child_by_field_name("body");
        if let Some(body) = body {
            self.collect_methods(body, content, &mut methods);
        }

        ClassDecl {
            name: node_name(node, content).unwrap_or_else(|| "Anonymous".to_string()),
            kind,
            start_row: leading_comment_row(node),
            decl_row: node.start_position().row,
            end_row: node.end_position().row,
            body: body.map(BodyStart::of),
            methods,
        }
    }

    fn collect_methods(&self, body: Node, content: &str, methods: &mut Vec<MethodDecl>) {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            match child.kind() {
                "method_declaration" | "constructor_declaration" | "compact_constructor_declaration" => {
                    let Some(name) = node_name(child, content) else {
                        continue;
                    };
                    methods.push(MethodDecl {
                        name,
                        start_row: leading_comment_row(child),
                        decl_row: child.start_position().row,
                        end_row: child.end_position().row,
                        body: child.child_by_field_name("body").map(BodyStart::of),
                    });
                }
                // Enum methods live one level further down
                "enum_body_declarations" => self.collect_methods(child, content, methods),
                _ => {}
            }
        }
    }
}

fn node_name(node: Node, content: &str) -> Option<String> {
    node.child_by_field_name("name")
        .and_then(|n| n.utf8_text(content.as_bytes()).ok())
        .map(str::to_string)
}

fn is_comment(node: &Node) -> bool {
    matches!(node.kind(), "comment" | "line_comment" | "block_comment")
}

/// Row of the earliest comment directly attached above `node`.
fn leading_comment_row(node: Node) -> usize {
    let mut row = node.start_position().row;
    let mut current = node.prev_named_sibling();
    while let Some(sibling) = current {
        if !is_comment(&sibling) || sibling.end_position().row + 1 < row {
            break;
        }
        row = sibling.start_position().row;
        current = sibling.prev_named_sibling();
    }
    row
}

fn collect_errors(root: Node) -> Vec<String> {
    fn visit(node: Node, errors: &mut Vec<String>) {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            errors.push(format!(
                "Parse error at line {}, column {}",
                pos.row + 1,
                pos.column
            ));
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            visit(child, errors);
        }
    }

    let mut errors = Vec::new();
    if root.has_error() {
        visit(root, &mut errors);
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    const CALC: &str = r#"package demo;

import java.util.List;

/**
 * A calculator.
 */
public class Calc {
    private int total;

    /** Adds. */
    public int add(int a, int b) {
        return a + b;
    }

    public Calc() {
        total = 0;
    }
}

interface Shape {
    double area();
}
"#;

    #[test]
    fn test_parse_classes_and_methods() {
        let skeleton = JavaParser::new().parse(CALC).unwrap();
        assert!(skeleton.is_usable());
        assert_eq!(skeleton.classes.len(), 2);

        let calc = &skeleton.classes[0];
        assert_eq!(calc.name, "Calc");
        assert_eq!(calc.kind, DeclKind::Class);
        assert_eq!(calc.start_row, 4);
        assert_eq!(calc.decl_row, 7);
        assert_eq!(calc.end_row, 18);

        let names: Vec<_> = calc.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["add", "Calc"]);
        assert_eq!(calc.methods[0].start_row, 10);
        assert_eq!(calc.methods[0].decl_row, 11);
        assert_eq!(calc.body, Some(BodyStart { row: 7, column: 18 }));
        assert_eq!(calc.methods[0].body, Some(BodyStart { row: 11, column: 33 }));

        let shape = &skeleton.classes[1];
        assert_eq!(shape.kind, DeclKind::Interface);
        assert!(shape.methods[0].body.is_none());
    }

    #[test]
    fn test_body_start_follows_annotations() {
        let src = "@SuppressWarnings({\"unchecked\"})\nclass A {\n  @Tags({\"x\"})\n  void f() {\n  }\n}\n";
        let skeleton = JavaParser::new().parse(src).unwrap();
        let class = &skeleton.classes[0];
        assert_eq!(class.decl_row, 0);
        assert_eq!(class.body, Some(BodyStart { row: 1, column: 8 }));
        assert_eq!(class.methods[0].decl_row, 2);
        assert_eq!(class.methods[0].body, Some(BodyStart { row: 3, column: 11 }));
    }

    #[test]
    fn test_enum_methods() {
        let src = "enum Color {\n  RED, GREEN;\n  String lower() {\n    return name().toLowerCase();\n  }\n}\n";
        let skeleton = JavaParser::new().parse(src).unwrap();
        assert_eq!(skeleton.classes[0].kind, DeclKind::Enum);
        assert_eq!(skeleton.classes[0].methods[0].name, "lower");
    }

    #[test]
    fn test_parse_errors_make_skeleton_unusable() {
        let skeleton = JavaParser::new().parse("public class Broken {\n  void f( {\n").unwrap();
        assert!(!skeleton.parse_errors.is_empty());
        assert!(!skeleton.is_usable());
    }

    #[test]
    fn test_no_declarations_is_unusable() {
        let skeleton = JavaParser::new().parse("package a;\nimport b.C;\n").unwrap();
        assert!(skeleton.parse_errors.is_empty());
        assert!(!skeleton.is_usable());
    }
}
