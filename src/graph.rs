//! Relationship graphs built from per-chunk analyses.
//!
//! In graph mode each chunk's reply is a JSON document describing the
//! classes it saw and the calls between them. Per-file analyses are combined
//! and turned into a [`CodeGraph`]; per-file graphs are merged into one
//! repository graph.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Edge type used when a reply omits one.
pub const DEFAULT_RELATIONSHIP: &str = "method_call";

/// Edge type for calls leaving the analysed code.
pub const EXTERNAL_CALL: &str = "external_call";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Analysis of one chunk as returned by the transformation service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkAnalysis {
    #[serde(default)]
    pub classes: Vec<ClassInfo>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub external_calls: Vec<Relationship>,
}

impl ChunkAnalysis {
    /// Parse a reply. Text around the outermost JSON object is ignored.
    pub fn parse(reply: &str) -> Result<Self, serde_json::Error> {
        let body = match (reply.find('{'), reply.rfind('}')) {
            (Some(start), Some(end)) if start < end => &reply[start..=end],
            _ => reply,
        };
        serde_json::from_str(body)
    }

    /// Combine analyses: classes deduplicated by name (first wins),
    /// relationships and external calls appended in order.
    pub fn combine(analyses: impl IntoIterator<Item = ChunkAnalysis>) -> ChunkAnalysis {
        let mut combined = ChunkAnalysis::default();
        let mut seen = HashSet::new();

        for analysis in analyses {
            for class in analysis.classes {
                if !class.name.is_empty() && seen.insert(class.name.clone()) {
                    combined.classes.push(class);
                }
            }
            combined.relationships.extend(analysis.relationships);
            combined.external_calls.extend(analysis.external_calls);
        }
        combined
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Class,
    Method,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub name: String,
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub kind: String,
}

/// Deduplicated nodes and typed edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl CodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a combined analysis.
    pub fn from_analysis(analysis: &ChunkAnalysis) -> Self {
        let mut graph = Self::new();

        for class in &analysis.classes {
            graph.add_node(&class.name, NodeKind::Class, None);
            for method in &class.methods {
                graph.add_node(
                    &format!("{}.{}", class.name, method),
                    NodeKind::Method,
                    Some(&class.name),
                );
            }
        }

        for rel in &analysis.relationships {
            if let (Some(from), Some(to)) = (&rel.from, &rel.to) {
                let kind = rel.kind.as_deref().unwrap_or(DEFAULT_RELATIONSHIP);
                graph.add_edge(from, to, kind);
            }
        }

        for call in &analysis.external_calls {
            if let (Some(from), Some(to)) = (&call.from, &call.to) {
                graph.add_node(to, NodeKind::External, None);
                graph.add_edge(from, to, EXTERNAL_CALL);
            }
        }

        graph
    }

    /// Add a node unless one with the same name exists. A known node is
    /// never demoted to `External`.
    pub fn add_node(&mut self, name: &str, kind: NodeKind, parent: Option<&str>) {
        if let Some(existing) = self.nodes.iter_mut().find(|n| n.name == name) {
            if existing.kind == NodeKind::External && kind != NodeKind::External {
                existing.kind = kind;
                existing.parent = parent.map(str::to_string);
            }
            return;
        }
        self.nodes.push(GraphNode {
            name: name.to_string(),
            kind,
            parent: parent.map(str::to_string),
        });
    }

    /// Add an edge; duplicates collapse.
    pub fn add_edge(&mut self, from: &str, to: &str, kind: &str) {
        let edge = GraphEdge {
            from: from.to_string(),
            to: to.to_string(),
            kind: kind.to_string(),
        };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    /// Fold another graph into this one.
    pub fn merge(&mut self, other: &CodeGraph) {
        for node in &other.nodes {
            self.add_node(&node.name, node.kind, node.parent.as_deref());
        }
        for edge in &other.edges {
            self.add_edge(&edge.from, &edge.to, &edge.kind);
        }
    }

    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Edge counts per type.
    pub fn edge_kinds(&self) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for edge in &self.edges {
            *counts.entry(edge.kind.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"Here is the analysis:
{
  "classes": [{"name": "Calc", "methods": ["add", "sub"], "fields": ["total"]}],
  "relationships": [
    {"from": "Calc.add", "to": "Calc.sub"},
    {"from": "Calc", "to": "Logger", "type": "dependency"},
    {"from": "Calc.add"}
  ],
  "external_calls": [{"from": "Calc.add", "to": "Math.abs", "type": "static"}]
}"#;

    #[test]
    fn test_parse_tolerates_surrounding_text() {
        let analysis = ChunkAnalysis::parse(REPLY).unwrap();
        assert_eq!(analysis.classes[0].methods, vec!["add", "sub"]);
        assert_eq!(analysis.relationships.len(), 3);
        assert!(ChunkAnalysis::parse("no json here").is_err());
    }

    #[test]
    fn test_combine_dedupes_classes() {
        let first = ChunkAnalysis::parse(REPLY).unwrap();
        let second = ChunkAnalysis::parse(
            r#"{"classes": [{"name": "Calc", "methods": ["mul"]}, {"name": "Main"}], "relationships": [{"from": "Main", "to": "Calc"}]}"#,
        )
        .unwrap();

        let combined = ChunkAnalysis::combine([first, second]);
        let names: Vec<_> = combined.classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Calc", "Main"]);
        assert_eq!(combined.classes[0].methods, vec!["add", "sub"]);
        assert_eq!(combined.relationships.len(), 4);
        assert_eq!(combined.external_calls.len(), 1);
    }

    #[test]
    fn test_graph_nodes_and_edges() {
        let graph = CodeGraph::from_analysis(&ChunkAnalysis::parse(REPLY).unwrap());

        assert_eq!(graph.node("Calc").unwrap().kind, NodeKind::Class);
        let add = graph.node("Calc.add").unwrap();
        assert_eq!(add.kind, NodeKind::Method);
        assert_eq!(add.parent.as_deref(), Some("Calc"));
        assert_eq!(graph.node("Math.abs").unwrap().kind, NodeKind::External);

        let kinds = graph.edge_kinds();
        assert_eq!(kinds["method_call"], 1);
        assert_eq!(kinds["dependency"], 1);
        assert_eq!(kinds["external_call"], 1);
        assert_eq!(graph.edges.len(), 3);
    }

    #[test]
    fn test_merge_collapses_duplicates() {
        let mut a = CodeGraph::from_analysis(&ChunkAnalysis::parse(REPLY).unwrap());
        let b = a.clone();
        a.merge(&b);
        assert_eq!(a, b);

        let mut ext = CodeGraph::new();
        ext.add_node("Logger", NodeKind::External, None);
        ext.add_node("Logger", NodeKind::Class, None);
        assert_eq!(ext.nodes.len(), 1);
        assert_eq!(ext.nodes[0].kind, NodeKind::Class);
    }
}
