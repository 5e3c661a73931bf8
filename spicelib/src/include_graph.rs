//! Graph of files visited while loading a library.
//!
//! Nodes are files (keyed by canonical path), edges are `.include`
//! directives. Includes that were refused because they would recurse into a
//! file already being parsed still get an edge, so the graph shows the cycle.

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Parsed,
    Unreadable,
    Malformed,
    Unresolved,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncludedFile {
    pub path: PathBuf,
    pub status: FileStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncludeEdge {
    /// Line of the `.include` directive in the including file.
    pub line: usize,
    /// Path as written in the directive.
    pub literal: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IncludeGraph {
    graph: DiGraph<IncludedFile, IncludeEdge>,
    #[serde(skip)]
    index: HashMap<PathBuf, NodeIndex>,
}

impl IncludeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node for `key`, created as pending if it is not in the graph yet.
    pub fn add_file(&mut self, key: &Path) -> NodeIndex {
        if let Some(&idx) = self.index.get(key) {
            return idx;
        }
        let idx = self.graph.add_node(IncludedFile {
            path: key.to_path_buf(),
            status: FileStatus::Pending,
        });
        self.index.insert(key.to_path_buf(), idx);
        idx
    }

    pub fn set_status(&mut self, node: NodeIndex, status: FileStatus) {
        if let Some(file) = self.graph.node_weight_mut(node) {
            file.status = status;
        }
    }

    pub fn add_include(&mut self, from: NodeIndex, to: NodeIndex, edge: IncludeEdge) {
        self.graph.add_edge(from, to, edge);
    }

    /// The file loading started from.
    pub fn root(&self) -> Option<&IncludedFile> {
        self.graph.node_weights().next()
    }

    pub fn file(&self, key: &Path) -> Option<&IncludedFile> {
        self.index.get(key).and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Every file, in the order it was first reached.
    pub fn files(&self) -> impl Iterator<Item = &IncludedFile> {
        self.graph.node_weights()
    }

    pub fn file_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn include_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Files directly included by `key`, in directive order.
    pub fn includes_of(&self, key: &Path) -> Vec<(&IncludeEdge, &IncludedFile)> {
        match self.index.get(key) {
            Some(&idx) => self.children(idx),
            None => Vec::new(),
        }
    }

    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Render the graph as an indented tree starting at the root.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        if self.graph.node_count() == 0 {
            return out;
        }
        let root = NodeIndex::new(0);
        let mut active = HashSet::new();
        self.render_node(root, None, 0, &mut active, &mut out);
        out
    }

    fn children(&self, idx: NodeIndex) -> Vec<(&IncludeEdge, &IncludedFile)> {
        let mut edges: Vec<_> = self.graph.edges(idx).collect();
        edges.sort_by_key(|e| (e.weight().line, e.id()));
        edges
            .into_iter()
            .map(|e| (e.weight(), &self.graph[e.target()]))
            .collect()
    }

    fn render_node(
        &self,
        idx: NodeIndex,
        edge: Option<&IncludeEdge>,
        depth: usize,
        active: &mut HashSet<NodeIndex>,
        out: &mut String,
    ) {
        let file = &self.graph[idx];
        let indent = "  ".repeat(depth);
        let cyclic = active.contains(&idx);

        let _ = match edge {
            Some(edge) => write!(out, "{}{} (line {})", indent, file.path.display(), edge.line),
            None => write!(out, "{}{}", indent, file.path.display()),
        };
        match (cyclic, file.status) {
            (true, _) => out.push_str(" [circular]"),
            (false, FileStatus::Parsed) | (false, FileStatus::Pending) => {}
            (false, FileStatus::Unreadable) => out.push_str(" [unreadable]"),
            (false, FileStatus::Malformed) => out.push_str(" [malformed]"),
            (false, FileStatus::Unresolved) => out.push_str(" [unresolved]"),
            (false, FileStatus::Skipped) => out.push_str(" [skipped]"),
        }
        out.push('\n');

        if cyclic {
            return;
        }
        active.insert(idx);
        let mut edges: Vec<_> = self.graph.edges(idx).collect();
        edges.sort_by_key(|e| (e.weight().line, e.id()));
        for e in edges {
            self.render_node(e.target(), Some(e.weight()), depth + 1, active, out);
        }
        active.remove(&idx);
    }
}
