//! Parse tree builder.
//!
//! Matches a library file against the grammar and produces a flat list of
//! top-level nodes. Nodes are built for every rule and then filtered through
//! [`library_selector`]: an unselected node is dropped and its selected
//! children take its place.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::parser::grammar::{
    include_path_span, library_selector, line_rule, model_name_span, opens_subckt, physical_lines,
    Line, Rule,
};

/// The file does not conform to the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}:{line}:{column}: {message}", path.display())]
pub struct ParseError {
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// A node of the parse tree, borrowing its text from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNode<'src> {
    pub rule: Rule,
    pub text: &'src str,
    /// 1-based line where the node starts.
    pub line: usize,
    pub children: Vec<ParseNode<'src>>,
}

impl<'src> ParseNode<'src> {
    fn new(rule: Rule, text: &'src str, line: usize) -> Self {
        Self {
            rule,
            text,
            line,
            children: Vec::new(),
        }
    }

    fn with_child(mut self, child: ParseNode<'src>) -> Self {
        self.children.push(child);
        self
    }

    pub fn is(&self, rule: Rule) -> bool {
        self.rule == rule
    }

    /// First child, if any.
    pub fn first_child(&self) -> Option<&ParseNode<'src>> {
        self.children.first()
    }
}

/// Top-level nodes of one file, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTree<'src> {
    pub source: &'src str,
    pub children: Vec<ParseNode<'src>>,
}

/// Build the parse tree of `source`. `path` is only used in error messages.
///
/// A leading UTF-8 byte-order mark is skipped.
pub fn parse_tree<'src>(source: &'src str, path: &Path) -> Result<ParseTree<'src>, ParseError> {
    let source = source.strip_prefix('\u{FEFF}').unwrap_or(source);
    TreeBuilder {
        source,
        path,
        lines: physical_lines(source),
    }
    .build()
}

struct TreeBuilder<'src, 'p> {
    source: &'src str,
    path: &'p Path,
    lines: Vec<Line>,
}

impl<'src, 'p> TreeBuilder<'src, 'p> {
    fn build(self) -> Result<ParseTree<'src>, ParseError> {
        let mut root = ParseNode::new(Rule::SpiceSource, self.source, 1);
        let mut idx = 0;

        while idx < self.lines.len() {
            let line = self.lines[idx];
            let text = line.text(self.source);

            let (node, next) = match line_rule(text) {
                Rule::BlankLine | Rule::CommentLine => {
                    idx += 1;
                    continue;
                }
                Rule::Continuation => {
                    let offset = text.len() - text.trim_start().len();
                    return Err(self.error_at(
                        &line,
                        offset,
                        "continuation line without a preceding statement",
                    ));
                }
                Rule::DotModel => {
                    let last = self.statement_end(idx);
                    (self.model_unit(Rule::DotModel, idx, last), last + 1)
                }
                Rule::DotSubckt => {
                    let last = self.subckt_end(idx)?;
                    (self.model_unit(Rule::DotSubckt, idx, last), last + 1)
                }
                Rule::DotInclude => {
                    let last = self.statement_end(idx);
                    (self.dot_include(idx, last)?, last + 1)
                }
                _ => {
                    let last = self.statement_end(idx);
                    let node = ParseNode::new(Rule::UnknownLine, self.span(idx, last), line.number);
                    (node, last + 1)
                }
            };

            root.children.push(node);
            idx = next;
        }

        let root = select(root);
        Ok(ParseTree {
            source: self.source,
            children: root.children,
        })
    }

    /// Index of the last physical line belonging to the statement at `first`.
    fn statement_end(&self, first: usize) -> usize {
        let mut last = first;
        for (idx, line) in self.lines.iter().enumerate().skip(first + 1) {
            match line_rule(line.text(self.source)) {
                Rule::Continuation => last = idx,
                Rule::BlankLine | Rule::CommentLine => {}
                _ => break,
            }
        }
        last
    }

    /// Index of the `.ends` line closing the `.subckt` at `first`.
    fn subckt_end(&self, first: usize) -> Result<usize, ParseError> {
        let mut depth = 0usize;
        for (idx, line) in self.lines.iter().enumerate().skip(first) {
            let text = line.text(self.source);
            // Nameless nested blocks still need their `.ends`.
            if opens_subckt(text) {
                depth += 1;
            } else if line_rule(text) == Rule::DotEnds {
                depth -= 1;
                if depth == 0 {
                    return Ok(self.statement_end(idx));
                }
            }
        }

        let line = self.lines[first];
        let text = line.text(self.source);
        let offset = text.len() - text.trim_start().len();
        let name = model_name_span(text)
            .map(|(s, e)| &text[s..e])
            .unwrap_or_default();
        Err(self.error_at(
            &line,
            offset,
            &format!("missing .ends for subcircuit '{}'", name),
        ))
    }

    fn model_unit(&self, rule: Rule, first: usize, last: usize) -> ParseNode<'src> {
        let line = self.lines[first];
        let text = line.text(self.source);
        let unit_text = self.span(first, last);

        let mut statement = ParseNode::new(rule, unit_text, line.number);
        if let Some((start, end)) = model_name_span(text) {
            statement = statement.with_child(ParseNode::new(
                Rule::ModelName,
                &self.source[line.start + start..line.start + end],
                line.number,
            ));
        }

        ParseNode::new(Rule::ModelUnit, unit_text, line.number).with_child(statement)
    }

    fn dot_include(&self, first: usize, last: usize) -> Result<ParseNode<'src>, ParseError> {
        let line = self.lines[first];
        let text = line.text(self.source);
        let span = include_path_span(text).map_err(|(offset, msg)| self.error_at(&line, offset, msg))?;

        let path = ParseNode::new(
            span.rule,
            &self.source[line.start + span.start..line.start + span.end],
            line.number,
        );
        Ok(ParseNode::new(Rule::DotInclude, self.span(first, last), line.number).with_child(path))
    }

    fn span(&self, first: usize, last: usize) -> &'src str {
        &self.source[self.lines[first].start..self.lines[last].end]
    }

    fn error_at(&self, line: &Line, offset: usize, message: &str) -> ParseError {
        let text = line.text(self.source);
        ParseError {
            path: self.path.to_path_buf(),
            line: line.number,
            column: text[..offset.min(text.len())].chars().count() + 1,
            message: message.to_string(),
        }
    }
}

/// Apply the library selector below `node`, keeping `node` itself.
fn select(mut node: ParseNode<'_>) -> ParseNode<'_> {
    let children = std::mem::take(&mut node.children);
    for child in children {
        let child = select(child);
        if library_selector(child.rule) {
            node.children.push(child);
        } else {
            node.children.extend(child.children);
        }
    }
    node
}
