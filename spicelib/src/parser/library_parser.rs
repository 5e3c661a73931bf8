//! Library parser.
//!
//! Loads a library file, builds models from its model units and follows its
//! `.include` directives depth first, so models appear in the same order they
//! would if every include were pasted in place. Problems with a single model
//! or a single file are reported and skipped; they never stop the rest of the
//! load.

use std::fs;
use std::path::{Path, PathBuf};

use petgraph::graph::NodeIndex;
use thiserror::Error;

use crate::include_graph::{FileStatus, IncludeEdge, IncludeGraph};
use crate::library::SpiceLibrary;
use crate::model::{FactoryError, ModelFactory, SpiceModelFactory};
use crate::parser::grammar::Rule;
use crate::parser::tree::{parse_tree, ParseNode};
use crate::reporter::{Reporter, Severity, StringReporter};

/// Includes nested deeper than this are reported and skipped.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum LibraryError {
    /// Everything reported while loading without a caller-supplied reporter.
    #[error("{}", .0.trim_end())]
    Aggregate(String),
}

/// Loads library files into a [`SpiceLibrary`].
pub struct SpiceLibraryParser<'lib> {
    library: &'lib mut SpiceLibrary,
    factory: Box<dyn ModelFactory + 'lib>,
    max_include_depth: usize,
    include_stack: Vec<PathBuf>,
    graph: IncludeGraph,
}

impl<'lib> SpiceLibraryParser<'lib> {
    pub fn new(library: &'lib mut SpiceLibrary) -> Self {
        Self {
            library,
            factory: Box::new(SpiceModelFactory),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            include_stack: Vec::new(),
            graph: IncludeGraph::new(),
        }
    }

    pub fn with_factory(mut self, factory: impl ModelFactory + 'lib) -> Self {
        self.factory = Box::new(factory);
        self
    }

    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth.max(1);
        self
    }

    /// Files and includes visited by the last [`read_file`](Self::read_file).
    pub fn include_graph(&self) -> &IncludeGraph {
        &self.graph
    }

    pub fn into_include_graph(self) -> IncludeGraph {
        self.graph
    }

    /// Load `path` and everything it includes, replacing the library contents.
    ///
    /// With a reporter, every problem goes to it and this always returns
    /// `Ok`. Without one, problems are collected and returned together as
    /// [`LibraryError::Aggregate`]; models that did load are kept either way.
    pub fn read_file(
        &mut self,
        path: impl AsRef<Path>,
        reporter: Option<&mut dyn Reporter>,
    ) -> Result<(), LibraryError> {
        let path = path.as_ref();
        self.library.clear();
        self.include_stack.clear();
        self.graph = IncludeGraph::new();

        let result = match reporter {
            Some(reporter) => {
                self.parse_file(path, reporter);
                Ok(())
            }
            None => {
                let mut reporter = StringReporter::new();
                self.parse_file(path, &mut reporter);
                if reporter.has_message() {
                    Err(LibraryError::Aggregate(reporter.into_text()))
                } else {
                    Ok(())
                }
            }
        };

        tracing::info!(
            "Loaded {} models from {} ({} files)",
            self.library.len(),
            path.display(),
            self.graph.file_count()
        );
        result
    }

    fn parse_file(&mut self, path: &Path, reporter: &mut dyn Reporter) -> NodeIndex {
        let key = path_key(path);
        let node = self.graph.add_file(&key);
        tracing::debug!("Parsing library file {}", path.display());

        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) => {
                reporter.report(
                    &format!("Cannot read file '{}': {}", path.display(), e),
                    Severity::Error,
                );
                self.graph.set_status(node, FileStatus::Unreadable);
                return node;
            }
        };

        let tree = match parse_tree(&source, path) {
            Ok(tree) => tree,
            Err(e) => {
                reporter.report(&e.to_string(), Severity::Error);
                self.graph.set_status(node, FileStatus::Malformed);
                return node;
            }
        };

        self.include_stack.push(key);
        for child in &tree.children {
            match child.rule {
                Rule::ModelUnit => self.add_model(child, path, reporter),
                Rule::DotInclude => self.include(child, path, node, reporter),
                Rule::UnknownLine => {}
                rule => {
                    debug_assert!(false, "Unhandled parse tree node {:?}", rule);
                    tracing::error!("Unhandled parse tree node {:?} in {}", rule, path.display());
                }
            }
        }
        self.include_stack.pop();

        self.graph.set_status(node, FileStatus::Parsed);
        node
    }

    fn add_model(&mut self, node: &ParseNode<'_>, path: &Path, reporter: &mut dyn Reporter) {
        let Some(name) = node.first_child().filter(|c| c.is(Rule::ModelName)) else {
            debug_assert!(false, "model unit without a model name");
            return;
        };

        match self.factory.create(self.library, node.text) {
            Ok(model) => self.library.push(model, name.text.to_string()),
            Err(FactoryError::Model(e)) => {
                reporter.report(
                    &format!("{}:{}: {}", path.display(), node.line, e),
                    Severity::Error,
                );
            }
            Err(FactoryError::Other(e)) => {
                tracing::debug!("Model factory failed: {}", e);
                reporter.report(
                    &format!("Cannot create sim model from {}", node.text),
                    Severity::Error,
                );
            }
        }
    }

    fn include(
        &mut self,
        node: &ParseNode<'_>,
        path: &Path,
        current: NodeIndex,
        reporter: &mut dyn Reporter,
    ) {
        let Some(literal) = node.first_child().map(|c| c.text) else {
            debug_assert!(false, "include directive without a path");
            return;
        };
        let edge = IncludeEdge {
            line: node.line,
            literal: literal.to_string(),
        };

        let resolved = match self.library.path_resolver().cloned() {
            Some(resolver) => match resolver.resolve(literal, path) {
                Ok(resolved) => resolved,
                Err(e) => {
                    reporter.report(
                        &format!(
                            "Cannot resolve include '{}' in '{}': {}",
                            literal,
                            path.display(),
                            e
                        ),
                        Severity::Error,
                    );
                    let target = self.graph.add_file(Path::new(literal));
                    self.graph.set_status(target, FileStatus::Unresolved);
                    self.graph.add_include(current, target, edge);
                    return;
                }
            },
            None => PathBuf::from(literal),
        };

        let key = path_key(&resolved);
        if self.include_stack.contains(&key) {
            reporter.report(
                &format!(
                    "Circular include of '{}' in '{}'",
                    resolved.display(),
                    path.display()
                ),
                Severity::Error,
            );
            let target = self.graph.add_file(&key);
            self.graph.add_include(current, target, edge);
            return;
        }

        if self.include_stack.len() >= self.max_include_depth {
            reporter.report(
                &format!(
                    "Include depth limit of {} exceeded at '{}' in '{}'",
                    self.max_include_depth,
                    resolved.display(),
                    path.display()
                ),
                Severity::Error,
            );
            let target = self.graph.add_file(&key);
            self.graph.set_status(target, FileStatus::Skipped);
            self.graph.add_include(current, target, edge);
            return;
        }

        tracing::debug!("Including {} from {}", resolved.display(), path.display());
        let target = self.parse_file(&resolved, reporter);
        self.graph.add_include(current, target, edge);
    }
}

/// Identity of a file for cycle detection and the include graph.
fn path_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SpiceModel;
    use crate::reporter::CollectingReporter;
    use crate::resolver::{ResolveError, SearchPathResolver};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn relative_library() -> SpiceLibrary {
        SpiceLibrary::with_path_resolver(Arc::new(SearchPathResolver::new()))
    }

    #[test]
    fn test_models_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(
            &dir,
            "root.lib",
            ".model A D\nR1 1 2 1k\n.model B NPN(BF=100)\n* note\n.model C PNP\n",
        );

        let mut library = SpiceLibrary::new();
        SpiceLibraryParser::new(&mut library).read_file(&root, None).unwrap();

        assert_eq!(library.model_names(), &["A", "B", "C"]);
        assert_eq!(library.models().len(), library.model_names().len());
    }

    #[test]
    fn test_include_is_depth_first() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "lib2.spi", ".model model3 D\n");
        let root = write(
            &dir,
            "root.lib",
            ".model model1 D\n.include \"lib2.spi\"\n.model model2 D\n",
        );

        let mut library = relative_library();
        let mut reporter = CollectingReporter::new();
        library.read_file(&root, Some(&mut reporter)).unwrap();

        assert!(!reporter.has_message(), "{:?}", reporter.messages());
        assert_eq!(library.model_names(), &["model1", "model3", "model2"]);
    }

    #[test]
    fn test_nested_includes_keep_textual_order() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "c.lib", ".model C1 D\n");
        write(&dir, "b.lib", ".model B1 D\n.include c.lib\n.model B2 D\n");
        let root = write(&dir, "root.lib", ".model R1 D\n.include b.lib\n.model R2 D\n");

        let mut library = relative_library();
        let mut reporter = CollectingReporter::new();
        library.read_file(&root, Some(&mut reporter)).unwrap();

        assert!(!reporter.has_message(), "{:?}", reporter.messages());
        assert_eq!(library.model_names(), &["R1", "B1", "C1", "B2", "R2"]);
    }

    #[test]
    fn test_byte_order_mark_does_not_drop_first_model() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(&dir, "bom.lib", "\u{FEFF}.model A D\n.model B D\n");

        let mut library = SpiceLibrary::new();
        let mut reporter = CollectingReporter::new();
        library.read_file(&root, Some(&mut reporter)).unwrap();

        assert!(!reporter.has_message(), "{:?}", reporter.messages());
        assert_eq!(library.model_names(), &["A", "B"]);
    }

    #[test]
    fn test_include_with_trailing_dollar_comment() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "b.lib", ".model B D\n");
        let root = write(&dir, "root.lib", ".include b.lib $ vendor models\n.model A D\n");

        let mut library = relative_library();
        let mut reporter = CollectingReporter::new();
        library.read_file(&root, Some(&mut reporter)).unwrap();

        assert!(!reporter.has_message(), "{:?}", reporter.messages());
        assert_eq!(library.model_names(), &["B", "A"]);
    }

    #[test]
    fn test_bad_model_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(&dir, "root.lib", ".model A D\n.model B BOGUS\n.model C D\n");

        let mut library = SpiceLibrary::new();
        let mut reporter = CollectingReporter::new();
        library.read_file(&root, Some(&mut reporter)).unwrap();

        assert_eq!(library.model_names(), &["A", "C"]);
        assert_eq!(reporter.count(Severity::Error), 1);
        assert!(reporter.messages()[0].text.contains("BOGUS"));
        assert!(reporter.messages()[0].text.contains(":2:"));
    }

    #[test]
    fn test_without_reporter_errors_are_aggregated() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(
            &dir,
            "root.lib",
            ".model A BOGUS\n.model B D\n.include missing.lib\n",
        );

        let mut library = SpiceLibrary::new();
        let err = library.read_file(&root, None).unwrap_err();
        let LibraryError::Aggregate(text) = &err;
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("BOGUS"));
        assert!(text.contains("missing.lib"));
        assert_eq!(library.model_names(), &["B"]);
    }

    #[test]
    fn test_reread_replaces_models() {
        let dir = tempfile::tempdir().unwrap();
        let first = write(&dir, "first.lib", ".model A D\n.model B D\n");
        let second = write(&dir, "second.lib", ".subckt X a b\n.ends\n");

        let mut library = SpiceLibrary::new();
        library.read_file(&first, None).unwrap();
        assert_eq!(library.len(), 2);

        library.read_file(&second, None).unwrap();
        assert_eq!(library.model_names(), &["X"]);

        assert!(library.read_file(dir.path().join("nope.lib"), None).is_err());
        assert!(library.is_empty());
        assert!(library.model_names().is_empty());
    }

    #[test]
    fn test_circular_include_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "b.lib", ".model B D\n.include a.lib\n");
        let root = write(&dir, "a.lib", ".model A D\n.include b.lib\n.model A2 D\n");

        let mut library = relative_library();
        let mut reporter = CollectingReporter::new();
        let mut parser = SpiceLibraryParser::new(&mut library);
        parser.read_file(&root, Some(&mut reporter)).unwrap();

        assert!(parser.include_graph().has_cycle());
        assert_eq!(parser.include_graph().file_count(), 2);
        drop(parser);

        assert_eq!(library.model_names(), &["A", "B", "A2"]);
        assert_eq!(reporter.count(Severity::Error), 1);
        assert!(reporter.messages()[0].text.contains("Circular include"));
    }

    #[test]
    fn test_diamond_include_parses_twice() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "common.lib", ".model COMMON D\n");
        write(&dir, "left.lib", ".include common.lib\n.model LEFT D\n");
        write(&dir, "right.lib", ".include common.lib\n.model RIGHT D\n");
        let root = write(&dir, "root.lib", ".include left.lib\n.include right.lib\n");

        let mut library = relative_library();
        library.read_file(&root, None).unwrap();
        assert_eq!(
            library.model_names(),
            &["COMMON", "LEFT", "COMMON", "RIGHT"]
        );
    }

    #[test]
    fn test_include_depth_limit() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "c.lib", ".model C D\n");
        write(&dir, "b.lib", ".model B D\n.include c.lib\n");
        let root = write(&dir, "a.lib", ".model A D\n.include b.lib\n");

        let mut library = relative_library();
        let mut reporter = CollectingReporter::new();
        SpiceLibraryParser::new(&mut library)
            .with_max_include_depth(2)
            .read_file(&root, Some(&mut reporter))
            .unwrap();

        assert_eq!(library.model_names(), &["A", "B"]);
        assert_eq!(reporter.count(Severity::Error), 1);
        assert!(reporter.messages()[0].text.contains("depth limit"));
    }

    #[test]
    fn test_resolver_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(&dir, "root.lib", ".include \"${UNSET_SPICELIB_TEST_VAR}/x.lib\"\n.model A D\n");

        let resolver = |literal: &str, _including: &Path| -> Result<PathBuf, ResolveError> {
            Err(ResolveError::Other(format!("refusing {}", literal)))
        };
        let mut library = SpiceLibrary::with_path_resolver(Arc::new(resolver));
        let mut reporter = CollectingReporter::new();
        let mut parser = SpiceLibraryParser::new(&mut library);
        parser.read_file(&root, Some(&mut reporter)).unwrap();

        let unresolved: Vec<_> = parser
            .include_graph()
            .files()
            .filter(|f| f.status == FileStatus::Unresolved)
            .collect();
        assert_eq!(unresolved.len(), 1);
        drop(parser);

        assert_eq!(library.model_names(), &["A"]);
        assert_eq!(reporter.count(Severity::Error), 1);
    }

    #[test]
    fn test_parse_error_stops_only_that_file() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "broken.lib", ".model X D\n.subckt OPEN a b\nR1 a b 1k\n");
        let root = write(&dir, "root.lib", ".include broken.lib\n.model A D\n");

        let mut library = relative_library();
        let mut reporter = CollectingReporter::new();
        library.read_file(&root, Some(&mut reporter)).unwrap();

        assert_eq!(library.model_names(), &["A"]);
        assert_eq!(reporter.count(Severity::Error), 1);
        assert!(reporter.messages()[0].text.contains("missing .ends"));
    }

    struct FailingFactory;

    impl ModelFactory for FailingFactory {
        fn create(&self, library: &SpiceLibrary, text: &str) -> Result<SpiceModel, FactoryError> {
            if text.contains("CRASH") {
                Err(FactoryError::Other("internal failure".to_string()))
            } else {
                Ok(SpiceModel::create(library, text)?)
            }
        }
    }

    #[test]
    fn test_unexpected_factory_failure_uses_generic_message() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(&dir, "root.lib", ".model CRASH D\n.model OK D\n");

        let mut library = SpiceLibrary::new();
        let mut reporter = CollectingReporter::new();
        SpiceLibraryParser::new(&mut library)
            .with_factory(FailingFactory)
            .read_file(&root, Some(&mut reporter))
            .unwrap();

        assert_eq!(library.model_names(), &["OK"]);
        assert_eq!(
            reporter.messages()[0].text,
            "Cannot create sim model from .model CRASH D"
        );
    }
}
