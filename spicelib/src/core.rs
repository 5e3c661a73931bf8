//! Library loading facade shared by the CLI and embedding applications.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::include_graph::IncludeGraph;
use crate::library::SpiceLibrary;
use crate::parser::{LibraryError, SpiceLibraryParser, DEFAULT_MAX_INCLUDE_DEPTH};
use crate::reporter::{CollectingReporter, ReportMessage, Severity};
use crate::resolver::SearchPathResolver;

#[derive(Debug, thiserror::Error)]
pub enum SpiceLibError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),
}

/// Options for loading libraries.
#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Directories searched for includes not found next to the including file.
    pub search_paths: Vec<PathBuf>,
    pub max_include_depth: usize,
    /// Resolve includes relative to the including file. When off, include
    /// paths are used exactly as written.
    pub relative_includes: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            search_paths: vec![],
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            relative_includes: true,
        }
    }
}

/// Per-file load result: the library plus everything reported on the way.
#[derive(Debug)]
pub struct LoadResult {
    pub file: PathBuf,
    pub library: SpiceLibrary,
    pub diagnostics: Vec<ReportMessage>,
    pub include_graph: IncludeGraph,
    pub stats: LoadStats,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct LoadStats {
    pub models: usize,
    pub subcircuits: usize,
    pub files: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl LoadResult {
    pub fn has_errors(&self) -> bool {
        self.stats.errors > 0
    }

    pub fn has_warnings_or_errors(&self) -> bool {
        self.stats.errors > 0 || self.stats.warnings > 0
    }

    pub fn total_diagnostics(&self) -> usize {
        self.diagnostics.len()
    }
}

fn collect_stats(library: &SpiceLibrary, graph: &IncludeGraph, diagnostics: &[ReportMessage]) -> LoadStats {
    let subcircuits = library.models().iter().filter(|m| m.is_subcircuit()).count();
    let mut errors = 0;
    let mut warnings = 0;
    for d in diagnostics {
        match d.severity {
            Severity::Error => errors += 1,
            Severity::Warning => warnings += 1,
            Severity::Info | Severity::Action | Severity::Debug => {}
        }
    }
    LoadStats {
        models: library.len() - subcircuits,
        subcircuits,
        files: graph.file_count(),
        errors,
        warnings,
    }
}

/// File extensions treated as SPICE libraries when scanning a directory.
pub const LIBRARY_EXTENSIONS: &[&str] = &["lib", "mod", "spi", "sp", "cir", "inc", "sub", "lb"];

/// Recursively discover SPICE library files in a directory.
pub fn discover_library_files(dir: &Path) -> Result<Vec<PathBuf>, SpiceLibError> {
    let mut files = Vec::new();
    walk_dir(dir, &mut files, 0)?;
    files.sort();
    Ok(files)
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>, depth: usize) -> Result<(), SpiceLibError> {
    if depth > 20 {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with('.') || name == "target" || name == "build" {
                continue;
            }
            walk_dir(&path, files, depth + 1)?;
        } else if path.is_file() {
            let is_library = path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| {
                    LIBRARY_EXTENSIONS
                        .iter()
                        .any(|known| known.eq_ignore_ascii_case(ext))
                });
            if is_library {
                files.push(path);
            }
        }
    }
    Ok(())
}

/// Library loading API used by the CLI.
pub struct SpiceLibCore;

impl SpiceLibCore {
    /// Load a single library file.
    ///
    /// The root file must exist. Every other problem (bad models, missing
    /// includes, syntax errors) ends up in [`LoadResult::diagnostics`].
    pub fn load_library(path: &Path, options: LoadOptions) -> Result<LoadResult, SpiceLibError> {
        if !path.is_file() {
            return Err(SpiceLibError::NotFound(path.to_path_buf()));
        }

        let mut library = SpiceLibrary::new();
        if options.relative_includes {
            let resolver = SearchPathResolver::with_search_paths(options.search_paths.clone());
            library.set_path_resolver(Some(Arc::new(resolver)));
        }

        let mut reporter = CollectingReporter::new();
        let include_graph = {
            let mut parser = SpiceLibraryParser::new(&mut library)
                .with_max_include_depth(options.max_include_depth);
            parser.read_file(path, Some(&mut reporter))?;
            parser.into_include_graph()
        };

        let diagnostics = reporter.into_messages();
        let stats = collect_stats(&library, &include_graph, &diagnostics);
        Ok(LoadResult {
            file: path.to_path_buf(),
            library,
            diagnostics,
            include_graph,
            stats,
        })
    }

    /// Load every library file found under a directory.
    pub fn load_project(dir: &Path, options: LoadOptions) -> Result<Vec<LoadResult>, SpiceLibError> {
        let files = discover_library_files(dir)?;
        let mut results = Vec::new();
        for path in files {
            results.push(Self::load_library(&path, options.clone())?);
        }
        Ok(results)
    }
}
