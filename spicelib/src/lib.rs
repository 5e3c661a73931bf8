//! spicelib - SPICE model library loader
//!
//! This library loads SPICE model libraries (`.lib`, `.mod`, `.spi`, ...)
//! into typed models, following `.include` directives recursively. Bad
//! models and broken includes are reported through a [`Reporter`] and never
//! stop the rest of the load.
//!
//! # Quick Start
//!
//! ```no_run
//! use spicelib::{CollectingReporter, SpiceLibrary};
//!
//! let mut library = SpiceLibrary::new();
//! let mut reporter = CollectingReporter::new();
//! library.read_file("models/diodes.lib", Some(&mut reporter)).unwrap();
//!
//! for (name, model) in library.iter() {
//!     println!("{}: {:?}", name, model.device_type());
//! }
//! for message in reporter.messages() {
//!     eprintln!("{}: {}", message.severity, message.text);
//! }
//! ```
//!
//! # Features
//!
//! - **Grammar-driven parsing**: model units, `.include` in three quoting
//!   forms, continuation lines, `.subckt` blocks
//! - **Depth-first includes** with cycle detection and a depth limit
//! - **Typed models**: device types, parameters with SPICE scale suffixes,
//!   `ako:` inheritance, subcircuits
//! - **Include graph** of every file visited

pub mod core;
pub mod include_graph;
pub mod library;
pub mod model;
pub mod parser;
pub mod reporter;
pub mod resolver;

// Re-export main types
pub use crate::core::{
    discover_library_files, LoadOptions, LoadResult, LoadStats, SpiceLibCore, SpiceLibError,
};
pub use include_graph::{FileStatus, IncludeEdge, IncludeGraph, IncludedFile};
pub use library::SpiceLibrary;
pub use model::{
    parse_value, DeviceType, FactoryError, ModelError, ModelFactory, ModelKind, ModelParam,
    SpiceModel, SpiceModelFactory,
};
pub use parser::{LibraryError, ParseError, SpiceLibraryParser};
pub use reporter::{
    CollectingReporter, ReportMessage, Reporter, Severity, StringReporter, TracingReporter,
};
pub use resolver::{PathResolver, ResolveError, SearchPathResolver};

/// Load a library file with default options (convenience wrapper).
pub fn load_library(path: &std::path::Path) -> Result<LoadResult, SpiceLibError> {
    SpiceLibCore::load_library(path, LoadOptions::default())
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        LoadOptions, LoadResult, LoadStats, Reporter, Severity, SpiceLibCore, SpiceLibError,
        SpiceLibrary, SpiceModel,
    };
}
