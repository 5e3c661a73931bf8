pub mod grammar;
pub mod library_parser;
pub mod tree;

// Re-export for convenience
pub use grammar::{library_selector, Rule};
pub use library_parser::{LibraryError, SpiceLibraryParser, DEFAULT_MAX_INCLUDE_DEPTH};
pub use tree::{parse_tree, ParseError, ParseNode, ParseTree};
