//! Example: load a library with a custom reporter and list its models.
//! Run with: cargo run --example list_models [path/to/library.lib]

use spicelib::{CollectingReporter, ModelKind, SearchPathResolver, Severity, SpiceLibrary};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<(), spicelib::LibraryError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/root.lib".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example list_models [path/to/library.lib]");
        std::process::exit(1);
    }

    let mut library = SpiceLibrary::with_path_resolver(Arc::new(SearchPathResolver::new()));
    let mut reporter = CollectingReporter::new();
    library.read_file(path, Some(&mut reporter))?;

    println!("{} models in {}", library.len(), path.display());
    for (name, model) in library.iter() {
        match model.kind() {
            ModelKind::Device { device, .. } => {
                println!("  {} ({}, {} params)", name, device, model.params().len())
            }
            ModelKind::Subcircuit { pins, .. } => {
                println!("  {} (subcircuit, {} pins)", name, pins.len())
            }
        }
    }

    for message in reporter.messages() {
        eprintln!("  [{}] {}", message.severity, message.text);
    }
    if reporter.count(Severity::Error) > 0 {
        std::process::exit(1);
    }
    Ok(())
}
