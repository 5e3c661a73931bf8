//! spicelib CLI - load and inspect SPICE model libraries from the command line.

use clap::{Args, Parser, Subcommand, ValueEnum};
use spicelib::{
    LoadOptions, LoadResult, ModelKind, ReportMessage, Severity, SearchPathResolver, SpiceLibCore,
    SpiceLibrary, SpiceLibraryParser, TracingReporter,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "spicelib")]
#[command(about = "SPICE model library loader and checker", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a library file and report problems
    Check {
        /// Path to the library file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if diagnostics at this severity or higher were reported
        #[arg(long, value_enum)]
        fail_on: Option<FailOnSeverity>,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Load every library file in a directory
    Project {
        /// Path to the directory
        #[arg(value_name = "DIR", default_value = ".")]
        dir: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if diagnostics at this severity or higher were reported
        #[arg(long, value_enum)]
        fail_on: Option<FailOnSeverity>,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// List the models defined by a library
    Models {
        /// Path to the library file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Show model parameters
        #[arg(long)]
        params: bool,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Show the include tree of a library
    Includes {
        /// Path to the library file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: TreeFormat,

        #[command(flatten)]
        load: LoadArgs,
    },
}

#[derive(Args, Clone)]
struct LoadArgs {
    /// Additional directory to search for included files (repeatable)
    #[arg(short = 'I', long = "search-path", value_name = "DIR")]
    search_paths: Vec<PathBuf>,

    /// Maximum include nesting depth
    #[arg(long, default_value_t = spicelib::parser::DEFAULT_MAX_INCLUDE_DEPTH)]
    max_depth: usize,

    /// Use include paths exactly as written instead of resolving them
    /// relative to the including file
    #[arg(long)]
    no_resolve: bool,
}

impl LoadArgs {
    fn options(&self) -> LoadOptions {
        LoadOptions {
            search_paths: self.search_paths.clone(),
            max_include_depth: self.max_depth,
            relative_includes: !self.no_resolve,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for CI/CD
    Json,
    /// GitHub Actions format
    Github,
}

#[derive(Clone, ValueEnum)]
enum TreeFormat {
    Human,
    Json,
}

#[derive(Clone, ValueEnum)]
enum FailOnSeverity {
    Error,
    Warning,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let exit_code = match cli.command {
        Commands::Check {
            file,
            format,
            fail_on,
            load,
        } => handle_check(&file, format, fail_on, &load),
        Commands::Project {
            dir,
            format,
            fail_on,
            load,
        } => handle_project(&dir, format, fail_on, &load),
        Commands::Models { file, params, load } => handle_models(&file, params, &load),
        Commands::Includes { file, format, load } => handle_includes(&file, format, &load),
    };

    process::exit(exit_code);
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        tracing::Level::ERROR
    } else {
        match verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            _ => tracing::Level::DEBUG,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_check(
    file: &Path,
    format: OutputFormat,
    fail_on: Option<FailOnSeverity>,
    load: &LoadArgs,
) -> i32 {
    match SpiceLibCore::load_library(file, load.options()) {
        Ok(result) => {
            output_results(std::slice::from_ref(&result), &format);
            if let Some(severity) = fail_on {
                if should_fail(&result, &severity) {
                    return 1;
                }
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn handle_project(
    dir: &Path,
    format: OutputFormat,
    fail_on: Option<FailOnSeverity>,
    load: &LoadArgs,
) -> i32 {
    match SpiceLibCore::load_project(dir, load.options()) {
        Ok(results) => {
            output_results(&results, &format);
            if let Some(severity) = fail_on {
                if results.iter().any(|r| should_fail(r, &severity)) {
                    return 1;
                }
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// List models. Diagnostics go to the log instead of stdout.
fn handle_models(file: &Path, params: bool, load: &LoadArgs) -> i32 {
    if !file.is_file() {
        eprintln!("Error: File not found: {}", file.display());
        return 1;
    }

    let mut library = SpiceLibrary::new();
    if !load.no_resolve {
        let resolver = SearchPathResolver::with_search_paths(load.search_paths.clone());
        library.set_path_resolver(Some(Arc::new(resolver)));
    }

    let mut reporter = TracingReporter::new();
    let loaded = SpiceLibraryParser::new(&mut library)
        .with_max_include_depth(load.max_depth)
        .read_file(file, Some(&mut reporter));
    if let Err(e) = loaded {
        eprintln!("Error: {}", e);
        return 1;
    }

    if library.is_empty() {
        println!("No models found in {}", file.display());
        return 0;
    }

    for (name, model) in library.iter() {
        match model.kind() {
            ModelKind::Device { device, level, .. } => match level {
                Some(level) => println!("{:<24} {:<6} level={}", name, device, level),
                None => println!("{:<24} {}", name, device),
            },
            ModelKind::Subcircuit { pins, .. } => {
                println!("{:<24} SUBCKT {}", name, pins.join(" "));
            }
        }
        if params {
            for param in model.params() {
                println!("    {} = {}", param.name, param.value);
            }
        }
    }
    0
}

fn handle_includes(file: &Path, format: TreeFormat, load: &LoadArgs) -> i32 {
    let result = match SpiceLibCore::load_library(file, load.options()) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match format {
        TreeFormat::Human => print!("{}", result.include_graph.render_tree()),
        TreeFormat::Json => {
            let output = serde_json::json!({
                "file": result.file.display().to_string(),
                "has_cycle": result.include_graph.has_cycle(),
                "graph": result.include_graph,
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
        }
    }
    0
}

fn should_fail(result: &LoadResult, severity: &FailOnSeverity) -> bool {
    match severity {
        FailOnSeverity::Error => result.has_errors(),
        FailOnSeverity::Warning => result.has_warnings_or_errors(),
    }
}

fn output_results(results: &[LoadResult], format: &OutputFormat) {
    match format {
        OutputFormat::Human => output_human(results),
        OutputFormat::Json => output_json(results),
        OutputFormat::Github => output_github(results),
    }
}

fn output_human(results: &[LoadResult]) {
    for result in results {
        println!("\nFile: {}", result.file.display());
        println!("{}", "─".repeat(60));

        if result.total_diagnostics() == 0 {
            println!("  No problems found");
        }

        let errors: Vec<&ReportMessage> = result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .collect();
        let warnings: Vec<&ReportMessage> = result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .collect();

        if !errors.is_empty() {
            println!("\n  ERRORS:");
            for d in errors {
                println!("    - {}", d.text);
            }
        }
        if !warnings.is_empty() {
            println!("\n  WARNINGS:");
            for d in warnings {
                println!("    - {}", d.text);
            }
        }

        println!("\n  Summary:");
        println!("    Models:      {}", result.stats.models);
        println!("    Subcircuits: {}", result.stats.subcircuits);
        println!("    Files:       {}", result.stats.files);
        println!("    Errors:      {}", result.stats.errors);
        println!("    Warnings:    {}", result.stats.warnings);
    }
}

fn output_json(results: &[LoadResult]) {
    let output = serde_json::json!({
        "results": results.iter().map(|r| {
            serde_json::json!({
                "file": r.file.display().to_string(),
                "models": r.library.iter().map(|(name, model)| {
                    serde_json::json!({
                        "name": name,
                        "model": model,
                    })
                }).collect::<Vec<_>>(),
                "diagnostics": r.diagnostics,
                "stats": r.stats,
            })
        }).collect::<Vec<_>>(),
        "summary": {
            "total_files": results.len(),
            "total_models": results.iter().map(|r| r.library.len()).sum::<usize>(),
            "errors": results.iter().map(|r| r.stats.errors).sum::<usize>(),
        }
    });
    println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
}

fn severity_to_github(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info | Severity::Action | Severity::Debug => "notice",
    }
}

fn output_github(results: &[LoadResult]) {
    for result in results {
        for d in &result.diagnostics {
            println!(
                "::{} file={}::{}",
                severity_to_github(d.severity),
                result.file.display(),
                d.text.replace('\n', " ")
            );
        }
    }
}
