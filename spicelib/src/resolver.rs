//! Include path resolution.
//!
//! A [`PathResolver`] turns the literal path of an `.include` directive plus
//! the path of the including file into the path that will be read. Any
//! `Fn(&str, &Path) -> Result<PathBuf, ResolveError>` closure is a resolver.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("environment variable '{name}' used in '{path}' is not set")]
    UndefinedVariable { name: String, path: String },
    #[error("unterminated variable reference in '{path}'")]
    UnterminatedVariable { path: String },
    #[error("{0}")]
    Other(String),
}

/// Maps an include directive's literal path to a readable file path.
pub trait PathResolver: Send + Sync {
    fn resolve(&self, literal: &str, including_file: &Path) -> Result<PathBuf, ResolveError>;
}

impl<F> PathResolver for F
where
    F: Fn(&str, &Path) -> Result<PathBuf, ResolveError> + Send + Sync,
{
    fn resolve(&self, literal: &str, including_file: &Path) -> Result<PathBuf, ResolveError> {
        self(literal, including_file)
    }
}

/// Resolves includes relative to the including file, then a list of search
/// directories. `${VAR}` references are expanded from the environment first.
#[derive(Debug, Clone, Default)]
pub struct SearchPathResolver {
    search_paths: Vec<PathBuf>,
}

impl SearchPathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl PathResolver for SearchPathResolver {
    fn resolve(&self, literal: &str, including_file: &Path) -> Result<PathBuf, ResolveError> {
        let expanded = expand_env_vars(literal)?;
        let path = PathBuf::from(&expanded);
        if path.is_absolute() {
            return Ok(path);
        }

        let base_dir = including_file.parent().unwrap_or_else(|| Path::new(""));
        let local = base_dir.join(&path);
        if local.is_file() {
            return Ok(local);
        }

        for dir in &self.search_paths {
            let candidate = dir.join(&path);
            if candidate.is_file() {
                tracing::debug!("Resolved '{}' via search path {}", literal, dir.display());
                return Ok(candidate);
            }
        }

        // Nothing exists; hand back the local candidate so the read error names it.
        Ok(local)
    }
}

/// Expand `${NAME}` references from the process environment.
pub fn expand_env_vars(literal: &str) -> Result<String, ResolveError> {
    expand_vars_with(literal, |name| std::env::var(name).ok())
}

fn expand_vars_with<F>(literal: &str, lookup: F) -> Result<String, ResolveError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(literal.len());
    let mut rest = literal;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(ResolveError::UnterminatedVariable {
                path: literal.to_string(),
            });
        };
        let name = &after[..end];
        let value = lookup(name).ok_or_else(|| ResolveError::UndefinedVariable {
            name: name.to_string(),
            path: literal.to_string(),
        })?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "MODELS" => Some("/opt/models".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_expand_vars() {
        assert_eq!(
            expand_vars_with("${MODELS}/diodes.lib", lookup).unwrap(),
            "/opt/models/diodes.lib"
        );
        assert_eq!(expand_vars_with("plain.lib", lookup).unwrap(), "plain.lib");
        assert!(matches!(
            expand_vars_with("${NOPE}/x.lib", lookup),
            Err(ResolveError::UndefinedVariable { ref name, .. }) if name == "NOPE"
        ));
        assert!(matches!(
            expand_vars_with("${MODELS/x.lib", lookup),
            Err(ResolveError::UnterminatedVariable { .. })
        ));
    }

    #[test]
    fn test_relative_to_including_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("b.lib"), "").unwrap();

        let resolver = SearchPathResolver::new();
        let resolved = resolver
            .resolve("sub/b.lib", &dir.path().join("root.lib"))
            .unwrap();
        assert_eq!(resolved, dir.path().join("sub").join("b.lib"));
    }

    #[test]
    fn test_search_paths_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(second.path().join("shared.lib"), "").unwrap();

        let resolver = SearchPathResolver::with_search_paths([first.path(), second.path()]);
        let including = first.path().join("nested").join("root.lib");
        let resolved = resolver.resolve("shared.lib", &including).unwrap();
        assert_eq!(resolved, second.path().join("shared.lib"));

        let missing = resolver.resolve("missing.lib", &including).unwrap();
        assert_eq!(missing, first.path().join("nested").join("missing.lib"));
    }

    #[test]
    fn test_closure_is_a_resolver() {
        let resolver = |literal: &str, _including: &Path| -> Result<PathBuf, ResolveError> {
            Ok(PathBuf::from("/libs").join(literal))
        };
        let resolved = resolver.resolve("x.lib", Path::new("root.lib")).unwrap();
        assert_eq!(resolved, PathBuf::from("/libs/x.lib"));
    }
}
