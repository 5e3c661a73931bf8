//! In-memory model library.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::model::SpiceModel;
use crate::parser::{LibraryError, SpiceLibraryParser};
use crate::reporter::Reporter;
use crate::resolver::PathResolver;

/// Models loaded from a library file and everything it includes.
///
/// `models()` and `model_names()` are index-aligned: the name at index `i`
/// is the name the model at index `i` was declared with.
#[derive(Default)]
pub struct SpiceLibrary {
    models: Vec<SpiceModel>,
    model_names: Vec<String>,
    path_resolver: Option<Arc<dyn PathResolver>>,
}

impl SpiceLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path_resolver(resolver: Arc<dyn PathResolver>) -> Self {
        Self {
            path_resolver: Some(resolver),
            ..Self::default()
        }
    }

    /// Load `path`, replacing whatever the library held before.
    ///
    /// See [`SpiceLibraryParser::read_file`] for error semantics.
    pub fn read_file(
        &mut self,
        path: impl AsRef<Path>,
        reporter: Option<&mut dyn Reporter>,
    ) -> Result<(), LibraryError> {
        SpiceLibraryParser::new(self).read_file(path, reporter)
    }

    pub fn models(&self) -> &[SpiceModel] {
        &self.models
    }

    pub fn model_names(&self) -> &[String] {
        &self.model_names
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Model and the name it was declared with, in load order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SpiceModel)> {
        self.model_names.iter().map(String::as_str).zip(self.models.iter())
    }

    /// Find a model by name. SPICE names are case-insensitive; the last
    /// definition wins, the same way a later `.model` shadows an earlier one.
    pub fn find_model(&self, name: &str) -> Option<&SpiceModel> {
        self.model_names
            .iter()
            .rposition(|n| n.eq_ignore_ascii_case(name))
            .map(|idx| &self.models[idx])
    }

    pub fn path_resolver(&self) -> Option<&Arc<dyn PathResolver>> {
        self.path_resolver.as_ref()
    }

    pub fn set_path_resolver(&mut self, resolver: Option<Arc<dyn PathResolver>>) {
        self.path_resolver = resolver;
    }

    pub(crate) fn push(&mut self, model: SpiceModel, name: String) {
        self.models.push(model);
        self.model_names.push(name);
        debug_assert_eq!(self.models.len(), self.model_names.len());
    }

    pub(crate) fn clear(&mut self) {
        self.models.clear();
        self.model_names.clear();
    }
}

impl fmt::Debug for SpiceLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpiceLibrary")
            .field("model_names", &self.model_names)
            .field("path_resolver", &self.path_resolver.is_some())
            .finish()
    }
}
