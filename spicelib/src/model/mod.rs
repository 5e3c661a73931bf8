//! Model construction.
//!
//! The library parser hands the full text of every model unit to a
//! [`ModelFactory`]. [`SpiceModelFactory`] is the one used by default; an
//! embedding application can plug in its own.

pub mod spice;
pub mod value;

pub use spice::{DeviceType, ModelError, ModelKind, ModelParam, SpiceModel};
pub use value::parse_value;

use thiserror::Error;

use crate::library::SpiceLibrary;

#[derive(Debug, Error)]
pub enum FactoryError {
    /// The model text is invalid; the message is shown to the user as is.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Anything else that went wrong while building the model.
    #[error("{0}")]
    Other(String),
}

/// Builds typed models from raw model text.
pub trait ModelFactory {
    fn create(&self, library: &SpiceLibrary, text: &str) -> Result<SpiceModel, FactoryError>;
}

/// Default factory backed by [`SpiceModel::create`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SpiceModelFactory;

impl ModelFactory for SpiceModelFactory {
    fn create(&self, library: &SpiceLibrary, text: &str) -> Result<SpiceModel, FactoryError> {
        Ok(SpiceModel::create(library, text)?)
    }
}
