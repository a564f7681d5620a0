//! Brewery data core
//!
//! Ingredient records and their text encoding, recipe scoring, entity
//! storage over a flat file or sqlite, and the one-time import of the old
//! YAML data layout.

pub mod codec;
pub mod config;
pub mod error;
pub mod gate;
pub mod ingredient;
pub mod legacy;
pub mod quality;
pub mod recipe;
pub mod state;
pub mod storage;

pub use config::BreweryConfig;
pub use error::{ConfigError, DecodeError, GateError, LegacyError, RecipeError, StorageError};
pub use gate::DataGate;
pub use quality::QualityEngine;
pub use state::BreweryState;
pub use storage::DataManager;
