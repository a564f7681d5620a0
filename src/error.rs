//! Error types shared across the crate.

use thiserror::Error;

/// Failures while decoding text or binary ingredient records.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid encoding symbol {0:?} at position {1}")]
    InvalidEncodingSymbol(char, usize),

    #[error("unexpected end of record")]
    UnexpectedEof,

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown ingredient kind '{0}'")]
    UnknownKind(String),
}

/// Storage backend failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be brought up. Fatal to startup.
    #[error("storage initialization failed: {0}")]
    Init(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse document: {0}")]
    TomlRead(#[from] toml::de::Error),

    #[error("failed to write document: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("payload serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed record {id} in {table}: {reason}")]
    MalformedRecord {
        table: String,
        id: String,
        reason: String,
    },

    #[error("invalid table name '{0}'")]
    InvalidTableName(String),
}

/// Gate acquisition failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("timed out after {attempts} attempts waiting on data gate (state {state})")]
    Timeout { attempts: u32, state: i32 },
}

/// Structural problems in a recipe definition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecipeError {
    #[error("recipe needs 1 or 3 names, got {0}")]
    NameCount(usize),

    #[error("recipe has no ingredients")]
    NoIngredients,

    #[error("ingredient {0} has amount {1}, must be at least 1")]
    IngredientAmount(String, i32),

    #[error("cooking time must be at least 1 minute, got {0}")]
    CookingTime(i32),

    #[error("distill time must not be negative, got {0}")]
    DistillTime(i32),

    #[error("age must not be negative, got {0}")]
    Age(i32),

    #[error("difficulty must be between 0 and 10, got {0}")]
    Difficulty(i32),

    #[error("quality tier must be between 0 and 3, got {0}")]
    QualityTier(u8),

    #[error("unknown wood type '{0}'")]
    UnknownWood(String),

    #[error("unknown potion color '{0}'")]
    UnknownColor(String),
}

/// Failures of the one-time legacy import.
#[derive(Debug, Error)]
pub enum LegacyError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse legacy yaml: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("legacy worker failed: {0}")]
    Worker(String),
}

/// Configuration file failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
