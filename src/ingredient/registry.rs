//! Kind decoder registry
//!
//! Maps save tags to the function that reads that kind's payload. The
//! registry is passed to the codec explicitly, so tests can build one with
//! kinds missing.

use std::collections::HashMap;
use tracing::warn;

use super::kinds::{CUSTOM_TAG, CustomItem, IngredientKind, PLUGIN_TAG, PluginItem, SIMPLE_TAG, SimpleItem};
use crate::codec::RecordReader;
use crate::error::DecodeError;

/// Reads one kind payload from a loader.
pub type DecodeFn = fn(&mut ItemLoader<'_>) -> Result<IngredientKind, DecodeError>;

/// What a kind decoder gets to work with.
pub struct ItemLoader<'a> {
    version: u8,
    save_id: String,
    reader: RecordReader<'a>,
}

impl<'a> ItemLoader<'a> {
    pub fn new(version: u8, save_id: String, reader: RecordReader<'a>) -> Self {
        Self {
            version,
            save_id,
            reader,
        }
    }

    /// Version byte of the record being read
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn save_id(&self) -> &str {
        &self.save_id
    }

    pub fn reader(&mut self) -> &mut RecordReader<'a> {
        &mut self.reader
    }

    pub fn into_reader(self) -> RecordReader<'a> {
        self.reader
    }
}

/// Registry of kind decoders keyed by save tag
#[derive(Debug, Clone)]
pub struct KindRegistry {
    decoders: HashMap<String, DecodeFn>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registry holding every kind this crate defines
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(SIMPLE_TAG, SimpleItem::load_from);
        registry.register(CUSTOM_TAG, CustomItem::load_from);
        registry.register(PLUGIN_TAG, PluginItem::load_from);
        registry
    }

    pub fn register(&mut self, tag: &str, decoder: DecodeFn) {
        if self.decoders.insert(tag.to_string(), decoder).is_some() {
            warn!("Ingredient kind '{}' registered twice, replacing decoder", tag);
        }
    }

    pub fn unregister(&mut self, tag: &str) -> bool {
        self.decoders.remove(tag).is_some()
    }

    pub fn get(&self, tag: &str) -> Option<DecodeFn> {
        self.decoders.get(tag).copied()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_kinds() {
        let registry = KindRegistry::with_builtin();
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("SI"));
        assert!(registry.contains("CI"));
        assert!(registry.contains("PI"));
        assert!(registry.get("XX").is_none());
    }

    #[test]
    fn test_custom_decoder() {
        fn always_sugar(loader: &mut ItemLoader<'_>) -> Result<IngredientKind, DecodeError> {
            // consumes a single byte payload
            loader.reader().read_u8()?;
            Ok(IngredientKind::Simple(SimpleItem::new("SUGAR")))
        }

        let mut registry = KindRegistry::new();
        registry.register("SG", always_sugar);

        let bytes = [9u8];
        let mut loader = ItemLoader::new(1, "SG".to_string(), RecordReader::new(&bytes));
        let decoder = registry.get("SG").unwrap();
        assert_eq!(
            decoder(&mut loader).unwrap(),
            IngredientKind::Simple(SimpleItem::new("SUGAR"))
        );
        assert_eq!(loader.version(), 1);
        assert_eq!(loader.into_reader().remaining(), 0);
    }
}
