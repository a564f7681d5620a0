//! Binary ingredient records
//!
//! Layout, all integers big-endian:
//!
//! ```text
//! u8    version
//! i32   cooked time (minutes)
//! u8    ingredient count
//! per ingredient:
//!   utf   kind tag
//!   ...   kind payload
//!   u16   amount
//! ```
//!
//! Strings are a u16 byte length followed by UTF-8.

use tracing::{error, warn};

use super::radix;
use crate::error::DecodeError;
use crate::ingredient::{Ingredient, IngredientCollection, ItemLoader, KindRegistry};

/// Version byte written in front of every record.
pub const SAVE_VERSION: u8 = 1;

/// Most distinct entries a single record can hold.
pub const MAX_ENTRIES: usize = u8::MAX as usize;

// ============================================================================
// Primitives
// ============================================================================

/// Append-only big-endian writer.
#[derive(Debug, Default)]
pub struct RecordWriter {
    buf: Vec<u8>,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Length-prefixed UTF-8. Strings longer than 65535 bytes are cut at the
    /// last char boundary that fits.
    pub fn write_utf(&mut self, value: &str) {
        let mut end = value.len().min(u16::MAX as usize);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        self.write_u16(end as u16);
        self.buf.extend_from_slice(&value.as_bytes()[..end]);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a borrowed record.
#[derive(Debug, Clone)]
pub struct RecordReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.pos + N;
        let slice = self.data.get(self.pos..end).ok_or(DecodeError::UnexpectedEof)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    pub fn read_utf(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u16()? as usize;
        let end = self.pos + len;
        let bytes = self.data.get(self.pos..end).ok_or(DecodeError::UnexpectedEof)?;
        let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
        self.pos = end;
        Ok(text.to_string())
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }
}

// ============================================================================
// Collections
// ============================================================================

/// Encode a collection as a full record, version byte included.
pub fn save(collection: &IngredientCollection) -> Vec<u8> {
    let mut out = RecordWriter::new();
    out.write_u8(SAVE_VERSION);
    save_body(&mut out, collection);
    out.into_bytes()
}

/// Write everything after the version byte.
pub fn save_body(out: &mut RecordWriter, collection: &IngredientCollection) {
    let entries = collection.ingredients();
    if entries.len() > MAX_ENTRIES {
        warn!(
            "Ingredient record holds {} entries, only the first {} are saved",
            entries.len(),
            MAX_ENTRIES
        );
    }
    let count = entries.len().min(MAX_ENTRIES);

    out.write_i32(collection.cooked_time);
    out.write_u8(count as u8);
    for ingredient in &entries[..count] {
        out.write_utf(ingredient.kind.save_id());
        ingredient.kind.encode(out);
        out.write_u16(ingredient.amount.clamp(0, u16::MAX as i32) as u16);
    }
}

/// Decode a full record, reading the version byte first.
pub fn load(bytes: &[u8], registry: &KindRegistry) -> Result<IngredientCollection, DecodeError> {
    let mut reader = RecordReader::new(bytes);
    let version = reader.read_u8()?;
    load_body(&mut reader, version, registry)
}

/// Decode the body of a record written with `version`.
///
/// Header errors fail the whole load. Once entries are being read, an
/// unregistered kind tag or a broken payload stops decoding and the entries
/// read so far are returned.
pub fn load_body(
    reader: &mut RecordReader<'_>,
    version: u8,
    registry: &KindRegistry,
) -> Result<IngredientCollection, DecodeError> {
    let cooked_time = reader.read_i32()?;
    let count = reader.read_u8()?;
    let mut collection = IngredientCollection::with_cooked_time(cooked_time);

    for index in 0..count {
        let tag = match reader.read_utf() {
            Ok(tag) => tag,
            Err(e) => {
                error!("Ingredient record cut short at entry {}: {}", index, e);
                break;
            }
        };

        let Some(decoder) = registry.get(&tag) else {
            error!(
                "{}, keeping the {} ingredients decoded before it",
                DecodeError::UnknownKind(tag),
                index
            );
            break;
        };

        let mut loader = ItemLoader::new(version, tag.clone(), reader.clone());
        let decoded = decoder(&mut loader);
        *reader = loader.into_reader();

        let kind = match decoded {
            Ok(kind) => kind,
            Err(e) => {
                error!("Failed to decode ingredient {} of kind '{}': {}", index, tag, e);
                break;
            }
        };
        let amount = match reader.read_u16() {
            Ok(amount) => amount,
            Err(e) => {
                error!("Ingredient record cut short at entry {}: {}", index, e);
                break;
            }
        };

        collection.push(Ingredient::new(kind, amount as i32));
    }

    Ok(collection)
}

// ============================================================================
// Text form
// ============================================================================

/// Radix-91 text of a full record, for storing in a single string field.
pub fn serialize_ingredients(collection: &IngredientCollection) -> String {
    radix::encode(&save(collection))
}

/// Inverse of [`serialize_ingredients`]. Undecodable text yields an empty
/// collection.
pub fn deserialize_ingredients(text: &str, registry: &KindRegistry) -> IngredientCollection {
    let decoded = radix::decode(text).and_then(|bytes| load(&bytes, registry));
    match decoded {
        Ok(collection) => collection,
        Err(e) => {
            error!("Failed to load ingredients from stored text: {}", e);
            IngredientCollection::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingredient::{CustomItem, IngredientKind, PluginItem, SimpleItem};

    fn mixed_collection() -> IngredientCollection {
        let mut collection = IngredientCollection::with_cooked_time(12);
        collection.add_with_amount(IngredientKind::Simple(SimpleItem::new("WHEAT")), 3);
        collection.add_with_amount(
            IngredientKind::Custom(CustomItem {
                material: Some("POTION".to_string()),
                name: Some("Bottle of Spring Water".to_string()),
                lore: vec!["Clear".to_string(), "Cold".to_string()],
                model_data: 42,
            }),
            1,
        );
        collection.add_with_amount(
            IngredientKind::Custom(CustomItem {
                material: None,
                name: Some("Gold Leaf".to_string()),
                lore: Vec::new(),
                model_data: 0,
            }),
            2,
        );
        collection.add_with_amount(
            IngredientKind::Plugin(PluginItem::new("slimefun", "MAGIC_SUGAR")),
            7,
        );
        collection
    }

    #[test]
    fn test_collection_round_trip() {
        let registry = KindRegistry::with_builtin();
        let collection = mixed_collection();
        let bytes = save(&collection);
        assert_eq!(bytes[0], SAVE_VERSION);
        assert_eq!(load(&bytes, &registry).unwrap(), collection);
    }

    #[test]
    fn test_text_round_trip() {
        let registry = KindRegistry::with_builtin();
        let collection = mixed_collection();
        let text = serialize_ingredients(&collection);
        assert_eq!(deserialize_ingredients(&text, &registry), collection);
    }

    #[test]
    fn test_header_layout() {
        let mut collection = IngredientCollection::with_cooked_time(0x0102_0304);
        collection.add_with_amount(IngredientKind::Simple(SimpleItem::new("SUGAR")), 300);
        let bytes = save(&collection);

        assert_eq!(&bytes[..6], &[1, 0x01, 0x02, 0x03, 0x04, 1]);
        // tag "SI"
        assert_eq!(&bytes[6..10], &[0, 2, b'S', b'I']);
        // trailing amount
        assert_eq!(&bytes[bytes.len() - 2..], &300u16.to_be_bytes());
    }

    #[test]
    fn test_amount_clamped() {
        let registry = KindRegistry::with_builtin();
        let mut collection = IngredientCollection::new();
        collection.push(Ingredient::new(IngredientKind::Simple(SimpleItem::new("WHEAT")), 70_000));
        let loaded = load(&save(&collection), &registry).unwrap();
        assert_eq!(loaded.ingredients()[0].amount, 65_535);
    }

    #[test]
    fn test_unknown_kind_keeps_prefix() {
        let mut registry = KindRegistry::with_builtin();
        registry.unregister("CI");

        let bytes = save(&mixed_collection());
        let loaded = load(&bytes, &registry).unwrap();

        // Entries after the first custom item are lost along with it
        assert_eq!(loaded.cooked_time, 12);
        assert_eq!(loaded.ingredients().len(), 1);
        assert_eq!(loaded.ingredients()[0].kind.save_id(), "SI");
        assert_eq!(loaded.ingredients()[0].amount, 3);
    }

    #[test]
    fn test_truncated_payload_keeps_prefix() {
        let registry = KindRegistry::with_builtin();
        let bytes = save(&mixed_collection());
        let loaded = load(&bytes[..bytes.len() - 4], &registry).unwrap();
        assert_eq!(loaded.ingredients().len(), 3);
    }

    #[test]
    fn test_truncated_header() {
        let registry = KindRegistry::with_builtin();
        assert_eq!(load(&[1, 0, 0], &registry), Err(DecodeError::UnexpectedEof));
        assert_eq!(load(&[], &registry), Err(DecodeError::UnexpectedEof));
    }

    #[test]
    fn test_bad_text_gives_empty_collection() {
        let registry = KindRegistry::with_builtin();
        let loaded = deserialize_ingredients("not \\ base91", &registry);
        assert!(loaded.is_empty());
        assert_eq!(loaded.cooked_time, 0);
    }

    #[test]
    fn test_utf_string_bounds() {
        let mut out = RecordWriter::new();
        out.write_utf("Süßholz");
        out.write_utf("");
        let bytes = out.into_bytes();
        let mut reader = RecordReader::new(&bytes);
        assert_eq!(reader.read_utf().unwrap(), "Süßholz");
        assert_eq!(reader.read_utf().unwrap(), "");
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.read_u8(), Err(DecodeError::UnexpectedEof));
    }
}
