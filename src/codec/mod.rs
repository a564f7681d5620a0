//! Text and binary codecs for ingredient data

pub mod radix;
pub mod record;

pub use record::{
    RecordReader, RecordWriter, SAVE_VERSION, deserialize_ingredients, load, save,
    serialize_ingredients,
};
