//! Ingredient kinds
//!
//! Every kind knows its save tag, how to write its payload and how to compare
//! itself against an offered ingredient.

use serde::{Deserialize, Serialize};

use super::registry::ItemLoader;
use crate::codec::RecordWriter;
use crate::error::DecodeError;

pub const SIMPLE_TAG: &str = "SI";
pub const CUSTOM_TAG: &str = "CI";
pub const PLUGIN_TAG: &str = "PI";

/// Durability value that accepts any durability.
pub const ANY_DURABILITY: i16 = -1;

// ============================================================================
// Simple items
// ============================================================================

/// A plain material, optionally pinned to one durability value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimpleItem {
    pub material: String,
    #[serde(default)]
    pub durability: i16,
}

impl SimpleItem {
    pub fn new(material: impl Into<String>) -> Self {
        Self {
            material: normalize_material(&material.into()),
            durability: 0,
        }
    }

    pub fn with_durability(material: impl Into<String>, durability: i16) -> Self {
        Self {
            material: normalize_material(&material.into()),
            durability,
        }
    }

    fn encode(&self, out: &mut RecordWriter) {
        out.write_utf(&self.material);
        out.write_i16(self.durability);
    }

    pub fn load_from(loader: &mut ItemLoader<'_>) -> Result<IngredientKind, DecodeError> {
        let reader = loader.reader();
        let material = reader.read_utf()?;
        let durability = reader.read_i16()?;
        Ok(IngredientKind::Simple(Self {
            material,
            durability,
        }))
    }

    fn matches(&self, offered: &IngredientKind) -> bool {
        match offered {
            IngredientKind::Simple(other) => {
                self.material == other.material
                    && (self.durability == ANY_DURABILITY || self.durability == other.durability)
            }
            // A bare custom item is just a material with extra bookkeeping
            IngredientKind::Custom(other) => {
                other.name.is_none()
                    && other.lore.is_empty()
                    && other.model_data == 0
                    && other.material.as_deref() == Some(self.material.as_str())
            }
            IngredientKind::Plugin(_) => false,
        }
    }
}

// ============================================================================
// Custom items
// ============================================================================

/// An item identified by any mix of material, display name, lore and model
/// data. Unset fields act as wildcards when this item is the recipe side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomItem {
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub lore: Vec<String>,
    #[serde(default)]
    pub model_data: i32,
}

impl CustomItem {
    fn encode(&self, out: &mut RecordWriter) {
        match &self.material {
            Some(material) => {
                out.write_bool(true);
                out.write_utf(material);
            }
            None => out.write_bool(false),
        }
        match &self.name {
            Some(name) => {
                out.write_bool(true);
                out.write_utf(name);
            }
            None => out.write_bool(false),
        }
        let lines = self.lore.len().min(i16::MAX as usize);
        out.write_i16(lines as i16);
        for line in &self.lore[..lines] {
            out.write_utf(line);
        }
        if self.model_data != 0 {
            out.write_bool(true);
            out.write_i32(self.model_data);
        } else {
            out.write_bool(false);
        }
    }

    pub fn load_from(loader: &mut ItemLoader<'_>) -> Result<IngredientKind, DecodeError> {
        let reader = loader.reader();
        let mut item = CustomItem::default();
        if reader.read_bool()? {
            item.material = Some(reader.read_utf()?);
        }
        if reader.read_bool()? {
            item.name = Some(reader.read_utf()?);
        }
        let lines = reader.read_i16()?;
        for _ in 0..lines.max(0) {
            item.lore.push(reader.read_utf()?);
        }
        if reader.read_bool()? {
            item.model_data = reader.read_i32()?;
        }
        Ok(IngredientKind::Custom(item))
    }

    fn matches(&self, offered: &IngredientKind) -> bool {
        match offered {
            // Only a material-only item may stand in for a simple item
            IngredientKind::Simple(other) => {
                self.name.is_none()
                    && self.lore.is_empty()
                    && self.material.as_deref() == Some(other.material.as_str())
            }
            IngredientKind::Custom(other) => {
                if let Some(material) = &self.material {
                    if other.material.as_ref() != Some(material) {
                        return false;
                    }
                }
                if let Some(name) = &self.name {
                    match &other.name {
                        Some(other_name) if other_name.eq_ignore_ascii_case(name) => {}
                        _ => return false,
                    }
                }
                if self.model_data != 0 && self.model_data != other.model_data {
                    return false;
                }
                self.lore.is_empty() || self.lore == other.lore || self.match_lore(&other.lore)
            }
            IngredientKind::Plugin(_) => false,
        }
    }

    /// True if our lore appears as a consecutive run inside `used`, ignoring
    /// case and color codes on the offered side.
    pub fn match_lore(&self, used: &[String]) -> bool {
        if self.lore.is_empty() {
            return true;
        }
        let wanted: Vec<String> = self.lore.iter().map(|l| l.to_lowercase()).collect();
        let offered: Vec<String> = used.iter().map(|l| strip_color(l).to_lowercase()).collect();
        if offered.len() < wanted.len() {
            return false;
        }
        offered
            .windows(wanted.len())
            .any(|window| window == wanted.as_slice())
    }
}

// ============================================================================
// Plugin items
// ============================================================================

/// An item defined by another plugin, known only by its plugin and item id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginItem {
    pub plugin: String,
    pub item_id: String,
}

impl PluginItem {
    pub fn new(plugin: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            item_id: item_id.into(),
        }
    }

    fn encode(&self, out: &mut RecordWriter) {
        out.write_utf(&self.plugin);
        out.write_utf(&self.item_id);
    }

    pub fn load_from(loader: &mut ItemLoader<'_>) -> Result<IngredientKind, DecodeError> {
        let reader = loader.reader();
        let plugin = reader.read_utf()?;
        let item_id = reader.read_utf()?;
        Ok(IngredientKind::Plugin(Self { plugin, item_id }))
    }

    fn matches(&self, offered: &IngredientKind) -> bool {
        match offered {
            IngredientKind::Plugin(other) => {
                self.plugin.eq_ignore_ascii_case(&other.plugin)
                    && self.item_id.eq_ignore_ascii_case(&other.item_id)
            }
            _ => false,
        }
    }
}

// ============================================================================
// Kind
// ============================================================================

/// Closed set of ingredient kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IngredientKind {
    Simple(SimpleItem),
    Custom(CustomItem),
    Plugin(PluginItem),
}

impl IngredientKind {
    /// Tag written in front of the payload
    pub fn save_id(&self) -> &'static str {
        match self {
            IngredientKind::Simple(_) => SIMPLE_TAG,
            IngredientKind::Custom(_) => CUSTOM_TAG,
            IngredientKind::Plugin(_) => PLUGIN_TAG,
        }
    }

    pub fn encode(&self, out: &mut RecordWriter) {
        match self {
            IngredientKind::Simple(item) => item.encode(out),
            IngredientKind::Custom(item) => item.encode(out),
            IngredientKind::Plugin(item) => item.encode(out),
        }
    }

    /// Recipe-side compatibility test: does `offered` count as this ingredient?
    pub fn matches(&self, offered: &IngredientKind) -> bool {
        if self.is_similar(offered) {
            return true;
        }
        match self {
            IngredientKind::Simple(item) => item.matches(offered),
            IngredientKind::Custom(item) => item.matches(offered),
            IngredientKind::Plugin(item) => item.matches(offered),
        }
    }

    /// All attributes equal. Amounts live outside the kind.
    pub fn is_similar(&self, other: &IngredientKind) -> bool {
        self == other
    }

    /// One-line description for logs and debug output
    pub fn describe(&self) -> String {
        match self {
            IngredientKind::Simple(item) => {
                if item.durability == 0 {
                    format!("SimpleItem{{{}}}", item.material.to_lowercase())
                } else {
                    format!(
                        "SimpleItem{{{}:{}}}",
                        item.material.to_lowercase(),
                        item.durability
                    )
                }
            }
            IngredientKind::Custom(item) => format!(
                "CustomItem{{mat={}, name='{}', loresize: {}, modelData={}}}",
                item.material.as_deref().map_or("null".to_string(), str::to_lowercase),
                item.name.as_deref().unwrap_or("null"),
                item.lore.len(),
                item.model_data
            ),
            IngredientKind::Plugin(item) => {
                format!("PluginItem{{{}:{}}}", item.plugin, item.item_id)
            }
        }
    }
}

/// Material names are stored upper-case with underscores.
pub fn normalize_material(material: &str) -> String {
    material.trim().replace([' ', '-'], "_").to_uppercase()
}

/// Drop `§x` and `&x` formatting codes.
pub fn strip_color(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if (c == '§' || c == '&')
            && chars
                .peek()
                .is_some_and(|n| n.is_ascii_hexdigit() || "klmnorxKLMNORX".contains(*n))
        {
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}
