//! Potion colors

use std::fmt;

use crate::error::RecipeError;

/// Color of a finished brew. Named colors plus free RGB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PotionColor {
    Pink,
    Cyan,
    Orange,
    Grey,
    BrightRed,
    Red,
    Black,
    #[default]
    Blue,
    Water,
    DarkRed,
    BrightGrey,
    White,
    Lime,
    Green,
    Yellow,
    Rgb(u8, u8, u8),
}

const NAMED: [(&str, PotionColor); 15] = [
    ("PINK", PotionColor::Pink),
    ("CYAN", PotionColor::Cyan),
    ("ORANGE", PotionColor::Orange),
    ("GREY", PotionColor::Grey),
    ("BRIGHT_RED", PotionColor::BrightRed),
    ("RED", PotionColor::Red),
    ("BLACK", PotionColor::Black),
    ("BLUE", PotionColor::Blue),
    ("WATER", PotionColor::Water),
    ("DARK_RED", PotionColor::DarkRed),
    ("BRIGHT_GREY", PotionColor::BrightGrey),
    ("WHITE", PotionColor::White),
    ("LIME", PotionColor::Lime),
    ("GREEN", PotionColor::Green),
    ("YELLOW", PotionColor::Yellow),
];

impl PotionColor {
    /// Parse a color name or a `#RRGGBB` / `RRGGBB` hex value.
    pub fn parse(value: &str) -> Result<Self, RecipeError> {
        let trimmed = value.trim();
        let upper = trimmed.to_uppercase().replace(' ', "_");
        if let Some((_, color)) = NAMED.iter().find(|(name, _)| *name == upper) {
            return Ok(*color);
        }

        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16);
            if let (Ok(r), Ok(g), Ok(b)) = (channel(0..2), channel(2..4), channel(4..6)) {
                return Ok(PotionColor::Rgb(r, g, b));
            }
        }

        Err(RecipeError::UnknownColor(value.to_string()))
    }
}

impl fmt::Display for PotionColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PotionColor::Rgb(r, g, b) => write!(f, "#{:02X}{:02X}{:02X}", r, g, b),
            named => {
                let name = NAMED
                    .iter()
                    .find(|(_, c)| c == named)
                    .map_or("WATER", |(n, _)| *n);
                write!(f, "{}", name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_and_hex() {
        assert_eq!(PotionColor::parse("bright_grey").unwrap(), PotionColor::BrightGrey);
        assert_eq!(PotionColor::parse("#FF8000").unwrap(), PotionColor::Rgb(255, 128, 0));
        assert_eq!(PotionColor::parse("00ff00").unwrap(), PotionColor::Rgb(0, 255, 0));
        assert!(PotionColor::parse("purpleish").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["DARK_RED", "#0A0B0C"] {
            assert_eq!(PotionColor::parse(text).unwrap().to_string(), text);
        }
    }
}
