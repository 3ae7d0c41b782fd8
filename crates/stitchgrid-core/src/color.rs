//! Hex RGB color values used by the palette, fills and guide lines.

use peniko::Color;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Color parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorParseError {
    #[error("Color must start with '#': {0:?}")]
    MissingHash(String),
    #[error("Color must have 3 or 6 hex digits: {0:?}")]
    BadLength(String),
    #[error("Invalid hex digit in color: {0:?}")]
    BadDigit(String),
}

/// An opaque RGB color, written as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const BLACK: Self = Self::new(0, 0, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl Default for HexColor {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for HexColor {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| ColorParseError::MissingHash(s.to_string()))?;

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError::BadDigit(s.to_string()));
        }

        let channel = |digits: &str| {
            u8::from_str_radix(digits, 16).map_err(|_| ColorParseError::BadDigit(s.to_string()))
        };

        match hex.len() {
            3 => {
                // #rgb -> #rrggbb
                let r = channel(&hex[0..1])? * 17;
                let g = channel(&hex[1..2])? * 17;
                let b = channel(&hex[2..3])? * 17;
                Ok(Self::new(r, g, b))
            }
            6 => Ok(Self::new(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            _ => Err(ColorParseError::BadLength(s.to_string())),
        }
    }
}

impl Serialize for HexColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl From<HexColor> for Color {
    fn from(color: HexColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, 255)
    }
}

impl From<Color> for HexColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_six_digits() {
        let color: HexColor = "#FF8000".parse().unwrap();
        assert_eq!(color, HexColor::new(255, 128, 0));
        assert_eq!(color.to_string(), "#ff8000");
    }

    #[test]
    fn test_parse_shorthand() {
        let color: HexColor = "#f0a".parse().unwrap();
        assert_eq!(color, HexColor::new(255, 0, 170));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("ff0000".parse::<HexColor>(), Err(ColorParseError::MissingHash(_))));
        assert!(matches!("#ff00".parse::<HexColor>(), Err(ColorParseError::BadLength(_))));
        assert!(matches!("#gg0000".parse::<HexColor>(), Err(ColorParseError::BadDigit(_))));
        assert!("#ff00é0".parse::<HexColor>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&HexColor::new(1, 2, 3)).unwrap();
        assert_eq!(json, "\"#010203\"");
        let back: HexColor = serde_json::from_str("\"#0A0B0C\"").unwrap();
        assert_eq!(back, HexColor::new(10, 11, 12));
        assert!(serde_json::from_str::<HexColor>("\"red\"").is_err());
    }

    #[test]
    fn test_peniko_conversion() {
        let color = HexColor::new(59, 130, 246);
        let peniko: Color = color.into();
        assert_eq!(HexColor::from(peniko), color);
    }
}
