//! Hot cue colours
//!
//! Mixxx stores cue colours as a plain RGB integer (or nothing). A value is
//! accepted only if its `0x`-prefixed hex form is exactly 8 characters long,
//! i.e. it lies in `0x100000..=0xFFFFFF`. Everything else gets a colour from
//! [`FALLBACK_PALETTE`], picked by the cue's position in the track.

use std::fmt;

/// RGB colour of a `POSITION_MARK`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CueColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl CueColor {
    pub const RED: CueColor = CueColor::from_rgb(0xC02626);
    pub const ORANGE: CueColor = CueColor::from_rgb(0xF8821A);
    pub const YELLOW: CueColor = CueColor::from_rgb(0xFAC313);
    pub const GREEN: CueColor = CueColor::from_rgb(0x1FAD26);
    pub const CYAN: CueColor = CueColor::from_rgb(0x00FFFF);
    pub const BLUE: CueColor = CueColor::from_rgb(0x173BA2);
    pub const INDIGO: CueColor = CueColor::from_rgb(0x6823B6);
    pub const MAGENTA: CueColor = CueColor::from_rgb(0xCE359E);

    /// Split a `0xRRGGBB` value into components
    pub const fn from_rgb(rgb: u32) -> Self {
        Self {
            red: ((rgb >> 16) & 0xFF) as u8,
            green: ((rgb >> 8) & 0xFF) as u8,
            blue: (rgb & 0xFF) as u8,
        }
    }

    pub fn rgb(&self) -> u32 {
        (self.red as u32) << 16 | (self.green as u32) << 8 | self.blue as u32
    }

    /// Accept a stored colour only if it spans all six hex digits
    pub fn parse_stored(value: Option<i64>) -> Option<Self> {
        match value {
            Some(v) if (0x10_0000..=0xFF_FFFF).contains(&v) => Some(Self::from_rgb(v as u32)),
            _ => None,
        }
    }

    /// Palette colour for the `index`-th cue of a track
    pub fn fallback(index: usize) -> Self {
        FALLBACK_PALETTE[index % FALLBACK_PALETTE.len()]
    }

    /// Stored colour if valid, otherwise the fallback for `index`
    pub fn resolve(stored: Option<i64>, index: usize) -> Self {
        Self::parse_stored(stored).unwrap_or_else(|| Self::fallback(index))
    }
}

impl fmt::Display for CueColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:06x}", self.rgb())
    }
}

/// Fallback colours, in assignment order
pub const FALLBACK_PALETTE: [CueColor; 8] = [
    CueColor::RED,
    CueColor::ORANGE,
    CueColor::YELLOW,
    CueColor::GREEN,
    CueColor::CYAN,
    CueColor::BLUE,
    CueColor::INDIGO,
    CueColor::MAGENTA,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_stored_color() {
        let color = CueColor::parse_stored(Some(0xC02626)).unwrap();
        assert_eq!((color.red, color.green, color.blue), (0xC0, 0x26, 0x26));
        assert_eq!(color.to_string(), "0xc02626");
        assert_eq!(CueColor::resolve(Some(0x123456), 5).rgb(), 0x123456);
    }

    #[test]
    fn test_short_or_invalid_colors_rejected() {
        assert_eq!(CueColor::parse_stored(None), None);
        assert_eq!(CueColor::parse_stored(Some(0)), None);
        // Leading zero byte makes the hex form too short
        assert_eq!(CueColor::parse_stored(Some(0x00FF00)), None);
        assert_eq!(CueColor::parse_stored(Some(0x0FFFFF)), None);
        assert_eq!(CueColor::parse_stored(Some(0x1000000)), None);
        assert_eq!(CueColor::parse_stored(Some(-1)), None);
        assert!(CueColor::parse_stored(Some(0x100000)).is_some());
    }

    #[test]
    fn test_fallback_order() {
        assert_eq!(CueColor::resolve(None, 0), CueColor::RED);
        assert_eq!(CueColor::resolve(None, 1), CueColor::ORANGE);
        assert_eq!(CueColor::resolve(Some(0x00FF00), 2), CueColor::YELLOW);
    }

    #[test]
    fn test_fallback_wraps() {
        assert_eq!(CueColor::fallback(7), CueColor::MAGENTA);
        assert_eq!(CueColor::fallback(8), CueColor::RED);
        assert_eq!(CueColor::fallback(17), CueColor::ORANGE);
    }
}
