//! Color Palettes
//!
//! Resolves SGR color selections to RGB. The 8-entry base palette (normal and
//! bright variants) is configurable; the 256-color table is fixed.

use crate::models::Color;

/// Campbell scheme, normal intensity: black, red, green, yellow, blue,
/// magenta, cyan, white
pub const CAMPBELL_NORMAL: [Color; 8] = [
    Color::new(0x0C, 0x0C, 0x0C),
    Color::new(0xC5, 0x0F, 0x1F),
    Color::new(0x13, 0xA1, 0x0E),
    Color::new(0xC1, 0x9C, 0x00),
    Color::new(0x00, 0x37, 0xDA),
    Color::new(0x88, 0x17, 0x98),
    Color::new(0x3A, 0x96, 0xDD),
    Color::new(0xCC, 0xCC, 0xCC),
];

/// Campbell scheme, bright intensity
pub const CAMPBELL_BRIGHT: [Color; 8] = [
    Color::new(0x76, 0x76, 0x76),
    Color::new(0xE7, 0x48, 0x56),
    Color::new(0x16, 0xC6, 0x0C),
    Color::new(0xF9, 0xF1, 0xA5),
    Color::new(0x3B, 0x78, 0xFF),
    Color::new(0xB4, 0x00, 0x9E),
    Color::new(0x61, 0xD6, 0xD6),
    Color::new(0xF2, 0xF2, 0xF2),
];

/// Named colors for indices 0-15 of the 256-color table
const INDEXED_NAMED: [Color; 16] = [
    Color::new(0x00, 0x00, 0x00),
    Color::new(0x80, 0x00, 0x00),
    Color::new(0x00, 0x80, 0x00),
    Color::new(0x80, 0x80, 0x00),
    Color::new(0x00, 0x00, 0x80),
    Color::new(0x80, 0x00, 0x80),
    Color::new(0x00, 0x80, 0x80),
    Color::new(0xC0, 0xC0, 0xC0),
    Color::new(0x80, 0x80, 0x80),
    Color::new(0xFF, 0x00, 0x00),
    Color::new(0x00, 0xFF, 0x00),
    Color::new(0xFF, 0xFF, 0x00),
    Color::new(0x00, 0x00, 0xFF),
    Color::new(0xFF, 0x00, 0xFF),
    Color::new(0x00, 0xFF, 0xFF),
    Color::new(0xFF, 0xFF, 0xFF),
];

/// Step between levels of the 6x6x6 color cube. A uniform step is used
/// instead of xterm's 0/95/135/175/215/255 levels.
const CUBE_STEP: u8 = 51;

/// Colors used to resolve SGR selections and the default text colors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub foreground: Color,
    pub background: Color,
    pub normal: [Color; 8],
    pub bright: [Color; 8],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            foreground: CAMPBELL_NORMAL[7],
            background: CAMPBELL_NORMAL[0],
            normal: CAMPBELL_NORMAL,
            bright: CAMPBELL_BRIGHT,
        }
    }
}

impl Palette {
    /// Base palette entry `index` (0-7), bright or normal
    pub fn base(&self, index: u8, bright: bool) -> Color {
        let table = if bright { &self.bright } else { &self.normal };
        table[usize::from(index % 8)]
    }

    /// Resolve an entry of the 256-color table
    pub fn indexed(&self, index: u8) -> Color {
        match index {
            0..=15 => INDEXED_NAMED[usize::from(index)],
            16..=231 => {
                let n = index - 16;
                Color::new(
                    (n / 36 % 6) * CUBE_STEP,
                    (n / 6 % 6) * CUBE_STEP,
                    (n % 6) * CUBE_STEP,
                )
            }
            232..=255 => {
                let level = (index - 232) * 10 + 8;
                Color::new(level, level, level)
            }
        }
    }
}
