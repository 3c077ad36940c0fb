//! Bar and space colors
//!
//! Widths alternate between the two colors; the color of a width is the
//! color of the element that just ended.

/// Color of element: bar or space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    #[default]
    Space = 0, // light area or space between bars
    Bar = 1,   // dark area or colored bar segment
}

impl Color {
    pub fn opposite(self) -> Self {
        match self {
            Self::Space => Self::Bar,
            Self::Bar => Self::Space,
        }
    }
}

impl From<u8> for Color {
    fn from(value: u8) -> Self {
        if value & 1 == 1 {
            Self::Bar
        } else {
            Self::Space
        }
    }
}
