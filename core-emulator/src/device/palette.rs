/// The named colours understood by the assembler and the host. Values are 12-bit RGB444.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    White,
    Black,
    Red,
    Green,
    Blue,
    Yellow,
    Magenta,
}

impl Color {
    pub const ALL: [Color; 7] = [
        Color::White, Color::Black, Color::Red, Color::Green,
        Color::Blue, Color::Yellow, Color::Magenta,
    ];

    pub fn rgb444(self) -> u16 {
        match self {
            Color::White => 0xFFF,
            Color::Black => 0x000,
            Color::Red => 0xF00,
            Color::Green => 0x0F0,
            Color::Blue => 0x00F,
            Color::Yellow => 0xFF0,
            Color::Magenta => 0xF0F,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::White => "WHITE",
            Color::Black => "BLACK",
            Color::Red => "RED",
            Color::Green => "GREEN",
            Color::Blue => "BLUE",
            Color::Yellow => "YELLOW",
            Color::Magenta => "MAGENTA",
        }
    }

    pub fn from_name(name: &str) -> Option<Color> {
        Color::ALL.into_iter().find(|color| color.name().eq_ignore_ascii_case(name))
    }
}

/// Expands a 12-bit RGB444 pixel to `0x00RRGGBB`.
pub fn rgb444_to_rgb888(pixel: u16) -> u32 {
    let r = ((pixel >> 8) & 0xF) as u32;
    let g = ((pixel >> 4) & 0xF) as u32;
    let b = (pixel & 0xF) as u32;

    // Multiplying by 0x11 repeats the nibble, so 0xF maps to 0xFF
    (r * 0x11) << 16 | (g * 0x11) << 8 | (b * 0x11)
}

#[cfg(test)]
mod test {
    use super::{rgb444_to_rgb888, Color};

    #[test]
    fn test_names() {
        assert_eq!(Color::from_name("red"), Some(Color::Red));
        assert_eq!(Color::from_name("MAGENTA").map(Color::rgb444), Some(0xF0F));
        assert_eq!(Color::from_name("ORANGE"), None);
    }

    #[test]
    fn test_expand() {
        assert_eq!(rgb444_to_rgb888(0xFFF), 0xFFFFFF);
        assert_eq!(rgb444_to_rgb888(0xF00), 0xFF0000);
        assert_eq!(rgb444_to_rgb888(0x08F), 0x0088FF);
    }
}
