//! The built-in 5x5 font, and the mapping between display codepoints and characters.

use crate::common::Cell;

pub const GLYPH_WIDTH: usize = 5;
pub const GLYPH_HEIGHT: usize = 5;

// One row per entry, most significant of the five bits is the leftmost column
const LETTERS: [[u8; GLYPH_HEIGHT]; 26] = [
    [0b01110, 0b10001, 0b11111, 0b10001, 0b10001], // A
    [0b11110, 0b10001, 0b11110, 0b10001, 0b11110], // B
    [0b01110, 0b10001, 0b10000, 0b10001, 0b01110], // C
    [0b11110, 0b10001, 0b10001, 0b10001, 0b11110], // D
    [0b11111, 0b10000, 0b11110, 0b10000, 0b11111], // E
    [0b11111, 0b10000, 0b11110, 0b10000, 0b10000], // F
    [0b01111, 0b10000, 0b10011, 0b10001, 0b01111], // G
    [0b10001, 0b10001, 0b11111, 0b10001, 0b10001], // H
    [0b11111, 0b00100, 0b00100, 0b00100, 0b11111], // I
    [0b11111, 0b00010, 0b00010, 0b00010, 0b11100], // J
    [0b10001, 0b10010, 0b11100, 0b10010, 0b10001], // K
    [0b10000, 0b10000, 0b10000, 0b10000, 0b11111], // L
    [0b11011, 0b10101, 0b10001, 0b10001, 0b10001], // M
    [0b11001, 0b10101, 0b10101, 0b10101, 0b10011], // N
    [0b01110, 0b10001, 0b10001, 0b10001, 0b01110], // O
    [0b11110, 0b10001, 0b11110, 0b10000, 0b10000], // P
    [0b01110, 0b10001, 0b10101, 0b10010, 0b01101], // Q
    [0b11110, 0b10001, 0b11110, 0b10001, 0b10001], // R
    [0b11111, 0b10000, 0b11111, 0b00001, 0b11111], // S
    [0b11111, 0b00100, 0b00100, 0b00100, 0b00100], // T
    [0b10001, 0b10001, 0b10001, 0b10001, 0b11111], // U
    [0b10001, 0b10001, 0b10001, 0b01010, 0b00100], // V
    [0b10001, 0b10001, 0b10001, 0b10101, 0b11011], // W
    [0b10001, 0b01010, 0b00100, 0b01010, 0b10001], // X
    [0b10001, 0b01010, 0b00100, 0b00100, 0b00100], // Y
    [0b11111, 0b00001, 0b01110, 0b10000, 0b11111], // Z
];

// Codepoint 0x16 is unassigned, so V..Z are offset by one from their alphabet position
const CODEPOINTS: [(Cell, char); 27] = [
    (0x00, ' '),
    (0x01, 'A'), (0x02, 'B'), (0x03, 'C'), (0x04, 'D'), (0x05, 'E'), (0x06, 'F'),
    (0x07, 'G'), (0x08, 'H'), (0x09, 'I'), (0x0A, 'J'), (0x0B, 'K'), (0x0C, 'L'),
    (0x0D, 'M'), (0x0E, 'N'), (0x0F, 'O'), (0x10, 'P'), (0x11, 'Q'), (0x12, 'R'),
    (0x13, 'S'), (0x14, 'T'), (0x15, 'U'), (0x17, 'V'), (0x18, 'W'), (0x19, 'X'),
    (0x1A, 'Y'), (0x1B, 'Z'),
];

pub fn char_for_code(code: Cell) -> Option<char> {
    CODEPOINTS.iter().find(|(c, _)| *c == code).map(|(_, ch)| *ch)
}

pub fn code_for_char(ch: char) -> Option<Cell> {
    let ch = ch.to_ascii_uppercase();
    CODEPOINTS.iter().find(|(_, c)| *c == ch).map(|(code, _)| *code)
}

/// A drawable character. Space is a glyph with no pixels set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Glyph {
    rows: [u8; GLYPH_HEIGHT],
}

impl Glyph {
    pub fn for_char(ch: char) -> Option<Glyph> {
        match ch.to_ascii_uppercase() {
            ' ' => Some(Glyph { rows: [0; GLYPH_HEIGHT] }),
            letter @ 'A'..='Z' => Some(Glyph { rows: LETTERS[(letter as u8 - b'A') as usize] }),
            _ => None,
        }
    }

    pub fn is_set(&self, row: usize, col: usize) -> bool {
        row < GLYPH_HEIGHT && col < GLYPH_WIDTH
            && self.rows[row] & (1 << (GLYPH_WIDTH - 1 - col)) != 0
    }

    /// `(row, col)` of every set pixel, row by row.
    pub fn set_pixels(self) -> impl Iterator<Item = (usize, usize)> {
        (0..GLYPH_HEIGHT)
            .flat_map(|row| (0..GLYPH_WIDTH).map(move |col| (row, col)))
            .filter(move |&(row, col)| self.is_set(row, col))
    }
}
