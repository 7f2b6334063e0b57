//! Text-mode display device.
//!
//! Programs describe a frame as a list of 5-cell draw records in the display command region:
//!
//! ```text
//!   +0 codepoint  (0 ends the list)
//!   +1 x          in glyph units, multiplied by scale
//!   +2 y
//!   +3 scale
//!   +4 color      RGB444
//! ```
//!
//! Each time a record is drawn, its `x` and `y` are incremented in memory, so a list left armed
//! drifts one step diagonally every frame. This is the machine's only form of animation.

use std::any::Any;

use crate::{common::{Cell, Memory}, core::MainMemory, error::Fault};

use super::{font::{char_for_code, Glyph}, Device, PortTable};

pub const WIDTH: usize = 800;
pub const HEIGHT: usize = 600;

pub const RECORD_CELLS: usize = 5;

/// Horizontal advance between characters drawn by [`Display::draw_string`], in glyph units.
pub const TEXT_PITCH: i32 = 6;

/// Sub-operation redrawing the command list. The port stays armed, so it redraws every scan.
pub const DRAW: u8 = 0x0;

/// Sub-operation blanking the screen once. The port is disarmed afterwards.
pub const CLEAR: u8 = 0x1;

/// One draw record, as read from the display command region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawCommand {
    pub code: Cell,
    pub x: Cell,
    pub y: Cell,
    pub scale: Cell,
    pub color: Cell,
}

impl DrawCommand {
    fn read(memory: &MainMemory, addr: usize) -> Result<Self, Fault> {
        Ok(Self {
            code: memory.read_cell(addr)?,
            x: memory.read_cell(addr + 1)?,
            y: memory.read_cell(addr + 2)?,
            scale: memory.read_cell(addr + 3)?,
            color: memory.read_cell(addr + 4)?,
        })
    }
}

pub struct Display {
    pixels: Vec<u16>,
    background: u16,
}

impl Display {
    pub fn new(background: u16) -> Self {
        Self {
            pixels: vec![background; WIDTH * HEIGHT],
            background,
        }
    }

    /// Row-major RGB444 pixels, `WIDTH` per row.
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u16> {
        (x < WIDTH && y < HEIGHT).then(|| self.pixels[y * WIDTH + x])
    }

    pub fn clear(&mut self) {
        self.pixels.fill(self.background);
    }

    /// Draws a glyph whose top-left corner is at `(x * scale, y * scale)` device pixels, with each
    /// glyph pixel becoming a `scale` by `scale` block. Anything off-screen is clipped.
    pub fn draw_glyph(&mut self, glyph: Glyph, x: Cell, y: Cell, scale: Cell, color: u16) {
        if scale <= 0 {
            return;
        }
        let scale = scale as i64;

        for (row, col) in glyph.set_pixels() {
            let top = (y as i64 + row as i64) * scale;
            let left = (x as i64 + col as i64) * scale;

            for py in clip(top, scale, HEIGHT) {
                let line = py * WIDTH;
                for px in clip(left, scale, WIDTH) {
                    self.pixels[line + px] = color;
                }
            }
        }
    }

    /// Draws a line of text. Characters without a glyph leave a gap.
    pub fn draw_string(&mut self, text: &str, x: Cell, y: Cell, scale: Cell, color: u16) {
        let mut x = x;

        for ch in text.chars() {
            match Glyph::for_char(ch) {
                Some(glyph) if ch != ' ' => self.draw_glyph(glyph, x, y, scale, color),
                Some(_) => {}
                None => log::warn!("no glyph for {ch:?}"),
            }
            x = x.wrapping_add(TEXT_PITCH);
        }
    }

    /// Redraws the screen from the display command region, advancing every drawn record's
    /// position in place. Returns the number of records drawn.
    pub fn render_commands(&mut self, memory: &mut MainMemory) -> Result<usize, Fault> {
        self.clear();

        let mut drawn = 0;
        let mut addr = memory.display_region().start;
        while addr + RECORD_CELLS <= memory.len() {
            let command = DrawCommand::read(memory, addr)?;
            if command.code == 0 {
                break;
            }

            match char_for_code(command.code).and_then(Glyph::for_char) {
                Some(glyph) => {
                    let color = (command.color & 0xFFF) as u16;
                    self.draw_glyph(glyph, command.x, command.y, command.scale, color);

                    memory.write_cell(addr + 1, command.x.wrapping_add(1))?;
                    memory.write_cell(addr + 2, command.y.wrapping_add(1))?;
                    drawn += 1;
                }
                None => log::warn!("display record at {addr} has unassigned codepoint {:#x}", command.code),
            }

            addr += RECORD_CELLS;
        }

        Ok(drawn)
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new(0x000)
    }
}

impl Device for Display {
    fn trigger(&mut self, port: u8, ports: &mut PortTable, memory: &mut MainMemory) -> Result<(), Fault> {
        match port & 0x0F {
            DRAW => {
                let drawn = self.render_commands(memory)?;
                log::trace!("display drew {drawn} records");
            }
            CLEAR => {
                self.clear();
                ports.write_cell(port, 0)?;
            }
            other => log::warn!("display sub-operation {other:#x} is not supported"),
        }

        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The on-screen part of the span `[start, start + len)`.
fn clip(start: i64, len: i64, limit: usize) -> std::ops::Range<usize> {
    let from = start.clamp(0, limit as i64) as usize;
    let to = (start + len).clamp(0, limit as i64) as usize;
    from..to
}

#[cfg(test)]
mod test {
    use crate::{common::Memory, core::MainMemory, device::{font::Glyph, PortTable}};

    use super::{Display, HEIGHT, WIDTH};

    fn memory_with_records(records: &[[i32; 5]]) -> MainMemory {
        let mut memory = MainMemory::new(100, 50);
        for (i, record) in records.iter().enumerate() {
            for (j, cell) in record.iter().enumerate() {
                memory.write_cell(50 + i * 5 + j, *cell).unwrap();
            }
        }
        memory
    }

    fn lit_pixels(display: &Display) -> usize {
        display.pixels().iter().filter(|p| **p != 0).count()
    }

    #[test]
    fn test_draw_record_and_advance() {
        let mut memory = memory_with_records(&[[1, 10, 10, 2, 0xFFF]]);
        let mut display = Display::default();

        assert_eq!(display.render_commands(&mut memory), Ok(1));

        // 'A' has 14 set pixels, each drawn as a 2x2 block
        assert_eq!(lit_pixels(&display), 14 * 4);

        // Top row of 'A' is .###. starting at device pixel (20, 20)
        assert_eq!(display.pixel(20, 20), Some(0));
        assert_eq!(display.pixel(22, 20), Some(0xFFF));
        assert_eq!(display.pixel(23, 21), Some(0xFFF));
        assert_eq!(display.pixel(28, 20), Some(0));

        // Left leg in the bottom row
        assert_eq!(display.pixel(20, 28), Some(0xFFF));
        assert_eq!(display.pixel(21, 29), Some(0xFFF));

        assert_eq!(&memory.display_cells()[..5], [1, 11, 11, 2, 0xFFF]);
    }

    #[test]
    fn test_sentinel_stops_scan() {
        let mut memory = memory_with_records(&[
            [2, 0, 0, 1, 0xF00],
            [0, 0, 0, 0, 0],
            [3, 20, 20, 1, 0xF00],
        ]);
        let mut display = Display::default();

        assert_eq!(display.render_commands(&mut memory), Ok(1));
        assert_eq!(&memory.display_cells()[10..15], [3, 20, 20, 1, 0xF00]);
        assert_eq!(display.pixel(21, 20), Some(0));
    }

    #[test]
    fn test_unassigned_codepoint_is_skipped() {
        let mut memory = memory_with_records(&[[0x16, 1, 1, 1, 0xFFF], [1, 1, 1, 1, 0xFFF]]);
        let mut display = Display::default();

        assert_eq!(display.render_commands(&mut memory), Ok(1));
        assert_eq!(&memory.display_cells()[..10], [0x16, 1, 1, 1, 0xFFF, 1, 2, 2, 1, 0xFFF]);
    }

    #[test]
    fn test_redraw_clears_previous_frame() {
        let mut memory = memory_with_records(&[[9, 0, 0, 1, 0x0F0]]);
        let mut display = Display::default();

        display.render_commands(&mut memory).unwrap();
        assert_eq!(display.pixel(0, 0), Some(0x0F0));

        // The record has moved to (1, 1), so the old top-left corner is blank again
        display.render_commands(&mut memory).unwrap();
        assert_eq!(display.pixel(0, 0), Some(0));
        assert_eq!(display.pixel(1, 1), Some(0x0F0));
    }

    #[test]
    fn test_clipping() {
        let mut display = Display::default();
        let glyph = Glyph::for_char('H').unwrap();

        display.draw_glyph(glyph, -2, -2, 1, 0xFFF);
        display.draw_glyph(glyph, (WIDTH - 2) as i32, (HEIGHT - 2) as i32, 1, 0xFFF);
        display.draw_glyph(glyph, 0, 0, 0, 0xFFF);
        display.draw_glyph(glyph, 0, 0, -3, 0xFFF);

        // Only the bottom-right 3x3 corner of the first H and top-left 2x2 corner of the second remain
        assert_eq!(display.pixel(0, 0), Some(0xFFF));
        assert_eq!(display.pixel(WIDTH - 2, HEIGHT - 2), Some(0xFFF));
        assert_eq!(lit_pixels(&display), 5 + 2);
    }

    #[test]
    fn test_draw_string() {
        let mut display = Display::default();
        display.draw_string("I I", 0, 0, 1, 0xF00);

        // I's top bar spans columns 0..5, the space takes 6..12, the second I starts at 12
        assert_eq!(display.pixel(4, 0), Some(0xF00));
        assert_eq!(display.pixel(8, 0), Some(0));
        assert_eq!(display.pixel(12, 0), Some(0xF00));
        assert_eq!(lit_pixels(&display), 13 * 2);
    }

    #[test]
    fn test_clear_trigger_disarms() {
        use crate::device::Device;

        let mut memory = MainMemory::new(100, 50);
        let mut ports = PortTable::new();
        let mut display = Display::default();
        display.draw_string("A", 0, 0, 1, 0xFFF);

        ports.write_cell(0x11, 1).unwrap();
        display.trigger(0x11, &mut ports, &mut memory).unwrap();

        assert_eq!(lit_pixels(&display), 0);
        assert_eq!(ports.read_cell(0x11), Ok(0));
    }
}
