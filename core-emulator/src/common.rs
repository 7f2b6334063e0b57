use num_traits::NumCast;

use crate::error::Fault;

pub use pmx_utils::Cell;

/// The value a device port must hold for a bus scan to dispatch it.
pub const TRIGGER: Cell = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackMode {
    Working,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Running,
    Halted,
}

/// A bounds-checked, cell-addressed memory. Implemented by main memory and by the device port
/// table, which differ only in their address space.
pub trait Memory {
    type AddressSpace: Copy + NumCast;

    fn read_cell(&self, addr: Self::AddressSpace) -> Result<Cell, Fault>;
    fn write_cell(&mut self, addr: Self::AddressSpace, value: Cell) -> Result<(), Fault>;

    /// The fault to raise for an address which cannot be represented in this address space.
    fn out_of_range(&self, addr: i64) -> Fault;

    /// Converts an address held in a cell into this address space.
    fn resolve(&self, addr: Cell) -> Result<Self::AddressSpace, Fault> {
        <Self::AddressSpace as NumCast>::from(addr)
            .ok_or_else(|| self.out_of_range(addr as i64))
    }

    fn read_at(&self, addr: Cell) -> Result<Cell, Fault> {
        self.read_cell(self.resolve(addr)?)
    }

    fn write_at(&mut self, addr: Cell, value: Cell) -> Result<(), Fault> {
        let addr = self.resolve(addr)?;
        self.write_cell(addr, value)
    }
}

/// Integer power with C-style truncation of the real result for negative exponents.
pub fn integer_pow(base: Cell, exponent: Cell) -> Cell {
    if exponent < 0 {
        return match base {
            1 => 1,
            -1 if exponent % 2 == 0 => 1,
            -1 => -1,
            _ => 0,
        };
    }

    // Saturating to the largest exponent still keeps the wrapped result for bases of magnitude
    // 0 and 1, and anything else has long since wrapped
    let exponent = u32::try_from(exponent).unwrap_or(u32::MAX);
    num_traits::checked_pow(base, exponent as usize)
        .unwrap_or_else(|| base.wrapping_pow(exponent))
}

/// Integer square root, rounding down.
pub fn integer_sqrt(value: Cell) -> Option<Cell> {
    if value < 0 {
        return None;
    }

    let mut root = (value as f64).sqrt() as Cell;
    // Correct any floating-point error near perfect squares
    while (root as i64) * (root as i64) > value as i64 {
        root -= 1;
    }
    while ((root + 1) as i64) * ((root + 1) as i64) <= value as i64 {
        root += 1;
    }
    Some(root)
}

#[cfg(test)]
mod test {
    use super::{integer_pow, integer_sqrt};

    #[test]
    fn test_pow() {
        assert_eq!(integer_pow(2, 10), 1024);
        assert_eq!(integer_pow(-3, 3), -27);
        assert_eq!(integer_pow(7, 0), 1);
        assert_eq!(integer_pow(2, -1), 0);
        assert_eq!(integer_pow(-1, -3), -1);
        assert_eq!(integer_pow(2, 32), 0);
    }

    #[test]
    fn test_sqrt() {
        assert_eq!(integer_sqrt(0), Some(0));
        assert_eq!(integer_sqrt(15), Some(3));
        assert_eq!(integer_sqrt(16), Some(4));
        assert_eq!(integer_sqrt(i32::MAX), Some(46340));
        assert_eq!(integer_sqrt(-4), None);
    }
}
