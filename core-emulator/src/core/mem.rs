use std::ops::Range;

use crate::{
    common::{Cell, MachineState, Memory},
    device::PortTable,
    error::{Fault, ProgramLoadError},
};

use super::{Core, PROGRAM_LENGTH_REGISTER};

impl Core {
    /// Resets the machine and loads a program at address 0, recording its length in R8 and as the
    /// single-step budget. If the program doesn't fit in the program region, the machine is left
    /// untouched.
    pub fn load_program(&mut self, program: &[Cell]) -> Result<(), ProgramLoadError> {
        let capacity = self.memory.program_region().len();
        if program.len() > capacity {
            return Err(ProgramLoadError::TooLarge { length: program.len(), capacity });
        }

        self.reset();
        self.memory.load_program(program)?;
        self.registers[PROGRAM_LENGTH_REGISTER] = program.len() as Cell;
        self.steps = program.len();
        self.state = MachineState::Running;

        log::debug!("loaded {} cells", program.len());
        Ok(())
    }

    /// Clears the loaded program from memory and resets the stacks and program counter, as done by
    /// `HALT`. Registers other than R8, and the display command region, are kept.
    pub fn unload_program(&mut self) {
        self.program_counter = 0;
        self.working_stack.clear();
        self.return_stack.clear();

        self.memory.clear_program(self.steps);
        self.registers[PROGRAM_LENGTH_REGISTER] = 0;
        self.steps = 0;
        self.step = 0;
        self.state = MachineState::Halted;
    }

    /// Returns the machine to its freshly-constructed state.
    pub fn reset(&mut self) {
        self.memory.clear();
        self.registers = Default::default();
        self.working_stack.clear();
        self.return_stack.clear();
        self.devices.ports = PortTable::new();
        self.program_counter = 0;
        self.steps = 0;
        self.step = 0;
        self.state = MachineState::Halted;
    }
}

/// The machine's flat memory: a program/data region followed by the display command region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MainMemory {
    cells: Box<[Cell]>,
    display_block_start: usize,
}

impl MainMemory {
    pub fn new(size: usize, display_block_start: usize) -> Self {
        Self {
            cells: vec![0; size].into_boxed_slice(),
            display_block_start: display_block_start.min(size),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn program_region(&self) -> Range<usize> {
        0..self.display_block_start
    }

    pub fn display_region(&self) -> Range<usize> {
        self.display_block_start..self.cells.len()
    }

    /// Read-only view of the display command region.
    pub fn display_cells(&self) -> &[Cell] {
        &self.cells[self.display_region()]
    }

    /// Copies a program to address 0. Nothing is written if it doesn't fit in the program
    /// region.
    pub fn load_program(&mut self, program: &[Cell]) -> Result<(), ProgramLoadError> {
        let capacity = self.program_region().len();
        if program.len() > capacity {
            return Err(ProgramLoadError::TooLarge { length: program.len(), capacity });
        }

        self.cells[..program.len()].copy_from_slice(program);
        Ok(())
    }

    /// Zeroes the first `length` cells, never reaching into the display command region.
    pub fn clear_program(&mut self, length: usize) {
        let end = length.min(self.display_block_start);
        self.cells[..end].fill(0);
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }
}

impl Memory for MainMemory {
    type AddressSpace = usize;

    fn read_cell(&self, addr: Self::AddressSpace) -> Result<Cell, Fault> {
        self.cells.get(addr)
            .copied()
            .ok_or(Fault::MemoryFault { address: addr as i64 })
    }

    fn write_cell(&mut self, addr: Self::AddressSpace, value: Cell) -> Result<(), Fault> {
        let cell = self.cells.get_mut(addr)
            .ok_or(Fault::MemoryFault { address: addr as i64 })?;
        *cell = value;
        Ok(())
    }

    fn out_of_range(&self, addr: i64) -> Fault {
        Fault::MemoryFault { address: addr }
    }
}
