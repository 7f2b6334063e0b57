use std::path::Path;

use pmx_utils::read_program_file;

use crate::{
    asm::{assemble_file_with_display_base, assemble_with_display_base},
    common::{Cell, MachineState, StackMode},
    config::MachineConfig,
    device::DeviceBus,
    error::{ConfigError, ProgramLoadError},
    stack::Stack,
    trace::Tracer,
};

pub const REGISTER_COUNT: usize = 8;

/// Register 8 doubles as the loaded program's length.
pub const PROGRAM_LENGTH_REGISTER: usize = 7;

pub struct Core {
    pub program_counter: usize,
    pub memory: MainMemory,
    pub registers: [Cell; REGISTER_COUNT],
    pub working_stack: Stack,
    pub return_stack: Stack,
    pub devices: DeviceBus,

    /// Length of the loaded program, which is also the single-step budget.
    pub steps: usize,

    /// Instructions executed so far in single-step mode.
    pub step: usize,

    state: MachineState,
    tracer: Option<Box<dyn Tracer>>,
}

impl Core {
    pub fn new() -> Self {
        Self::build(MachineConfig::default())
    }

    pub fn with_config(config: MachineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: MachineConfig) -> Self {
        Self {
            program_counter: 0,
            memory: MainMemory::new(config.memory_size, config.display_block_start),
            registers: [0; REGISTER_COUNT],
            working_stack: Stack::new(StackMode::Working, config.stack_capacity),
            return_stack: Stack::new(StackMode::Return, config.stack_capacity),
            devices: DeviceBus::new(),
            steps: 0,
            step: 0,
            state: MachineState::Halted,
            tracer: None,
        }
    }

    pub fn new_with_program(program: &[Cell]) -> Result<Self, ProgramLoadError> {
        let mut this = Self::new();
        this.load_program(program)?;
        Ok(this)
    }

    pub fn new_with_assembly(code: &str) -> Result<Self, ProgramLoadError> {
        let mut this = Self::new();
        this.load_assembly(code)?;
        Ok(this)
    }

    pub fn load_program_file(&mut self, path: impl AsRef<Path>) -> Result<(), ProgramLoadError> {
        let program = read_program_file(path)?;
        self.load_program(&program)
    }

    pub fn load_assembly(&mut self, code: &str) -> Result<(), ProgramLoadError> {
        let program = assemble_with_display_base(code, self.memory.display_region().start)?;
        self.load_program(&program)
    }

    /// Assembles and loads a source file, resolving its imports relative to it.
    pub fn load_assembly_file(&mut self, path: impl AsRef<Path>) -> Result<(), ProgramLoadError> {
        let program = assemble_file_with_display_base(path, self.memory.display_region().start)?;
        self.load_program(&program)
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == MachineState::Halted
    }

    pub fn set_tracer(&mut self, tracer: impl Tracer + 'static) {
        self.tracer = Some(Box::new(tracer));
    }

    pub fn clear_tracer(&mut self) {
        self.tracer = None;
    }
}

impl Default for Core {
    fn default() -> Self {
        Self::new()
    }
}

mod exec;
pub use exec::*;

mod mem;
pub use mem::*;
