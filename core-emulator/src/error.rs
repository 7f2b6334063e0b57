use pmx_utils::ProgramFileError;
use thiserror::Error;

use crate::{asm::AssembleError, common::{Cell, StackMode}};

/// A runtime fault. Every fault halts the machine which raised it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("unknown opcode {opcode:#x} at pc {pc}")]
    UnknownOpcode { opcode: Cell, pc: usize },

    #[error("{stack:?} stack underflow")]
    StackUnderflow { stack: StackMode },

    #[error("{stack:?} stack overflow")]
    StackOverflow { stack: StackMode },

    #[error("memory address {address} out of range")]
    MemoryFault { address: i64 },

    #[error("register R{register} does not exist")]
    InvalidRegister { register: Cell },

    #[error("device port {port} does not exist")]
    InvalidPort { port: i64 },

    #[error("{mnemonic} is undefined for operand {operand}")]
    ArithmeticDomain { mnemonic: &'static str, operand: Cell },
}

#[derive(Debug, Error)]
pub enum ProgramLoadError {
    #[error(transparent)]
    File(#[from] ProgramFileError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error("program of {length} cells does not fit in the {capacity}-cell program region")]
    TooLarge { length: usize, capacity: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("display block start {display_block_start} lies beyond memory size {memory_size}")]
    DisplayBlockOutOfRange { display_block_start: usize, memory_size: usize },

    #[error("stack capacity must be at least 1")]
    ZeroStackCapacity,
}
