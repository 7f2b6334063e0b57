mod common;
pub use common::*;

mod config;
pub use config::*;

mod error;
pub use error::*;

mod stack;
pub use stack::*;

pub mod asm;
pub mod device;
pub mod opcode;

mod trace;
pub use trace::*;

mod core;
pub use core::*;
