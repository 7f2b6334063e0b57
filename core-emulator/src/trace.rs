use std::fmt;

use crate::{common::Cell, core::REGISTER_COUNT};

/// The machine state after one executed instruction, borrowed for the duration of a
/// [`Tracer::trace`] call.
#[derive(Debug, Clone, Copy)]
pub struct TraceRecord<'a> {
    /// Address the instruction was fetched from.
    pub pc: usize,
    pub opcode: Cell,
    pub mnemonic: &'static str,
    pub working_stack: &'a [Cell],
    pub return_stack: &'a [Cell],
    pub registers: &'a [Cell; REGISTER_COUNT],
    pub display_region: &'a [Cell],
}

/// Receives a record for every instruction the machine executes.
pub trait Tracer {
    fn trace(&mut self, record: &TraceRecord<'_>);
}

impl<F: FnMut(&TraceRecord<'_>)> Tracer for F {
    fn trace(&mut self, record: &TraceRecord<'_>) {
        self(record)
    }
}

impl fmt::Display for TraceRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "({}) \tOPCODE: {:x} ({})", self.pc, self.opcode, self.mnemonic)?;

        write!(f, "\t\tWST: [ ")?;
        for cell in self.working_stack {
            write!(f, "{cell} ")?;
        }
        writeln!(f, "]")?;

        write!(f, "\t\tRST: [ ")?;
        for cell in self.return_stack {
            write!(f, "{cell} ")?;
        }
        writeln!(f, "]")?;

        let registers = self.registers.iter()
            .enumerate()
            .map(|(i, value)| format!("R{}={value}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "\t\t{registers}")?;
        writeln!(f, "-------------------------------------")
    }
}

#[cfg(test)]
mod test {
    use super::TraceRecord;

    #[test]
    fn test_format() {
        let record = TraceRecord {
            pc: 4,
            opcode: 0x09,
            mnemonic: "ADD",
            working_stack: &[7],
            return_stack: &[],
            registers: &[0, 0, 0, 0, 0, 0, 0, 6],
            display_region: &[],
        };

        assert_eq!(record.to_string(), concat!(
            "(4) \tOPCODE: 9 (ADD)\n",
            "\t\tWST: [ 7 ]\n",
            "\t\tRST: [ ]\n",
            "\t\tR1=0, R2=0, R3=0, R4=0, R5=0, R6=0, R7=0, R8=6\n",
            "-------------------------------------\n",
        ));
    }
}
