//! The PMX instruction set, declared once as data. The decode table, mnemonic lookup, operand
//! widths, the assembler and the disassembler are all derived from the table below.

use crate::common::Cell;

macro_rules! opcodes {
    ($( $byte:literal => $name:ident, $mnemonic:literal, $width:literal; )*) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $( $name = $byte, )*
        }

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[ $( Opcode::$name, )* ];

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Number of cells this instruction occupies, including the opcode itself.
            pub fn width(self) -> usize {
                match self {
                    $( Opcode::$name => $width, )*
                }
            }
        }
    };
}

opcodes! {
    0x00 => Halt,   "HALT",    1;
    0x01 => LoadR1, "LOAD R1", 2;
    0x02 => LoadR2, "LOAD R2", 2;
    0x03 => LoadR3, "LOAD R3", 2;
    0x04 => LoadR4, "LOAD R4", 2;
    0x05 => LoadR5, "LOAD R5", 2;
    0x06 => LoadR6, "LOAD R6", 2;
    0x07 => LoadR7, "LOAD R7", 2;
    0x08 => LoadR8, "LOAD R8", 2;
    0x09 => Add,    "ADD",     1;
    0x0A => Sub,    "SUB",     1;
    0x0B => Push,   "PUSH",    2;
    0x0C => Pop,    "POP",     2;
    0x0D => Equal,  "EQUAL",   1;
    0x0E => Gth,    "GTH",     1;
    0x0F => Lth,    "LTH",     1;
    0x10 => Dup,    "DUP",     1;
    0x11 => Pot,    "POT",     2;
    0x12 => Ovr,    "OVR",     1;
    0x13 => Inc,    "INC",     1;
    0x14 => Dcr,    "DCR",     1;
    0x20 => Mov,    "MOV",     5;
    0x23 => Pow,    "POW",     1;
    0x24 => Sqrt,   "SQRT",    1;
    0x25 => Abs,    "ABS",     1;
    0xAA => Str,    "STR",     1;
    0xAF => Dvo,    "DVO",     2;
    0xBF => Dvw,    "DVW",     2;
    0xCF => Swap,   "SWAP",    3;
    0xDE => Goto,   "GOTO",    1;
    0xDF => Jmp,    "JMP",     1;
    0xEE => Rmv,    "RMV",     1;
    0xEF => Jnz,    "JNZ",     1;
    0xFE => Rpc,    "RPC",     1;
    0xFF => Ret,    "RET",     1;
}

const DECODE_TABLE: [Option<Opcode>; 256] = {
    let mut table = [None; 256];
    let mut i = 0;
    while i < Opcode::ALL.len() {
        let opcode = Opcode::ALL[i];
        table[opcode as usize] = Some(opcode);
        i += 1;
    }
    table
};

impl Opcode {
    /// Decodes a fetched cell. Anything outside a single byte never decodes.
    pub fn decode(cell: Cell) -> Option<Opcode> {
        let byte = u8::try_from(cell).ok()?;
        DECODE_TABLE[byte as usize]
    }

    /// Looks up an opcode by its mnemonic, ignoring case. `LOAD` on its own is ambiguous and
    /// must be spelled with its register, e.g. `LOAD R3`.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        Opcode::ALL.iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(mnemonic))
    }

    /// Whether this instruction sets the program counter itself rather than stepping past its
    /// encoded width.
    pub fn is_jump(self) -> bool {
        matches!(self, Opcode::Goto | Opcode::Jmp | Opcode::Jnz)
    }
}

/// Produces one line of listing per instruction, keyed by address.
///
/// Cells which don't decode, and instructions truncated by the end of the program, are listed as
/// `.data`.
pub fn disassemble(cells: &[Cell]) -> Vec<(usize, String)> {
    let mut listing = vec![];
    let mut addr = 0;

    while addr < cells.len() {
        let decoded = Opcode::decode(cells[addr])
            .filter(|op| addr + op.width() <= cells.len());

        match decoded {
            Some(op) => {
                let mut line = op.mnemonic().to_string();
                for operand in &cells[addr + 1..addr + op.width()] {
                    line.push_str(&format!(" {operand}"));
                }
                listing.push((addr, line));
                addr += op.width();
            }
            None => {
                listing.push((addr, format!(".data {}", cells[addr])));
                addr += 1;
            }
        }
    }

    listing
}
