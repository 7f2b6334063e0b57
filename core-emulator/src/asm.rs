//! A small line-oriented assembler for PMX programs.
//!
//! ```text
//! // Comments run to the end of the line
//! VAR limit #3
//! LOAD R1 #0
//! LABEL loop
//!     PUSH R1
//!     INC
//!     POP R1
//!     ...
//! WCHR H #10 #10 #2 RED
//! HALT
//! ```
//!
//! Values are decimal (optionally prefixed with `#`), hexadecimal with `0x`, or the name of a
//! `VAR` or `LABEL`, optionally prefixed with `@`. Names may be used before they are defined.
//!
//! `IMPORT "path"` inlines another source file at that point, sharing names with the importer.
//! Paths are relative to the importing file, or to the working directory for in-memory sources.
//! Lines between `#START` and `#END` are moved to the end of the file containing them, after any
//! imports, which keeps data and subroutines out of the way of straight-line code.

use std::{collections::HashMap, fs, io, path::{Path, PathBuf}};

use thiserror::Error;

use crate::{common::Cell, config::DISPLAY_BLOCK_START, device::{font::code_for_char, Color}, opcode::Opcode};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error("line {line}: unknown instruction `{name}`")]
    UnknownInstruction { line: usize, name: String },

    #[error("line {line}: {instruction} takes {expected} operand(s), got {actual}")]
    OperandCount { line: usize, instruction: String, expected: usize, actual: usize },

    #[error("line {line}: invalid operand `{operand}`")]
    InvalidOperand { line: usize, operand: String },

    #[error("line {line}: undefined name `{name}`")]
    UndefinedName { line: usize, name: String },

    #[error("line {line}: no glyph for `{character}`")]
    UnknownCharacter { line: usize, character: String },

    #[error("line {line}: #START and #END do not pair up")]
    UnbalancedBlock { line: usize },

    #[error("line {line}: cannot import `{}`: {kind}", path.display())]
    Import { line: usize, path: PathBuf, kind: io::ErrorKind },

    #[error("line {line}: `{}` is already being imported", path.display())]
    ImportCycle { line: usize, path: PathBuf },

    #[error("cannot read `{}`: {kind}", path.display())]
    Read { path: PathBuf, kind: io::ErrorKind },

    #[error("in `{}`, {source}", path.display())]
    InFile { path: PathBuf, source: Box<AssembleError> },
}

/// Assembles a program, placing `WCHR` records at the reference display block.
pub fn assemble(source: &str) -> Result<Vec<Cell>, AssembleError> {
    assemble_with_display_base(source, DISPLAY_BLOCK_START)
}

/// Assembles a program, placing `WCHR` records from `display_base` upwards.
pub fn assemble_with_display_base(source: &str, display_base: usize) -> Result<Vec<Cell>, AssembleError> {
    let mut sources = Sources { files: vec![PathBuf::new()], importing: vec![] };
    let lines = sources.expand(source, Path::new(""), 0)?;
    sources.assemble(lines, display_base)
}

/// Assembles the program in the file at `path`, placing `WCHR` records at the reference display
/// block.
pub fn assemble_file(path: impl AsRef<Path>) -> Result<Vec<Cell>, AssembleError> {
    assemble_file_with_display_base(path, DISPLAY_BLOCK_START)
}

pub fn assemble_file_with_display_base(path: impl AsRef<Path>, display_base: usize) -> Result<Vec<Cell>, AssembleError> {
    let path = path.as_ref();
    let read_error = |e: io::Error| AssembleError::Read { path: path.to_path_buf(), kind: e.kind() };

    let source = fs::read_to_string(path).map_err(read_error)?;
    let canonical = path.canonicalize().map_err(read_error)?;

    let mut sources = Sources { files: vec![path.to_path_buf()], importing: vec![canonical] };
    let lines = sources.expand(&source, path.parent().unwrap_or(Path::new("")), 0)?;
    sources.assemble(lines, display_base)
}

/// A line of source, once imports are inlined and relocated blocks moved.
struct SourceLine {
    file: usize,
    line: usize,
    text: String,
}

/// The files taking part in one assembly. File 0 is the root source, and errors from any other
/// file are wrapped in [`AssembleError::InFile`].
struct Sources {
    files: Vec<PathBuf>,
    importing: Vec<PathBuf>, // Canonical paths of the files currently being expanded
}

impl Sources {
    fn expand(&mut self, source: &str, dir: &Path, file: usize) -> Result<Vec<SourceLine>, AssembleError> {
        let mut body = vec![];
        let mut relocated = vec![];
        let mut block_start = None;

        for (index, text) in source.lines().enumerate() {
            let line = index + 1;
            let code = strip_comment(text).trim();
            let (keyword, rest) = code.split_once(char::is_whitespace).unwrap_or((code, ""));

            let out = if block_start.is_some() { &mut relocated } else { &mut body };
            match keyword.to_ascii_uppercase().as_str() {
                "#START" if block_start.is_none() => block_start = Some(line),
                "#END" if block_start.is_some() => block_start = None,
                "#START" | "#END" => return Err(self.in_file(file, AssembleError::UnbalancedBlock { line })),
                "IMPORT" => out.extend(self.import(line, rest, dir, file)?),
                _ => out.push(SourceLine { file, line, text: code.to_string() }),
            }
        }

        if let Some(line) = block_start {
            return Err(self.in_file(file, AssembleError::UnbalancedBlock { line }));
        }

        body.append(&mut relocated);
        Ok(body)
    }

    fn import(&mut self, line: usize, operand: &str, dir: &Path, file: usize) -> Result<Vec<SourceLine>, AssembleError> {
        let name = operand.trim().trim_matches('"');
        if name.is_empty() {
            let error = AssembleError::OperandCount { line, instruction: "IMPORT".to_string(), expected: 1, actual: 0 };
            return Err(self.in_file(file, error));
        }

        let path = dir.join(name);
        let source = path.canonicalize()
            .and_then(|canonical| Ok((fs::read_to_string(&canonical)?, canonical)));
        let (source, canonical) = match source {
            Ok(read) => read,
            Err(e) => return Err(self.in_file(file, AssembleError::Import { line, path, kind: e.kind() })),
        };

        if self.importing.contains(&canonical) {
            return Err(self.in_file(file, AssembleError::ImportCycle { line, path }));
        }

        log::debug!("importing {} at line {line}", path.display());
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        self.files.push(path);
        self.importing.push(canonical);
        let lines = self.expand(&source, &dir, self.files.len() - 1);
        self.importing.pop();
        lines
    }

    fn assemble(&self, lines: Vec<SourceLine>, display_base: usize) -> Result<Vec<Cell>, AssembleError> {
        let mut assembler = Assembler {
            output: vec![],
            symbols: HashMap::new(),
            display_addr: display_base as Cell,
            file: 0,
        };

        for SourceLine { file, line, text } in lines {
            assembler.file = file;
            assembler.line(line, &text).map_err(|e| self.in_file(file, e))?;
        }

        assembler.finish(self)
    }

    fn in_file(&self, file: usize, error: AssembleError) -> AssembleError {
        match file {
            0 => error,
            _ => AssembleError::InFile { path: self.files[file].clone(), source: Box::new(error) },
        }
    }
}

enum Slot {
    Value(Cell),
    Name { name: String, file: usize, line: usize },
}

struct Assembler {
    output: Vec<Slot>,
    symbols: HashMap<String, Cell>,
    display_addr: Cell,
    file: usize, // Source of the line being assembled
}

impl Assembler {
    fn line(&mut self, line: usize, text: &str) -> Result<(), AssembleError> {
        let text = strip_comment(text);

        let parts: Vec<&str> = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|part| !part.is_empty())
            .collect();
        let Some((instruction, operands)) = parts.split_first() else {
            return Ok(());
        };

        let name = instruction.to_ascii_uppercase();
        match name.as_str() {
            "VAR" => {
                expect_operands(line, &name, operands, 2)?;
                let value = literal(line, operands[1])?;
                self.symbols.insert(operands[0].to_string(), value);
            }

            "LABEL" => {
                expect_operands(line, &name, operands, 1)?;
                self.symbols.insert(operands[0].to_string(), self.output.len() as Cell);
            }

            "CALL" => {
                expect_operands(line, &name, operands, 1)?;
                self.emit_op(Opcode::Pot);
                self.emit_value(line, operands[0])?;
                self.emit_op(Opcode::Goto);
            }

            "WCHR" => {
                expect_operands(line, &name, operands, 5)?;
                let code = single_char(operands[0])
                    .and_then(code_for_char)
                    .ok_or_else(|| AssembleError::UnknownCharacter { line, character: operands[0].to_string() })?;
                let color = match Color::from_name(operands[4]) {
                    Some(color) => color.rgb444() as Cell,
                    None => literal(line, operands[4])?,
                };

                self.store_display_cell(Slot::Value(code));
                for operand in &operands[1..4] {
                    let slot = self.value(line, operand)?;
                    self.store_display_cell(slot);
                }
                self.store_display_cell(Slot::Value(color));
            }

            "LOAD" => {
                expect_operands(line, &name, operands, 2)?;
                let register = register(line, operands[0])?;
                let opcode = Opcode::decode(Opcode::LoadR1 as Cell + register - 1)
                    .ok_or_else(|| invalid(line, operands[0]))?;
                self.emit_op(opcode);
                self.emit_value(line, operands[1])?;
            }

            "PUSH" | "POP" => {
                expect_operands(line, &name, operands, 1)?;
                let opcode = if name == "PUSH" { Opcode::Push } else { Opcode::Pop };
                self.emit_op(opcode);
                self.output.push(Slot::Value(register(line, operands[0])?));
            }

            "SWAP" => {
                expect_operands(line, &name, operands, 2)?;
                self.emit_op(Opcode::Swap);
                self.output.push(Slot::Value(register(line, operands[0])?));
                self.output.push(Slot::Value(register(line, operands[1])?));
            }

            "MOV" => {
                expect_operands(line, &name, operands, 2)?;
                let (dst_flag, dst) = mov_operand(line, operands[0])?;
                let (src_flag, src) = mov_operand(line, operands[1])?;
                self.emit_op(Opcode::Mov);
                for cell in [dst_flag, src_flag, dst, src] {
                    self.output.push(Slot::Value(cell));
                }
            }

            _ => {
                let opcode = Opcode::from_mnemonic(&name)
                    .ok_or_else(|| AssembleError::UnknownInstruction { line, name: instruction.to_string() })?;
                expect_operands(line, &name, operands, opcode.width() - 1)?;
                self.emit_op(opcode);
                for operand in operands {
                    self.emit_value(line, operand)?;
                }
            }
        }

        Ok(())
    }

    fn emit_op(&mut self, opcode: Opcode) {
        self.output.push(Slot::Value(opcode as Cell));
    }

    fn emit_value(&mut self, line: usize, operand: &str) -> Result<(), AssembleError> {
        let slot = self.value(line, operand)?;
        self.output.push(slot);
        Ok(())
    }

    fn value(&self, line: usize, operand: &str) -> Result<Slot, AssembleError> {
        if let Ok(value) = literal(line, operand) {
            return Ok(Slot::Value(value));
        }

        let name = operand.strip_prefix('@').unwrap_or(operand);
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
            return Err(invalid(line, operand));
        }
        Ok(Slot::Name { name: name.to_string(), file: self.file, line })
    }

    /// Emits `POT value; POT addr; STR`, storing one cell of a display record.
    fn store_display_cell(&mut self, value: Slot) {
        self.emit_op(Opcode::Pot);
        self.output.push(value);
        self.emit_op(Opcode::Pot);
        self.output.push(Slot::Value(self.display_addr));
        self.emit_op(Opcode::Str);
        self.display_addr += 1;
    }

    fn finish(self, sources: &Sources) -> Result<Vec<Cell>, AssembleError> {
        self.output.into_iter()
            .map(|slot| match slot {
                Slot::Value(value) => Ok(value),
                Slot::Name { name, file, line } => self.symbols.get(&name)
                    .copied()
                    .ok_or_else(|| sources.in_file(file, AssembleError::UndefinedName { line, name })),
            })
            .collect()
    }
}

fn strip_comment(text: &str) -> &str {
    match text.find("//") {
        Some(comment) => &text[..comment],
        None => text,
    }
}

fn expect_operands(line: usize, instruction: &str, operands: &[&str], expected: usize) -> Result<(), AssembleError> {
    if operands.len() != expected {
        return Err(AssembleError::OperandCount {
            line,
            instruction: instruction.to_string(),
            expected,
            actual: operands.len(),
        });
    }
    Ok(())
}

fn invalid(line: usize, operand: &str) -> AssembleError {
    AssembleError::InvalidOperand { line, operand: operand.to_string() }
}

fn literal(line: usize, operand: &str) -> Result<Cell, AssembleError> {
    let digits = operand.strip_prefix('#').unwrap_or(operand);
    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok().map(|n| n as Cell),
        None => digits.parse().ok(),
    };
    parsed.ok_or_else(|| invalid(line, operand))
}

/// A register number, written either `R3` or `3`.
fn register(line: usize, operand: &str) -> Result<Cell, AssembleError> {
    let digits = operand.strip_prefix(['R', 'r']).unwrap_or(operand);
    match digits.parse() {
        Ok(n @ 1..=8) => Ok(n),
        _ => Err(invalid(line, operand)),
    }
}

/// `Rn` addresses a register (flag 0); anything else is a memory address (flag 1).
fn mov_operand(line: usize, operand: &str) -> Result<(Cell, Cell), AssembleError> {
    if operand.starts_with(['R', 'r']) {
        Ok((0, register(line, operand)?))
    } else {
        Ok((1, literal(line, operand)?))
    }
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    let ch = chars.next()?;
    chars.next().is_none().then_some(ch)
}

#[cfg(test)]
mod test {
    use std::{fs, io};

    use super::{assemble, assemble_file, assemble_with_display_base, AssembleError};

    #[test]
    fn test_basic() {
        assert_eq!(assemble("POT 3\nPOT 4\nADD\nHALT").unwrap(), [0x11, 3, 0x11, 4, 0x09, 0x00]);
        assert_eq!(assemble("pot #0x10 // sixteen\n\nhalt").unwrap(), [0x11, 16, 0x00]);
    }

    #[test]
    fn test_registers() {
        assert_eq!(
            assemble("LOAD R3 #9\nPUSH R3\nPOP R1\nSWAP R1, R2\nMOV R2 0x100\nMOV 0x101 R4").unwrap(),
            [0x03, 9, 0x0B, 3, 0x0C, 1, 0xCF, 1, 2, 0x20, 0, 1, 2, 0x100, 0x20, 1, 0, 0x101, 4],
        );

        assert!(matches!(assemble("PUSH R9"), Err(AssembleError::InvalidOperand { line: 1, .. })));
    }

    #[test]
    fn test_labels_and_vars() {
        let program = assemble("VAR count #2\nPOT count\nLABEL top\nDCR\nPOT @top\nJMP\nCALL top").unwrap();
        assert_eq!(program, [0x11, 2, 0x14, 0x11, 2, 0xDF, 0x11, 2, 0xDE]);

        // Forward references resolve too
        assert_eq!(assemble("POT end\nJMP\nLABEL end\nHALT").unwrap(), [0x11, 3, 0xDF, 0x00]);

        assert_eq!(
            assemble("POT 1\nPOT nowhere"),
            Err(AssembleError::UndefinedName { line: 2, name: "nowhere".to_string() }),
        );
    }

    #[test]
    fn test_wchr() {
        let program = assemble_with_display_base("WCHR V #1 #2 #3 RED", 100).unwrap();
        assert_eq!(program, [
            0x11, 0x17, 0x11, 100, 0xAA,
            0x11, 1, 0x11, 101, 0xAA,
            0x11, 2, 0x11, 102, 0xAA,
            0x11, 3, 0x11, 103, 0xAA,
            0x11, 0xF00, 0x11, 104, 0xAA,
        ]);

        assert!(matches!(assemble("WCHR ! 1 2 3 RED"), Err(AssembleError::UnknownCharacter { .. })));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(assemble("NOPE"), Err(AssembleError::UnknownInstruction { line: 1, .. })));
        assert!(matches!(
            assemble("ADD\nPOT"),
            Err(AssembleError::OperandCount { line: 2, expected: 1, actual: 0, .. }),
        ));
        assert!(matches!(assemble("ADD 4"), Err(AssembleError::OperandCount { .. })));
    }

    #[test]
    fn test_relocated_block() {
        // The block lands after the rest of the file, so execution never falls into it
        let program = assemble("#START\nLABEL data\nPOT 9\n#END\nPOT data\nHALT").unwrap();
        assert_eq!(program, [0x11, 3, 0x00, 0x11, 9]);

        assert_eq!(
            assemble("#START\nPOT 1\n#end\nPOT 2\nPOT x"),
            Err(AssembleError::UndefinedName { line: 5, name: "x".to_string() }),
        );
        assert_eq!(assemble("POT 1\n#END"), Err(AssembleError::UnbalancedBlock { line: 2 }));
        assert_eq!(assemble("#START\nPOT 1"), Err(AssembleError::UnbalancedBlock { line: 1 }));
        assert_eq!(assemble("#START\n#START\n#END"), Err(AssembleError::UnbalancedBlock { line: 2 }));
    }

    #[test]
    fn test_import() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/inner.pmx"), "VAR seven #7\n").unwrap();
        fs::write(dir.path().join("sub/lib.pmx"), "IMPORT \"inner.pmx\"\nLABEL lib_start\nPOT seven\n").unwrap();
        fs::write(dir.path().join("main.pmx"), "POT 1\nIMPORT \"sub/lib.pmx\"\nPOT lib_start\nHALT\n").unwrap();

        // Imported names are shared, and labels count from where the file was inlined
        assert_eq!(
            assemble_file(dir.path().join("main.pmx")).unwrap(),
            [0x11, 1, 0x11, 7, 0x11, 2, 0x00],
        );

        // A relocated block moves to the end of its own file, not of the importer
        fs::write(dir.path().join("data.pmx"), "#START\nLABEL value\nPOT 5\n#END\nPOT value\n").unwrap();
        fs::write(dir.path().join("uses_data.pmx"), "IMPORT \"data.pmx\"\nHALT\n").unwrap();
        assert_eq!(
            assemble_file(dir.path().join("uses_data.pmx")).unwrap(),
            [0x11, 2, 0x11, 5, 0x00],
        );
    }

    #[test]
    fn test_import_errors() {
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(
            assemble_file(dir.path().join("missing.pmx")),
            Err(AssembleError::Read { path: dir.path().join("missing.pmx"), kind: io::ErrorKind::NotFound }),
        );

        fs::write(dir.path().join("main.pmx"), "HALT\nIMPORT \"missing.pmx\"\n").unwrap();
        assert_eq!(
            assemble_file(dir.path().join("main.pmx")),
            Err(AssembleError::Import { line: 2, path: dir.path().join("missing.pmx"), kind: io::ErrorKind::NotFound }),
        );

        // Errors in an imported file name that file
        fs::write(dir.path().join("bad.pmx"), "ADD\nPOT nowhere\n").unwrap();
        fs::write(dir.path().join("main.pmx"), "IMPORT \"bad.pmx\"\n").unwrap();
        assert_eq!(
            assemble_file(dir.path().join("main.pmx")),
            Err(AssembleError::InFile {
                path: dir.path().join("bad.pmx"),
                source: Box::new(AssembleError::UndefinedName { line: 2, name: "nowhere".to_string() }),
            }),
        );

        fs::write(dir.path().join("a.pmx"), "IMPORT \"b.pmx\"\n").unwrap();
        fs::write(dir.path().join("b.pmx"), "ADD\nIMPORT \"a.pmx\"\n").unwrap();
        assert_eq!(
            assemble_file(dir.path().join("a.pmx")),
            Err(AssembleError::InFile {
                path: dir.path().join("b.pmx"),
                source: Box::new(AssembleError::ImportCycle { line: 2, path: dir.path().join("a.pmx") }),
            }),
        );
    }
}
