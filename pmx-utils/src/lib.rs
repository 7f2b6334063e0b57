use std::{fs, io, path::{Path, PathBuf}};

use thiserror::Error;

/// A single program cell, as stored in PMX memory.
pub type Cell = i32;

#[derive(Debug, Error)]
pub enum ProgramFileError {
    #[error("could not read program file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: malformed token `{token}`")]
    MalformedToken { line: usize, token: String },
}

/// Parses PMX program text into the sequence of cells to load at address 0.
///
/// Tokens are separated by commas and newlines. Each token is either a decimal integer or a
/// hexadecimal integer prefixed with `0x`. Empty tokens (blank lines, trailing commas) are skipped.
pub fn parse_program(text: &str) -> Result<Vec<Cell>, ProgramFileError> {
    let mut cells = vec![];

    for (index, line) in text.lines().enumerate() {
        for token in line.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            let cell = parse_token(token).ok_or_else(|| ProgramFileError::MalformedToken {
                line: index + 1,
                token: token.to_string(),
            })?;
            cells.push(cell);
        }
    }

    Ok(cells)
}

/// Reads and parses a program file. See [`parse_program`] for the format.
pub fn read_program_file(path: impl AsRef<Path>) -> Result<Vec<Cell>, ProgramFileError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ProgramFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_program(&text)
}

fn parse_token(token: &str) -> Option<Cell> {
    match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        // Hex tokens may use the full 32 bits, e.g. 0xFFFFFFFF
        Some(hex) => u32::from_str_radix(hex, 16).ok().map(|n| n as Cell),
        None => token.parse().ok(),
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use crate::{parse_program, read_program_file, ProgramFileError};

    #[test]
    fn test_parse() {
        assert_eq!(parse_program("0x11,3,0x11,4,0x09,0x00").unwrap(), vec![0x11, 3, 0x11, 4, 9, 0]);
        assert_eq!(parse_program("1, 2\n3,\n\n-4").unwrap(), vec![1, 2, 3, -4]);
        assert_eq!(parse_program("0xFFF,0x2AD00").unwrap(), vec![0xfff, 0x2ad00]);
    }

    #[test]
    fn test_parse_malformed() {
        let err = parse_program("1,2\n3,banana").unwrap_err();
        match err {
            ProgramFileError::MalformedToken { line, token } => {
                assert_eq!(line, 2);
                assert_eq!(token, "banana");
            }
            other => panic!("unexpected error {other}"),
        }

        assert!(parse_program("0xZZ").is_err());
    }

    #[test]
    fn test_read_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "0x11,3,0x11,4\n0x09,0x00\n").unwrap();

        let cells = read_program_file(file.path()).unwrap();
        assert_eq!(cells, vec![0x11, 3, 0x11, 4, 9, 0]);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_program_file(dir.path().join("missing.rom")).unwrap_err();
        assert!(matches!(err, ProgramFileError::Io { .. }));
    }
}
