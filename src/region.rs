use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A region of bytes to be placed into memory starting at address 0
pub trait Region {
  fn instructions(&self) -> &[u8];
}

/// A `Chunk` is a single program image that our virtual machine may load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
  instructions: Vec<u8>,
}

impl Chunk {
  /// Read and parse a program file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoadError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| match source.kind() {
      io::ErrorKind::NotFound => LoadError::FileNotFound(path.to_path_buf()),
      _ => LoadError::Io {
        path: path.to_path_buf(),
        source,
      },
    })?;
    let chunk = source.parse()?;
    tracing::debug!(path = %path.display(), "parsed program");
    Ok(chunk)
  }

  pub fn len(&self) -> usize {
    self.instructions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instructions.is_empty()
  }
}

impl From<Vec<u8>> for Chunk {
  fn from(instructions: Vec<u8>) -> Self {
    Self { instructions }
  }
}

impl Region for Chunk {
  fn instructions(&self) -> &[u8] {
    &self.instructions
  }
}

/// Parses the text program format: one binary literal per line, with
/// anything after a `#` ignored and blank lines skipped.
impl FromStr for Chunk {
  type Err = LoadError;

  fn from_str(source: &str) -> Result<Self, Self::Err> {
    let mut instructions = Vec::new();
    for (index, line) in source.lines().enumerate() {
      let code = line.split('#').next().unwrap_or_default().trim();
      if code.is_empty() {
        continue;
      }
      let byte = u8::from_str_radix(code, 2).map_err(|_| LoadError::Malformed {
        line: index + 1,
        text: code.to_owned(),
      })?;
      instructions.push(byte);
    }
    Ok(instructions.into())
  }
}

/// An error that occurred while reading a program
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
  #[error("{} not found", .0.display())]
  FileNotFound(PathBuf),

  #[error("could not read {}: {source}", .path.display())]
  Io { path: PathBuf, source: io::Error },

  #[error("line {line}: `{text}` is not a binary byte")]
  Malformed { line: usize, text: String },
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::io::Write;

  #[test]
  fn parse_strips_comments_and_blanks() {
    let source = "\
# print8
10000010 # LDI R0,8
00000000

00001000
01000111 # PRN R0
00000000
   # trailing comment only
00000001 # HLT
";
    let chunk: Chunk = source.parse().unwrap();
    assert_eq!(
      chunk.instructions(),
      &[0b1000_0010, 0, 8, 0b0100_0111, 0, 0b0000_0001]
    );
  }

  #[test]
  fn parse_empty() {
    let chunk: Chunk = "\n# nothing here\n\n".parse().unwrap();
    assert!(chunk.is_empty());
  }

  #[test]
  fn parse_malformed() {
    let err = "00000001\n0000002 # not binary\n".parse::<Chunk>().unwrap_err();
    assert!(matches!(
      err,
      LoadError::Malformed { line: 2, ref text } if text == "0000002"
    ));
  }

  #[test]
  fn parse_overflowing_literal() {
    // nine bits doesn't fit in a cell
    let err = "100000000".parse::<Chunk>().unwrap_err();
    assert!(matches!(err, LoadError::Malformed { line: 1, .. }));
  }

  #[test]
  fn from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "10000010 # LDI").unwrap();
    writeln!(file, "00000001").unwrap();
    writeln!(file, "00000010").unwrap();
    let chunk = Chunk::from_file(file.path()).unwrap();
    assert_eq!(chunk.instructions(), &[0b1000_0010, 1, 2]);
  }

  #[test]
  fn from_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.ls8");
    let err = Chunk::from_file(&missing).unwrap_err();
    assert!(matches!(err, LoadError::FileNotFound(ref path) if *path == missing));
    assert!(err.to_string().ends_with("missing.ls8 not found"));
  }
}
