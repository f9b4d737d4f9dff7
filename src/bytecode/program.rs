use std::path::Path;

use super::{binary, Instruction};
use crate::error::ImageError;

/// An ordered, read-only sequence of instructions. The CPU executes a `Program` and its
/// length bounds every control-flow target.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Program {
  instructions: Vec<Instruction>,
}

impl Program {
  pub fn len(&self) -> usize {
    self.instructions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instructions.is_empty()
  }

  pub fn get(&self, address: usize) -> Option<&Instruction> {
    self.instructions.get(address)
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
    self.instructions.iter()
  }

  pub fn instructions(&self) -> &[Instruction] {
    &self.instructions
  }

  /// Loads a persisted binary image. Read failures and truncated words carry the path.
  pub fn read_image<P: AsRef<Path>>(path: P) -> Result<Program, ImageError> {
    binary::read_image(path.as_ref())
  }

  pub fn write_image<P: AsRef<Path>>(&self, path: P) -> Result<(), ImageError> {
    binary::write_image(self, path.as_ref())
  }
}

impl From<Vec<Instruction>> for Program {
  fn from(instructions: Vec<Instruction>) -> Program {
    Program { instructions }
  }
}

impl<'a> IntoIterator for &'a Program {
  type Item = &'a Instruction;
  type IntoIter = std::slice::Iter<'a, Instruction>;

  fn into_iter(self) -> Self::IntoIter {
    self.instructions.iter()
  }
}
