//! A register name with some convenience functions for parsing and display.

use std::fmt::{Display, Formatter};

use crate::bytecode::MAX_REGISTER_INDEX;

/// `CALL` stores the return address here and `RET` jumps back through it.
pub const LINK_REGISTER: Register = Register(MAX_REGISTER_INDEX);

/// One of the general purpose registers `r0` through `r15`.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct Register(u8);

impl Register {
  /// `None` if the index is past the end of the register file.
  pub fn new(index: u32) -> Option<Register> {
    match index <= MAX_REGISTER_INDEX as u32 {
      true  => Some(Register(index as u8)),
      false => None
    }
  }

  /// Register fields are four bits wide, so any decoded field names a register.
  pub fn from_field(field: u8) -> Register {
    Register(field & MAX_REGISTER_INDEX)
  }

  /// Converts the register to an index into the register file.
  pub fn idx(&self) -> usize {
    self.0 as usize
  }

  pub fn field(&self) -> u8 {
    self.0
  }

  /**
    Recognizes register syntax, `r` or `R` followed by decimal digits, and returns the
    number written. The number is not range checked, so `r16` gives `Some(16)`; indices
    too large for a `u32` saturate.
  */
  pub fn parse_index(text: &str) -> Option<u32> {
    let digits = text.strip_prefix('r').or_else(|| text.strip_prefix('R'))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
      return None;
    }
    Some(digits.parse::<u32>().unwrap_or(u32::MAX))
  }
}

impl Display for Register {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "r{}", self.0)
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_register_syntax() {
    assert_eq!(Register::parse_index("r0"), Some(0));
    assert_eq!(Register::parse_index("R15"), Some(15));
    assert_eq!(Register::parse_index("r16"), Some(16));
    assert_eq!(Register::parse_index("r"), None);
    assert_eq!(Register::parse_index("return"), None);
    assert_eq!(Register::parse_index("loop"), None);
  }

  #[test]
  fn rejects_indices_past_the_file() {
    assert_eq!(Register::new(15).map(|r| r.idx()), Some(15));
    assert_eq!(Register::new(16), None);
    assert_eq!(LINK_REGISTER.to_string(), "r15");
  }
}
