//! Error types for every stage of the machine: building the architecture table, assembling,
//! reading and writing binary images, and faults raised while executing.

use std::path::PathBuf;

use thiserror::Error;

use crate::bytecode::{Opcode, OperandKind};

/// The architecture definition source is inconsistent. Fatal before anything runs.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ArchitectureError {
  #[error("opcode 0x{opcode:02x} is defined by both {first} and {second}")]
  DuplicateOpcode { opcode: Opcode, first: String, second: String },

  #[error("mnemonic {mnemonic} is defined twice")]
  DuplicateMnemonic { mnemonic: String },

  #[error("definition for opcode 0x{opcode:02x} is missing its {field}")]
  MissingField { opcode: Opcode, field: &'static str },

  #[error("mnemonic {mnemonic} has no operation the CPU can execute")]
  UnknownOperation { mnemonic: String },

  #[error("operands of {mnemonic} (0x{opcode:02x}) do not fit in one instruction word")]
  OperandLayout { mnemonic: String, opcode: Opcode },

  #[error("{mnemonic} is declared with opcode 0x{declared:02x} but executes as 0x{expected:02x}")]
  OpcodeMismatch { mnemonic: String, declared: Opcode, expected: Opcode },

  #[error("{mnemonic} is declared with operands {declared:?} but the CPU reads {expected:?}")]
  OperandMismatch { mnemonic: String, declared: Vec<OperandKind>, expected: Vec<OperandKind> },
}

/// Why a source line could not be assembled.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum AssemblyErrorKind {
  #[error("unknown mnemonic `{0}`")]
  UnknownMnemonic(String),

  #[error("{mnemonic} takes {expected} operand(s) but was given {found}")]
  WrongOperandCount { mnemonic: String, expected: usize, found: usize },

  #[error("operand {position} of {mnemonic} must be a {expected}")]
  WrongOperandKind { mnemonic: String, position: usize, expected: OperandKind },

  #[error("register r{0} does not exist (registers are r0 to r15)")]
  RegisterOutOfRange(u32),

  #[error("{kind} {value} is out of range {min}..={max}")]
  ImmediateOutOfRange { kind: OperandKind, value: i64, min: i64, max: i64 },

  #[error("undefined label `{0}`")]
  UndefinedLabel(String),

  #[error("label `{label}` is already defined on line {first_line}")]
  DuplicateLabel { label: String, first_line: usize },

  #[error("`{0}` names a register and cannot be used as a label")]
  InvalidLabel(String),

  #[error("program does not fit in a 16 bit address space")]
  ProgramTooLarge,

  #[error("syntax error near `{0}`")]
  Syntax(String),
}

/// An assembly failure together with the 1-based source line it was detected on.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("line {line}: {kind}")]
pub struct AssemblyError {
  pub line : usize,
  pub kind : AssemblyErrorKind,
}

impl AssemblyError {
  pub fn new(line: usize, kind: AssemblyErrorKind) -> AssemblyError {
    AssemblyError { line, kind }
  }
}

/// Reading or writing a binary image failed.
#[derive(Error, Debug)]
pub enum ImageError {
  #[error("failed to read {}: {source}", .path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("failed to write {}: {source}", .path.display())]
  Write { path: PathBuf, source: std::io::Error },

  #[error("{} ends with a truncated word ({trailing} trailing byte(s))", .path.display())]
  Truncated { path: PathBuf, trailing: usize },
}

/// A fault stops execution for good. `pc` is the address of the offending instruction.
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum Fault {
  #[error("unknown opcode 0x{opcode:02x} at 0x{pc:04x}")]
  UnknownOpcode { pc: usize, opcode: Opcode },

  #[error("memory address {address} out of range at 0x{pc:04x}")]
  MemoryOutOfRange { pc: usize, address: i64 },

  #[error("division by zero at 0x{pc:04x}")]
  DivideByZero { pc: usize },

  #[error("CALL at 0x{pc:x} has no 16 bit return address")]
  ReturnAddressOutOfRange { pc: usize },
}

/// Misuse of the CPU's lifecycle.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum CpuError {
  #[error("a program can only be loaded while the CPU is ready, but it is {0}")]
  NotReady(String),
}
