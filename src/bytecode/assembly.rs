/*!
  The human readable textual form of a program is called assembly. This module turns
  assembly into a `Program` in two passes, so that a label may be used before the line
  that defines it:

   1. Every line is parsed. Label definitions are recorded at the address of the next
      instruction, and instruction lines advance that address.
   2. Every instruction line is looked up in the architecture table, its operands are
      checked against the declared operand kinds and field ranges, labels are replaced by
      their addresses, and the result is packed into a word.

  A line looks like this, with every part optional:
      ```
      label:  MNEMONIC operand, operand, operand   ; comment
      ```
  Mnemonics are case-insensitive. An operand is a register (`r0`-`r15`), a decimal or
  `0x` hexadecimal number, or a label. Comments start with `;` or `#`.
*/

use std::fmt::{Display, Formatter};

use nom::{
  IResult,
  branch::alt,
  bytes::complete::{tag, take_while, take_while1},
  character::complete::{char as one_char, digit1, hex_digit1, space0, space1},
  combinator::{all_consuming, map, map_res, opt, recognize, rest},
  multi::separated_list,
  sequence::{delimited, pair, preceded, terminated, tuple},
};

use crate::architecture::Architecture;
use crate::bytecode::{Immediate, Instruction, OperandKind, Operation, Program, WORD_BYTES};
use crate::error::{AssemblyError, AssemblyErrorKind};
use crate::register::Register;
use crate::symboltable::SymbolTable;

/// Largest number of instructions whose addresses fit in an immediate.
const MAX_PROGRAM_LENGTH: usize = Immediate::MAX as usize + 1;

#[derive(Clone, Debug, Eq, PartialEq)]
enum Operand<'a> {
  Register(u32),
  Number(i64),
  Label(&'a str),
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Statement<'a> {
  mnemonic : &'a str,
  operands : Vec<Operand<'a>>,
}

// region Parsers

fn identifier(input: &str) -> IResult<&str, &str> {
  recognize(pair(
    take_while1(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '.'),
    take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.'),
  ))(input)
}

fn number(input: &str) -> IResult<&str, i64> {
  map(
    pair(
      opt(one_char('-')),
      alt((
        map_res(
          preceded(alt((tag("0x"), tag("0X"))), hex_digit1),
          |digits: &str| i64::from_str_radix(digits, 16)
        ),
        map_res(digit1, |digits: &str| digits.parse::<i64>()),
      ))
    ),
    |(sign, magnitude)| match sign {
      Some(_) => -magnitude,
      None    => magnitude
    }
  )(input)
}

fn operand(input: &str) -> IResult<&str, Operand<'_>> {
  alt((
    map(number, Operand::Number),
    map(identifier, |name: &str| match Register::parse_index(name) {
      Some(index) => Operand::Register(index),
      None        => Operand::Label(name)
    }),
  ))(input)
}

fn statement(input: &str) -> IResult<&str, Statement<'_>> {
  map(
    pair(
      identifier,
      opt(preceded(
        space1,
        separated_list(delimited(space0, one_char(','), space0), operand)
      ))
    ),
    |(mnemonic, operands)| Statement { mnemonic, operands: operands.unwrap_or_default() }
  )(input)
}

fn comment(input: &str) -> IResult<&str, &str> {
  preceded(alt((one_char(';'), one_char('#'))), rest)(input)
}

/// A whole line: optional label, optional statement, optional comment, nothing else.
fn line(input: &str) -> IResult<&str, (Option<&str>, Option<Statement<'_>>)> {
  all_consuming(
    map(
      tuple((
        space0,
        opt(terminated(identifier, pair(space0, one_char(':')))),
        space0,
        opt(statement),
        space0,
        opt(comment),
      )),
      |(_, label, _, statement, _, _)| (label, statement)
    )
  )(input)
}

// endregion

/// What the assembler has to say about a successful assembly, for display.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AssemblySummary {
  pub instructions : usize,
  pub labels       : usize,
  pub warnings     : Vec<String>,
}

impl Display for AssemblySummary {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    writeln!(
      f,
      "Assembled {} instruction(s) ({} bytes), {} label(s), {} warning(s)",
      self.instructions,
      self.instructions * WORD_BYTES,
      self.labels,
      self.warnings.len()
    )?;
    for warning in &self.warnings {
      writeln!(f, "  warning: {}", warning)?;
    }
    Ok(())
  }
}

pub struct Assembler<'a> {
  architecture: &'a Architecture,
}

impl<'a> Assembler<'a> {

  pub fn new(architecture: &'a Architecture) -> Assembler<'a> {
    Assembler { architecture }
  }

  /// Assembles source text into a program. No partial program is returned on error.
  pub fn assemble(&self, source: &str) -> Result<Program, AssemblyError> {
    self.assemble_with_summary(source).map(|(program, _)| program)
  }

  pub fn assemble_with_summary(&self, source: &str) -> Result<(Program, AssemblySummary), AssemblyError> {
    let mut symbols = SymbolTable::new();

    // Pass 1
    let statements = index_source(source, &mut symbols)?;

    // Pass 2
    let mut instructions = Vec::with_capacity(statements.len());
    for (line_number, statement) in &statements {
      let instruction = self.encode(*line_number, statement, &mut symbols)?;
      log::debug!(
        "{:>4}: 0x{:04x}  0x{:08x}  {}",
        line_number,
        instructions.len(),
        instruction.word(),
        self.architecture.disassemble(&instruction)
      );
      instructions.push(instruction);
    }

    let summary = self.summarize(&instructions, &symbols);
    for warning in &summary.warnings {
      log::warn!("{}", warning);
    }

    Ok((Program::from(instructions), summary))
  }

  fn encode(
    &self,
    line_number: usize,
    statement: &Statement<'_>,
    symbols: &mut SymbolTable
  ) -> Result<Instruction, AssemblyError> {
    let error = |kind| AssemblyError::new(line_number, kind);

    let spec =
      self.architecture
          .lookup_mnemonic(statement.mnemonic)
          .ok_or_else(|| error(AssemblyErrorKind::UnknownMnemonic(statement.mnemonic.to_string())))?;

    if statement.operands.len() != spec.arity() {
      return Err(error(AssemblyErrorKind::WrongOperandCount {
        mnemonic : spec.mnemonic.clone(),
        expected : spec.arity(),
        found    : statement.operands.len()
      }));
    }

    let mut instruction    = Instruction::nullary(spec.opcode);
    let mut registers_seen = 0;

    for (position, (operand, kind)) in statement.operands.iter().zip(spec.operands.iter()).enumerate() {
      match (kind, operand) {

        (OperandKind::Register, Operand::Register(index)) => {
          let register = Register::new(*index).ok_or_else(|| error(AssemblyErrorKind::RegisterOutOfRange(*index)))?;
          match registers_seen {
            0 => instruction.dest = register.field(),
            _ => instruction.src  = register.field(),
          }
          registers_seen += 1;
        }

        (OperandKind::Address, Operand::Label(name)) => {
          let address =
            symbols.resolve(name)
                   .ok_or_else(|| error(AssemblyErrorKind::UndefinedLabel(name.to_string())))?;
          // Pass 1 rejects programs whose addresses do not fit.
          instruction.immediate = address as Immediate;
        }

        (OperandKind::Register, _) | (_, Operand::Register(_)) | (_, Operand::Label(_)) => {
          return Err(error(AssemblyErrorKind::WrongOperandKind {
            mnemonic : spec.mnemonic.clone(),
            position : position + 1,
            expected : *kind
          }));
        }

        (kind, Operand::Number(value)) => {
          instruction.immediate = immediate_field(*kind, *value).map_err(error)?;
        }

      }
    }

    Ok(instruction)
  }

  fn summarize(&self, instructions: &[Instruction], symbols: &SymbolTable) -> AssemblySummary {
    let mut warnings = Vec::new();

    if instructions.is_empty() {
      warnings.push("program is empty".to_string());
    } else {
      let halts = instructions.iter().any(|instruction| {
        self.architecture
            .lookup_opcode(instruction.opcode)
            .map_or(false, |spec| spec.operation == Operation::Hlt)
      });
      if !halts {
        warnings.push("program has no HLT; it stops when execution runs off its end".to_string());
      }
    }

    for (name, symbol) in symbols.unreferenced() {
      warnings.push(format!("label `{}` on line {} is never referenced", name, symbol.line));
    }

    AssemblySummary {
      instructions : instructions.len(),
      labels       : symbols.len(),
      warnings
    }
  }
}

/**
  Pass 1: parses every line, records label addresses, and returns the instruction lines
  with their 1-based line numbers in source order.
*/
fn index_source<'s>(
  source: &'s str,
  symbols: &mut SymbolTable
) -> Result<Vec<(usize, Statement<'s>)>, AssemblyError> {
  let mut statements = Vec::new();

  for (index, text) in source.lines().enumerate() {
    let line_number = index + 1;
    let (label, statement) = match line(text) {
      Ok((_, parsed)) => parsed,
      Err(nom::Err::Error((remaining, _))) | Err(nom::Err::Failure((remaining, _))) => {
        return Err(AssemblyError::new(line_number, AssemblyErrorKind::Syntax(remaining.trim().to_string())));
      }
      Err(nom::Err::Incomplete(_)) => {
        return Err(AssemblyError::new(line_number, AssemblyErrorKind::Syntax(text.trim().to_string())));
      }
    };

    if let Some(label) = label {
      if Register::parse_index(label).is_some() {
        return Err(AssemblyError::new(line_number, AssemblyErrorKind::InvalidLabel(label.to_string())));
      }
      symbols.define(label, statements.len(), line_number).map_err(|first_line| {
        AssemblyError::new(
          line_number,
          AssemblyErrorKind::DuplicateLabel { label: label.to_string(), first_line }
        )
      })?;
    }

    if let Some(statement) = statement {
      if statements.len() == MAX_PROGRAM_LENGTH {
        return Err(AssemblyError::new(line_number, AssemblyErrorKind::ProgramTooLarge));
      }
      statements.push((line_number, statement));
    }
  }

  Ok(statements)
}

/// Range checks a literal against its operand kind and packs it into the immediate field.
fn immediate_field(kind: OperandKind, value: i64) -> Result<Immediate, AssemblyErrorKind> {
  let (min, max) = kind.range();
  match min <= value && value <= max {
    // Negative signed values wrap to their two's complement bit pattern.
    true  => Ok(value as Immediate),
    false => Err(AssemblyErrorKind::ImmediateOutOfRange { kind, value, min, max })
  }
}
