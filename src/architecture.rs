/*!
  The instruction architecture table: the single authoritative mapping between mnemonics,
  opcodes, operand kinds, and the operations the CPU executes.

  The table is built once from a definition source, checked for consistency, and never
  changes afterwards. The assembler and the CPU both borrow the same `Architecture`, so
  there is exactly one place where the instruction set is defined.
*/

use std::str::FromStr;

use bimap::BiMap;
use prettytable::Table;

use crate::bytecode::{Instruction, Opcode, OperandKind, Operation};
use crate::error::ArchitectureError;
use crate::register::Register;
use crate::table::TABLE_DISPLAY_FORMAT;

use crate::bytecode::OperandKind::{Address as A, Register as R, Signed as S, Unsigned as U};

/// One record of the definition source.
#[derive(Clone, Copy, Debug)]
pub struct Definition {
  pub mnemonic    : &'static str,
  pub opcode      : Opcode,
  pub operands    : &'static [OperandKind],
  pub name        : &'static str,
  pub description : &'static str,
}

impl Definition {
  pub const fn new(
    mnemonic    : &'static str,
    opcode      : Opcode,
    operands    : &'static [OperandKind],
    name        : &'static str,
    description : &'static str,
  ) -> Definition {
    Definition { mnemonic, opcode, operands, name, description }
  }
}

/// The built-in definition source. Table order is display order.
pub static DEFINITIONS: &[Definition] = &[
  Definition::new("NOP",  0x00, &[],        "No operation",           "Does nothing for one cycle"),
  Definition::new("HLT",  0x01, &[],        "Halt",                   "Stops the CPU"),
  Definition::new("MOV",  0x10, &[R, R],    "Move",                   "rd = rs"),
  Definition::new("LDI",  0x11, &[R, U],    "Load immediate",         "rd = imm"),
  Definition::new("LD",   0x12, &[R, R, S], "Load",                   "rd = mem[rs + simm]"),
  Definition::new("ST",   0x13, &[R, R, S], "Store",                  "mem[rd + simm] = rs"),
  Definition::new("ADD",  0x20, &[R, R],    "Add",                    "rd = rd + rs, sets Z and C"),
  Definition::new("ADDI", 0x21, &[R, S],    "Add immediate",          "rd = rd + simm, sets Z and C"),
  Definition::new("SUB",  0x22, &[R, R],    "Subtract",               "rd = rd - rs, sets Z and C (borrow)"),
  Definition::new("MUL",  0x23, &[R, R],    "Multiply",               "rd = rd * rs, sets Z and C (overflow)"),
  Definition::new("DIV",  0x24, &[R, R],    "Divide",                 "rd = rd / rs, faults if rs is zero"),
  Definition::new("MOD",  0x25, &[R, R],    "Modulo",                 "rd = rd % rs, faults if rs is zero"),
  Definition::new("AND",  0x30, &[R, R],    "Bitwise and",            "rd = rd & rs"),
  Definition::new("OR",   0x31, &[R, R],    "Bitwise or",             "rd = rd | rs"),
  Definition::new("XOR",  0x32, &[R, R],    "Bitwise exclusive or",   "rd = rd ^ rs"),
  Definition::new("NOT",  0x33, &[R],       "Bitwise not",            "rd = !rd"),
  Definition::new("SHL",  0x34, &[R, U],    "Shift left",             "rd = rd << imm, C = last bit out"),
  Definition::new("SHR",  0x35, &[R, U],    "Shift right",            "rd = rd >> imm, C = last bit out"),
  Definition::new("CMP",  0x40, &[R, R],    "Compare",                "Sets Z and C from rd - rs"),
  Definition::new("JMP",  0x50, &[A],       "Jump",                   "pc = addr"),
  Definition::new("JZ",   0x51, &[A],       "Jump if zero",           "pc = addr if Z"),
  Definition::new("JNZ",  0x52, &[A],       "Jump if not zero",       "pc = addr unless Z"),
  Definition::new("JC",   0x53, &[A],       "Jump if carry",          "pc = addr if C"),
  Definition::new("JNC",  0x54, &[A],       "Jump if not carry",      "pc = addr unless C"),
  Definition::new("CALL", 0x58, &[A],       "Call",                   "r15 = pc + 1, pc = addr"),
  Definition::new("RET",  0x59, &[],        "Return",                 "pc = r15"),
  Definition::new("IN",   0x60, &[R],       "Input",                  "rd = next input event"),
  Definition::new("OUT",  0x61, &[R],       "Output",                 "Sends rd to the renderer"),
];

/// Everything the assembler and the CPU need to know about one instruction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstructionSpec {
  pub mnemonic    : String,
  pub opcode      : Opcode,
  pub operands    : Vec<OperandKind>,
  pub operation   : Operation,
  pub name        : String,
  pub description : String,
}

impl InstructionSpec {
  pub fn arity(&self) -> usize {
    self.operands.len()
  }
}

pub struct Architecture {
  instructions : Vec<InstructionSpec>,
  // Mnemonic <-> opcode
  index        : BiMap<String, Opcode>,
  // Opcode -> position in `instructions`, for decoding
  decode_table : Vec<Option<usize>>,
}

impl Architecture {

  /// Builds the table from the built-in definition source.
  pub fn load() -> Result<Architecture, ArchitectureError> {
    let architecture = Architecture::from_definitions(DEFINITIONS)?;
    log::debug!("Loaded architecture with {} instructions", architecture.instructions.len());
    Ok(architecture)
  }

  /**
    Builds and checks a table. Every definition must have a mnemonic and a name, a unique
    mnemonic (compared case-insensitively) and a unique opcode, an operand list that fits
    the instruction word, and a mnemonic the CPU knows how to execute at that opcode.
  */
  pub fn from_definitions(definitions: &[Definition]) -> Result<Architecture, ArchitectureError> {
    let mut instructions = Vec::with_capacity(definitions.len());
    let mut index        = BiMap::new();
    let mut decode_table = vec![None; Opcode::MAX as usize + 1];

    for definition in definitions {
      let opcode   = definition.opcode;
      let mnemonic = definition.mnemonic.trim().to_ascii_uppercase();

      if mnemonic.is_empty() {
        return Err(ArchitectureError::MissingField { opcode, field: "mnemonic" });
      }
      if definition.name.trim().is_empty() {
        return Err(ArchitectureError::MissingField { opcode, field: "name" });
      }
      if index.contains_left(&mnemonic) {
        return Err(ArchitectureError::DuplicateMnemonic { mnemonic });
      }
      if let Err((second, opcode)) = index.insert_no_overwrite(mnemonic.clone(), opcode) {
        let first = index.get_by_right(&opcode).cloned().unwrap_or_default();
        return Err(ArchitectureError::DuplicateOpcode { opcode, first, second });
      }

      check_operand_layout(&mnemonic, opcode, definition.operands)?;
      let operation =
        Operation::from_str(&mnemonic)
          .map_err(|_| ArchitectureError::UnknownOperation { mnemonic: mnemonic.clone() })?;
      if operation.code() != opcode {
        return Err(ArchitectureError::OpcodeMismatch {
          mnemonic,
          declared: opcode,
          expected: operation.code()
        });
      }
      if definition.operands != operation.operands() {
        return Err(ArchitectureError::OperandMismatch {
          mnemonic,
          declared: definition.operands.to_vec(),
          expected: operation.operands().to_vec()
        });
      }

      decode_table[opcode as usize] = Some(instructions.len());
      instructions.push(InstructionSpec {
        mnemonic,
        opcode,
        operands    : definition.operands.to_vec(),
        operation,
        name        : definition.name.to_string(),
        description : definition.description.to_string(),
      });
    }

    Ok(Architecture { instructions, index, decode_table })
  }

  // region Lookup

  /// Case-insensitive lookup by mnemonic.
  pub fn lookup_mnemonic(&self, mnemonic: &str) -> Option<&InstructionSpec> {
    let opcode = self.index.get_by_left(&mnemonic.trim().to_ascii_uppercase())?;
    self.lookup_opcode(*opcode)
  }

  pub fn lookup_opcode(&self, opcode: Opcode) -> Option<&InstructionSpec> {
    self.decode_table[opcode as usize].map(|position| &self.instructions[position])
  }

  /// All instructions in table order.
  pub fn all(&self) -> &[InstructionSpec] {
    &self.instructions
  }

  // endregion

  // region Display methods

  /// The instruction set as a table, for display.
  pub fn instructions_s(&self) -> String {
    let mut table = Table::new();
    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubl->"Mnemonic", ubr->"Opcode", ubl->"Operands", ubl->"Name", ubl->"Description"]);

    for spec in &self.instructions {
      let operands =
        spec.operands
            .iter()
            .map(OperandKind::abbreviation)
            .collect::<Vec<&str>>()
            .join(", ");
      table.add_row(row![
        spec.mnemonic,
        r->format!("0x{:02x}", spec.opcode),
        operands,
        spec.name,
        spec.description
      ]);
    }

    format!("Instructions:\n\n{}", table)
  }

  /**
    Renders a human-readable form of an instruction from the table and the instruction's
    fields alone, e.g. `LDI  r1, 42` or `JNZ  0x0003`. Instructions whose opcode is not in
    the table render as the raw word.
  */
  pub fn disassemble(&self, instruction: &Instruction) -> String {
    let spec = match self.lookup_opcode(instruction.opcode) {
      Some(spec) => spec,
      None       => {
        return format!("???  0x{:08x} (unknown opcode 0x{:02x})", instruction.word(), instruction.opcode);
      }
    };

    let mut register_fields = vec![instruction.dest, instruction.src].into_iter();
    let operands =
      spec.operands
          .iter()
          .map(|kind| match kind {
            OperandKind::Register => Register::from_field(register_fields.next().unwrap_or_default()).to_string(),
            OperandKind::Unsigned => instruction.immediate.to_string(),
            OperandKind::Signed   => instruction.signed_immediate().to_string(),
            OperandKind::Address  => format!("0x{:04x}", instruction.immediate),
          })
          .collect::<Vec<String>>();

    match operands.is_empty() {
      true  => spec.mnemonic.clone(),
      false => format!("{:<4} {}", spec.mnemonic, operands.join(", "))
    }
  }

  // endregion
}

/// At most two register operands (`dest`, `src`) and one immediate operand fit in a word.
fn check_operand_layout(
  mnemonic: &str,
  opcode: Opcode,
  operands: &[OperandKind]
) -> Result<(), ArchitectureError> {
  let registers  = operands.iter().filter(|kind| **kind == OperandKind::Register).count();
  let immediates = operands.len() - registers;
  match registers <= 2 && immediates <= 1 {
    true  => Ok(()),
    false => Err(ArchitectureError::OperandLayout { mnemonic: mnemonic.to_string(), opcode })
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builtin_table_loads() {
    let architecture = Architecture::load().expect("built-in definitions are consistent");
    assert_eq!(architecture.all().len(), DEFINITIONS.len());
  }

  #[test]
  fn opcodes_and_mnemonics_are_unique() {
    let architecture = Architecture::load().expect("built-in definitions are consistent");
    let mut opcodes: Vec<Opcode> = architecture.all().iter().map(|spec| spec.opcode).collect();
    let mut mnemonics: Vec<&str> = architecture.all().iter().map(|spec| spec.mnemonic.as_str()).collect();
    opcodes.sort();
    opcodes.dedup();
    mnemonics.sort();
    mnemonics.dedup();

    assert_eq!(opcodes.len(), DEFINITIONS.len());
    assert_eq!(mnemonics.len(), DEFINITIONS.len());
  }

  #[test]
  fn lookup_both_ways() {
    let architecture = Architecture::load().expect("built-in definitions are consistent");

    let add = architecture.lookup_mnemonic("add").expect("ADD exists");
    assert_eq!(add.opcode, 0x20);
    assert_eq!(add.operation, Operation::Add);
    assert_eq!(architecture.lookup_opcode(0x20), Some(add));
    assert_eq!(architecture.lookup_opcode(0xFF), None);
    assert_eq!(architecture.lookup_mnemonic("FROB"), None);
  }

  #[test]
  fn duplicate_opcode_is_fatal() {
    let definitions = [
      Definition::new("ADD", 0x20, &[R, R], "Add", ""),
      Definition::new("SUB", 0x20, &[R, R], "Subtract", ""),
    ];
    assert_eq!(
      Architecture::from_definitions(&definitions).err(),
      Some(ArchitectureError::DuplicateOpcode {
        opcode: 0x20,
        first: "ADD".to_string(),
        second: "SUB".to_string()
      })
    );
  }

  #[test]
  fn duplicate_mnemonic_is_fatal_regardless_of_case() {
    let definitions = [
      Definition::new("ADD", 0x20, &[R, R], "Add", ""),
      Definition::new("add", 0x22, &[R, R], "Add again", ""),
    ];
    assert_eq!(
      Architecture::from_definitions(&definitions).err(),
      Some(ArchitectureError::DuplicateMnemonic { mnemonic: "ADD".to_string() })
    );
  }

  #[test]
  fn missing_fields_are_fatal() {
    let no_mnemonic = [Definition::new("  ", 0x00, &[], "Nothing", "")];
    let no_name     = [Definition::new("NOP", 0x00, &[], "", "")];

    assert_eq!(
      Architecture::from_definitions(&no_mnemonic).err(),
      Some(ArchitectureError::MissingField { opcode: 0x00, field: "mnemonic" })
    );
    assert_eq!(
      Architecture::from_definitions(&no_name).err(),
      Some(ArchitectureError::MissingField { opcode: 0x00, field: "name" })
    );
  }

  #[test]
  fn definitions_must_agree_with_the_cpu() {
    let unknown  = [Definition::new("FROB", 0x70, &[], "Frobnicate", "")];
    let misplaced = [Definition::new("HLT", 0x02, &[], "Halt", "")];

    assert_eq!(
      Architecture::from_definitions(&unknown).err(),
      Some(ArchitectureError::UnknownOperation { mnemonic: "FROB".to_string() })
    );
    assert_eq!(
      Architecture::from_definitions(&misplaced).err(),
      Some(ArchitectureError::OpcodeMismatch { mnemonic: "HLT".to_string(), declared: 0x02, expected: 0x01 })
    );
  }

  #[test]
  fn operand_kinds_must_match_what_the_cpu_reads() {
    let unsigned_offset = [Definition::new("LD",  0x12, &[R, R, U], "Load", "")];
    let missing_source  = [Definition::new("ADD", 0x20, &[R],       "Add",  "")];

    assert_eq!(
      Architecture::from_definitions(&unsigned_offset).err(),
      Some(ArchitectureError::OperandMismatch {
        mnemonic : "LD".to_string(),
        declared : vec![R, R, U],
        expected : vec![R, R, S],
      })
    );
    assert!(matches!(
      Architecture::from_definitions(&missing_source),
      Err(ArchitectureError::OperandMismatch { .. })
    ));

    for spec in Architecture::load().expect("built-in definitions are consistent").all() {
      assert_eq!(spec.operands, spec.operation.operands());
    }
  }

  #[test]
  fn disassembles_from_fields_alone() {
    let architecture = Architecture::load().expect("built-in definitions are consistent");

    assert_eq!(architecture.disassemble(&Instruction::nullary(0x01)), "HLT");
    assert_eq!(architecture.disassemble(&Instruction::new(0x11, 1, 0, 42)), "LDI  r1, 42");
    assert_eq!(architecture.disassemble(&Instruction::new(0x12, 2, 3, 0xFFFE)), "LD   r2, r3, -2");
    assert_eq!(architecture.disassemble(&Instruction::new(0x52, 0, 0, 3)), "JNZ  0x0003");
    assert!(architecture.disassemble(&Instruction::nullary(0xEE)).starts_with("???"));
  }

  #[test]
  fn listing_names_every_instruction() {
    let architecture = Architecture::load().expect("built-in definitions are consistent");
    let listing = architecture.instructions_s();
    for spec in architecture.all() {
      assert!(listing.contains(&spec.name));
    }
  }
}
