use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, EnumString};
use num_enum::IntoPrimitive;

use super::Word;

pub type Opcode = u8;
pub type Immediate = u16;

/// Number of general purpose registers. Register fields are four bits wide, so every
/// decoded register index is in range.
pub const REGISTER_COUNT: usize = 16;
pub const MAX_REGISTER_INDEX: u8 = (REGISTER_COUNT - 1) as u8;

/**
  Semantics of the machine, one variant per operation the CPU knows how to execute.

  The variant names serialize to the mnemonics of the architecture definition source, and
  the discriminants are the opcodes that source must declare for them. The architecture
  table checks both when it is built, so the assembler and the CPU cannot drift apart.

  Opcodes are grouped by their high nibble:
      ```
      0x0_  machine control
      0x1_  data movement
      0x2_  arithmetic
      0x3_  logic and shifts
      0x4_  comparison
      0x5_  control flow
      0x6_  peripherals
      ```
*/
#[derive(
  StrumDisplay, EnumString, IntoPrimitive,
  Clone,        Copy,       Eq,            PartialEq, Debug, Hash
)]
#[strum(serialize_all = "shouty_snake_case")]
#[repr(u8)]
pub enum Operation {
  // Machine control //
  Nop  = 0x00,  // nop
  Hlt  = 0x01,  // hlt

  // Data movement //
  Mov  = 0x10,  // mov( rd, rs )
  Ldi  = 0x11,  // ldi( rd, imm )
  Ld   = 0x12,  // ld( rd, rs, offset )
  St   = 0x13,  // st( rd, rs, offset )

  // Arithmetic //
  Add  = 0x20,  // add( rd, rs )
  Addi = 0x21,  // addi( rd, imm )
  Sub  = 0x22,  // sub( rd, rs )
  Mul  = 0x23,  // mul( rd, rs )
  Div  = 0x24,  // div( rd, rs )
  Mod  = 0x25,  // mod( rd, rs )

  // Logic //
  And  = 0x30,  // and( rd, rs )
  Or   = 0x31,  // or( rd, rs )
  Xor  = 0x32,  // xor( rd, rs )
  Not  = 0x33,  // not( rd )
  Shl  = 0x34,  // shl( rd, amount )
  Shr  = 0x35,  // shr( rd, amount )

  // Comparison //
  Cmp  = 0x40,  // cmp( rd, rs )

  // Control flow //
  Jmp  = 0x50,  // jmp( address )
  Jz   = 0x51,  // jz( address )
  Jnz  = 0x52,  // jnz( address )
  Jc   = 0x53,  // jc( address )
  Jnc  = 0x54,  // jnc( address )
  Call = 0x58,  // call( address )
  Ret  = 0x59,  // ret

  // Peripherals //
  In   = 0x60,  // in( rd )
  Out  = 0x61,  // out( rd )
}

impl Operation {
  pub fn code(&self) -> Opcode {
    Into::<u8>::into(*self)
  }

  /// Whether the immediate field of this operation is read as a two's complement value.
  pub fn has_signed_immediate(&self) -> bool {
    match self {
      Operation::Addi | Operation::Ld | Operation::St => true,
      _                                               => false
    }
  }

  /// The operands the CPU reads for this operation, in assembly order.
  pub fn operands(&self) -> &'static [OperandKind] {
    use OperandKind::{Address as A, Register as R, Signed as S, Unsigned as U};

    match self {
      Operation::Nop | Operation::Hlt | Operation::Ret => &[],

      Operation::Ld  | Operation::St  => &[R, R, S],
      Operation::Ldi | Operation::Shl | Operation::Shr => &[R, U],
      Operation::Addi                 => &[R, S],

      Operation::Mov | Operation::Add | Operation::Sub | Operation::Mul | Operation::Div
      | Operation::Mod | Operation::And | Operation::Or | Operation::Xor | Operation::Cmp => &[R, R],

      Operation::Not | Operation::In  | Operation::Out => &[R],

      Operation::Jmp | Operation::Jz  | Operation::Jnz | Operation::Jc | Operation::Jnc
      | Operation::Call => &[A],
    }
  }
}

/**
  The kind of an operand decides how it is written in assembly and which field of the
  instruction word it is packed into. The first `Register` operand of an instruction goes
  into `dest`, the second into `src`. Every other kind goes into `immediate`.
*/
#[derive(StrumDisplay, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum OperandKind {
  #[strum(to_string = "register")]
  Register,
  #[strum(to_string = "unsigned immediate")]
  Unsigned,
  #[strum(to_string = "signed immediate")]
  Signed,
  #[strum(to_string = "address")]
  Address,
}

impl OperandKind {
  /// Inclusive range of literal values the assembler accepts for this operand.
  pub fn range(&self) -> (i64, i64) {
    match self {
      OperandKind::Register => (0, MAX_REGISTER_INDEX as i64),
      OperandKind::Signed   => (i16::MIN as i64, i16::MAX as i64),
      OperandKind::Unsigned
      | OperandKind::Address => (0, Immediate::MAX as i64),
    }
  }

  /// Short form used in the instruction set listing.
  pub fn abbreviation(&self) -> &'static str {
    match self {
      OperandKind::Register => "reg",
      OperandKind::Unsigned => "imm",
      OperandKind::Signed   => "simm",
      OperandKind::Address  => "addr",
    }
  }
}

/**
  One machine instruction with its fields unpacked. The in-memory form is the same
  four fields the word carries:
      ```
      [Immediate:16][Src:4][Dest:4][Opcode:8]
      ```
  Nothing here checks `opcode` against the architecture. That happens when the CPU
  decodes the instruction.
*/
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct Instruction {
  pub opcode    : Opcode,
  pub dest      : u8,
  pub src       : u8,
  pub immediate : Immediate,
}

impl Instruction {
  pub fn new(opcode: Opcode, dest: u8, src: u8, immediate: Immediate) -> Instruction {
    Instruction { opcode, dest, src, immediate }
  }

  /// An instruction that only carries an opcode.
  pub fn nullary(opcode: Opcode) -> Instruction {
    Instruction { opcode, ..Instruction::default() }
  }

  /// The immediate field reinterpreted as two's complement.
  pub fn signed_immediate(&self) -> i16 {
    self.immediate as i16
  }

  pub fn word(&self) -> Word {
    super::encode_instruction(self)
  }
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "[op=0x{:02x} dest={} src={} imm=0x{:04x}]",
      self.opcode, self.dest, self.src, self.immediate
    )
  }
}
