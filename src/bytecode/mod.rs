/*!

  The machine uses a 32 bit little-endian word, and every instruction is exactly one word.
  Programs are word addressed: the address of an instruction is its index in the program.
  The sizes of instruction components are as follows:

    Opcode:     8 bits
    Dest:       4 bits
    Src:        4 bits
    Immediate: 16 bits

  Labels do not appear in the bytecode. They are symbolic names for locations in the
  program that the assembler resolves to addresses before encoding.

  The opcode is a plain byte rather than an enum, because a binary image may contain any
  byte there. Only the architecture table decides which opcodes exist, and the CPU faults
  on the ones that don't.

*/

mod assembly;
mod binary;
mod instruction;
mod program;

pub use assembly::{Assembler, AssemblySummary};
pub use binary::{
  decode_instruction, encode_instruction, program_from_bytes, program_to_bytes,
  Word, WORD_BYTES
};
pub use instruction::{
  Immediate, Instruction, Opcode, OperandKind, Operation, MAX_REGISTER_INDEX, REGISTER_COUNT
};
pub use program::Program;
