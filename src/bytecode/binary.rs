/*!
  This module is responsible for the encoding and decoding of binary instructions and of
  the flat binary images programs are persisted as.

*/
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use super::{Instruction, Program};
use crate::error::ImageError;

// If you change this you must also change `encode_instruction` and `decode_instruction`.
pub type Word = u32;
pub const WORD_BYTES: usize = 4;

const OPCODE_MASK    : Word = 0xFF;
const REGISTER_MASK  : Word = 0xF;
const DEST_SHIFT     : u32  = 8;
const SRC_SHIFT      : u32  = 12;
const IMMEDIATE_SHIFT: u32  = 16;

/**
  Packs the instruction into a single word:
      ```
      [Immediate:16][Src:4][Dest:4][Opcode:8]
      ```
  Register fields wider than four bits are truncated. The assembler never produces them.
*/
pub fn encode_instruction(instruction: &Instruction) -> Word {
  debug_assert!(instruction.dest as Word <= REGISTER_MASK && instruction.src as Word <= REGISTER_MASK);

  ( instruction.opcode                    as Word                     ) |
  (((instruction.dest as Word) & REGISTER_MASK) << DEST_SHIFT        ) |
  (((instruction.src  as Word) & REGISTER_MASK) << SRC_SHIFT         ) |
  ( (instruction.immediate                as Word) << IMMEDIATE_SHIFT)
}

/// Unpacks a word. Every word decodes; whether the opcode exists is the CPU's concern.
pub fn decode_instruction(word: Word) -> Instruction {
  Instruction {
    opcode    : (word & OPCODE_MASK) as u8,
    dest      : ((word >> DEST_SHIFT) & REGISTER_MASK) as u8,
    src       : ((word >> SRC_SHIFT) & REGISTER_MASK) as u8,
    immediate : (word >> IMMEDIATE_SHIFT) as u16,
  }
}

/// Serializes a program as consecutive little-endian words.
pub fn program_to_bytes(program: &Program) -> Vec<u8> {
  let mut bytes = Vec::with_capacity(program.len() * WORD_BYTES);
  for instruction in program.iter() {
    bytes.extend_from_slice(&encode_instruction(instruction).to_le_bytes());
  }
  bytes
}

/**
  Deserializes a program from consecutive little-endian words. There is no header and no
  length prefix, so the end of the buffer is the end of the program.

  On a trailing partial word, returns the number of bytes left over.
*/
pub fn program_from_bytes(bytes: &[u8]) -> Result<Program, usize> {
  let chunks = bytes.chunks_exact(WORD_BYTES);
  let trailing = chunks.remainder().len();
  if trailing != 0 {
    return Err(trailing);
  }

  let instructions =
    chunks.map(|chunk| {
            let mut word = [0u8; WORD_BYTES];
            word.copy_from_slice(chunk);
            decode_instruction(Word::from_le_bytes(word))
          })
          .collect::<Vec<Instruction>>();

  Ok(Program::from(instructions))
}

pub fn read_image(path: &Path) -> Result<Program, ImageError> {
  let mut bytes = Vec::new();
  File::open(path)
    .and_then(|mut file| file.read_to_end(&mut bytes))
    .map_err(|source| ImageError::Read { path: path.to_path_buf(), source })?;

  program_from_bytes(&bytes).map_err(|trailing| {
    ImageError::Truncated { path: path.to_path_buf(), trailing }
  })
}

pub fn write_image(program: &Program, path: &Path) -> Result<(), ImageError> {
  let write = || -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(&program_to_bytes(program))?;
    out.flush()
  };

  write().map_err(|source| ImageError::Write { path: path.to_path_buf(), source })
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn packs_fields_into_their_bit_ranges() {
    let instruction = Instruction::new(0x05, 0xA, 0x3, 0x00FF);
    let word = encode_instruction(&instruction);

    assert_eq!(word, 0x00FF_3A05);
    assert_eq!(decode_instruction(word), instruction);
  }

  #[test]
  fn extreme_fields_survive_packing() {
    for instruction in &[
      Instruction::new(0x00, 0x0, 0x0, 0x0000),
      Instruction::new(0xFF, 0xF, 0xF, 0xFFFF),
      Instruction::new(0x80, 0x1, 0xE, 0x8000),
    ] {
      assert_eq!(decode_instruction(encode_instruction(instruction)), *instruction);
    }
  }

  #[test]
  fn words_are_little_endian_on_disk() {
    let program = Program::from(vec![Instruction::new(0x11, 0x2, 0x0, 0x1234)]);
    assert_eq!(program_to_bytes(&program), vec![0x11, 0x02, 0x34, 0x12]);
  }

  #[test]
  fn trailing_partial_word_is_rejected() {
    assert_eq!(program_from_bytes(&[0x01, 0x00, 0x00, 0x00, 0xAA, 0xBB]).err(), Some(2));
  }

  #[test]
  fn empty_buffer_is_an_empty_program() {
    let program = program_from_bytes(&[]).ok().map(|p| p.len());
    assert_eq!(program, Some(0));
  }
}
