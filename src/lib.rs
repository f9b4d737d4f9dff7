/*!
  A small virtual computer. An architecture table defines the instruction set, the
  assembler turns text into a `Program` of packed 32 bit words, and the CPU executes it
  on its own thread while a renderer watches through a pair of channels.
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod architecture;
pub mod bridge;
pub mod bytecode;
pub mod console;
pub mod cpu;
pub mod error;
pub mod interrupt;
pub mod register;
pub mod symboltable;
mod table;

pub use crate::architecture::Architecture;
pub use crate::bytecode::{Assembler, AssemblySummary, Instruction, Program};
pub use crate::cpu::{Cpu, EngineConfig, RunSummary, Status};
