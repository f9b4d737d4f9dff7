//! The CPU execution engine: machine state and the fetch-decode-execute loop.

use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use prettytable::{Cell, Row, Table};

use crate::architecture::Architecture;
use crate::bridge::{EngineEvent, EngineSender, InputEvent, InputReceiver};
use crate::bytecode::{Instruction, Operation, Program, REGISTER_COUNT};
use crate::error::{CpuError, Fault};
use crate::interrupt::Interrupt;
use crate::register::{Register, LINK_REGISTER};
use crate::table::{make_register_table, TABLE_DISPLAY_FORMAT};

pub const DEFAULT_MEMORY_WORDS: usize = 4096;
/// Memory is addressed by 16 bit values.
pub const MAX_MEMORY_WORDS: usize = 1 << 16;
const MEMORY_ROW_WORDS: usize = 8;

/// Tunables of the engine. The command line maps onto these.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EngineConfig {
  /// Size of data memory in 16 bit words.
  pub memory_words      : usize,
  /// Send a state snapshot to the renderer every this many cycles. Zero disables snapshots.
  pub snapshot_interval : u64,
}

impl Default for EngineConfig {
  fn default() -> EngineConfig {
    EngineConfig {
      memory_words      : DEFAULT_MEMORY_WORDS,
      snapshot_interval : 1,
    }
  }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Flags {
  pub halted : bool,
  pub zero   : bool,
  pub carry  : bool,
}

impl Display for Flags {
  // Upper case means set: `[H z C]`
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let flag = |set: bool, name: char| match set {
      true  => name.to_ascii_uppercase(),
      false => name
    };
    write!(f, "[{} {} {}]", flag(self.halted, 'h'), flag(self.zero, 'z'), flag(self.carry, 'c'))
  }
}

/// Everything the CPU can change. Observers only ever get copies of it.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct MachineState {
  pub registers : [u16; REGISTER_COUNT],
  pub memory    : Vec<u16>,
  pub pc        : usize,
  pub flags     : Flags,
  /// Instructions completed so far.
  pub cycles    : u64,
}

impl MachineState {
  pub fn new(memory_words: usize) -> MachineState {
    MachineState {
      registers : [0; REGISTER_COUNT],
      memory    : vec![0; memory_words],
      pc        : 0,
      flags     : Flags::default(),
      cycles    : 0,
    }
  }

  pub fn register(&self, register: Register) -> u16 {
    self.registers[register.idx()]
  }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Status {
  Ready,
  Running,
  Halted,
  Faulted(Fault),
}

impl Status {
  /// Halted and Faulted never execute another instruction.
  pub fn is_terminal(&self) -> bool {
    match self {
      Status::Halted | Status::Faulted(_) => true,
      _                                   => false
    }
  }
}

impl Display for Status {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Status::Ready          => write!(f, "Ready"),
      Status::Running        => write!(f, "Running"),
      Status::Halted         => write!(f, "Halted"),
      Status::Faulted(fault) => write!(f, "Faulted ({})", fault),
    }
  }
}

/// What `run` reports back to its caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunSummary {
  pub status      : Status,
  pub cycles      : u64,
  /// The run was stopped by an interrupt request rather than by the program.
  pub interrupted : bool,
}

impl Display for RunSummary {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self.interrupted {
      true  => write!(f, "Interrupted after {} cycle(s)", self.cycles),
      false => write!(f, "{} after {} cycle(s)", self.status, self.cycles)
    }
  }
}

/// A point-in-time copy of the machine for postmortem display.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CoreDump {
  pub status      : Status,
  pub state       : MachineState,
  /// Disassembly of the instruction at `pc`, if `pc` is inside the program.
  pub instruction : Option<String>,
}

impl Display for CoreDump {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let state = &self.state;

    writeln!(
      f,
      "Core dump: {}, pc = 0x{:04x} ({}), {} cycle(s), flags {}",
      self.status,
      state.pc,
      self.instruction.as_deref().unwrap_or("outside program"),
      state.cycles,
      state.flags
    )?;

    let half = REGISTER_COUNT / 2;
    let values =
      state.registers
           .iter()
           .map(|value| format!("0x{:04x} {:>5}", value, value))
           .collect::<Vec<String>>();
    let low  = make_register_table("r", &values[..half], None);
    let mut high = make_register_table("r", &values[half..], None);
    // The second table counts from r8.
    for (row, index) in high.row_iter_mut().zip(half..) {
      if let Some(cell) = row.get_mut_cell(0) {
        *cell = Cell::new(&format!("r{} =", index)).style_spec("r");
      }
    }

    let mut registers = table!([low, high]);
    registers.set_format(*TABLE_DISPLAY_FORMAT);
    writeln!(f, "{}", registers)?;

    write!(f, "Memory ({} words):\n{}", state.memory.len(), memory_table(&state.memory))
  }
}

/// Rows of `MEMORY_ROW_WORDS` words, skipping rows that are entirely zero.
fn memory_table(memory: &[u16]) -> Table {
  let mut table = Table::new();
  table.set_format(*TABLE_DISPLAY_FORMAT);

  let mut titles = vec![Cell::new("Address").style_spec("ubr")];
  titles.extend((0..MEMORY_ROW_WORDS).map(|offset| Cell::new(&format!("+{}", offset)).style_spec("ub")));
  table.set_titles(Row::new(titles));

  for (row_index, words) in memory.chunks(MEMORY_ROW_WORDS).enumerate() {
    if words.iter().all(|word| *word == 0) {
      continue;
    }
    let mut cells = vec![Cell::new(&format!("0x{:04x}", row_index * MEMORY_ROW_WORDS)).style_spec("r")];
    cells.extend(words.iter().map(|word| Cell::new(&format!("{:04x}", word))));
    table.add_row(Row::new(cells));
  }

  if table.is_empty() {
    table.add_row(row![r->"*", "all zero"]);
  }
  table
}

/// Where the program counter goes after an instruction.
enum Flow {
  Next,
  Jump(usize),
  Halt,
}

pub struct Cpu<'a> {
  architecture    : &'a Architecture,
  config          : EngineConfig,
  state           : MachineState,
  program         : Program,
  status          : Status,

  // Bridge to the renderer, absent when running headless.
  renderer_output : Option<EngineSender>,
  renderer_input  : Option<InputReceiver>,

  interrupt       : Option<Interrupt>,
}

impl<'a> Cpu<'a> {

  // region Setup

  pub fn new(architecture: &'a Architecture, config: EngineConfig) -> Cpu<'a> {
    let memory_words = config.memory_words.min(MAX_MEMORY_WORDS);
    Cpu {
      architecture,
      config,
      state           : MachineState::new(memory_words),
      program         : Program::default(),
      status          : Status::Ready,
      renderer_output : None,
      renderer_input  : None,
      interrupt       : None,
    }
  }

  pub fn load_instructions(&mut self, program: Program) -> Result<(), CpuError> {
    if self.status != Status::Ready {
      return Err(CpuError::NotReady(self.status.to_string()));
    }
    log::debug!("Loaded {} instruction(s)", program.len());
    self.program  = program;
    self.state.pc = 0;
    Ok(())
  }

  pub fn set_renderer_output(&mut self, sender: EngineSender) {
    self.renderer_output = Some(sender);
  }

  pub fn set_renderer_input(&mut self, receiver: InputReceiver) {
    self.renderer_input = Some(receiver);
  }

  pub fn set_interrupt(&mut self, interrupt: Interrupt) {
    self.interrupt = Some(interrupt);
  }

  // endregion

  // region Inspection

  pub fn status(&self) -> &Status {
    &self.status
  }

  pub fn snapshot(&self) -> MachineState {
    self.state.clone()
  }

  /// Disassembles an instruction. Needs nothing but the architecture table.
  pub fn gen_debug_instruction_string(&self, instruction: &Instruction) -> String {
    self.architecture.disassemble(instruction)
  }

  /// Copies the machine state without touching it. Safe to call at any point between cycles.
  pub fn dump_core(&self) -> CoreDump {
    CoreDump {
      status      : self.status.clone(),
      state       : self.state.clone(),
      instruction : self.program.get(self.state.pc).map(|i| self.architecture.disassemble(i)),
    }
  }

  // endregion

  // region Execution

  /**
    Runs until the program halts or faults, or until an interrupt is requested. Both bridge
    channels are closed before returning.
  */
  pub fn run(&mut self) -> RunSummary {
    if self.status == Status::Ready {
      log::info!("Running {} instruction(s)", self.program.len());
      self.status = Status::Running;
    }

    let mut interrupted = false;
    while !self.status.is_terminal() {
      if self.interrupt.as_ref().map_or(false, Interrupt::requested) {
        log::warn!("Interrupt requested at pc = 0x{:04x}", self.state.pc);
        let dump = self.dump_core().to_string();
        if let Some(interrupt) = &self.interrupt {
          interrupt.deliver(dump);
        }
        interrupted = true;
        break;
      }
      self.step();
    }

    self.close_bridge();
    RunSummary {
      status : self.status.clone(),
      cycles : self.state.cycles,
      interrupted
    }
  }

  /// Performs one fetch-decode-execute cycle. Does nothing once the CPU has stopped.
  pub fn step(&mut self) -> &Status {
    match self.status {
      Status::Ready   => self.status = Status::Running,
      Status::Running => {}
      _               => return &self.status,
    }

    // Fetch
    let pc = self.state.pc;
    let instruction = match self.program.get(pc) {
      Some(instruction) => *instruction,
      None              => {
        log::info!("Program counter 0x{:04x} is past the end of the program", pc);
        self.halt();
        return &self.status;
      }
    };

    // Decode
    let operation = match self.architecture.lookup_opcode(instruction.opcode) {
      Some(spec) => spec.operation,
      None       => {
        self.fault(Fault::UnknownOpcode { pc, opcode: instruction.opcode });
        return &self.status;
      }
    };
    log::debug!("0x{:04x}  {}", pc, self.architecture.disassemble(&instruction));

    // Execute
    match self.execute(operation, &instruction) {

      Ok(flow) => {
        self.state.cycles += 1;
        match flow {
          Flow::Next         => self.state.pc = pc + 1,
          Flow::Jump(target) => self.state.pc = target,
          Flow::Halt         => self.halt(),
        }

        #[cfg(feature = "trace_execution")]
        println!("{}", self.dump_core());

        let interval = self.config.snapshot_interval;
        if self.status == Status::Running
            && interval > 0
            && self.state.cycles % interval == 0
            && self.renderer_output.is_some()
        {
          self.publish(EngineEvent::Snapshot(Box::new(self.state.clone())));
        }
      }

      Err(fault) => self.fault(fault),

    }

    &self.status
  }

  fn execute(&mut self, operation: Operation, instruction: &Instruction) -> Result<Flow, Fault> {
    let pc     = self.state.pc;
    let dest   = Register::from_field(instruction.dest).idx();
    let src    = Register::from_field(instruction.src).idx();
    let rd     = self.state.registers[dest];
    let rs     = self.state.registers[src];
    let target = instruction.immediate as usize;
    let offset = match operation.has_signed_immediate() {
      true  => instruction.signed_immediate() as i64,
      false => instruction.immediate as i64
    };

    match operation {

      Operation::Nop => {}

      Operation::Hlt => return Ok(Flow::Halt),

      // region Data movement

      Operation::Mov => self.state.registers[dest] = rs,

      Operation::Ldi => self.state.registers[dest] = instruction.immediate,

      Operation::Ld  => {
        let address = self.effective_address(rs, offset)?;
        self.state.registers[dest] = self.state.memory[address];
      }

      Operation::St  => {
        let address = self.effective_address(rd, offset)?;
        self.state.memory[address] = rs;
      }

      // endregion

      // region Arithmetic

      Operation::Add  => self.write_result(dest, rd.overflowing_add(rs)),

      // The immediate is added as its 16 bit pattern, so carry is the adder's carry out.
      Operation::Addi => self.write_result(dest, rd.overflowing_add(instruction.immediate)),

      Operation::Sub  => self.write_result(dest, rd.overflowing_sub(rs)),

      Operation::Mul  => self.write_result(dest, rd.overflowing_mul(rs)),

      Operation::Div  => {
        let quotient = rd.checked_div(rs).ok_or(Fault::DivideByZero { pc })?;
        self.write_result(dest, (quotient, false));
      }

      Operation::Mod  => {
        let remainder = rd.checked_rem(rs).ok_or(Fault::DivideByZero { pc })?;
        self.write_result(dest, (remainder, false));
      }

      // endregion

      // region Logic

      Operation::And => self.write_result(dest, (rd & rs, false)),
      Operation::Or  => self.write_result(dest, (rd | rs, false)),
      Operation::Xor => self.write_result(dest, (rd ^ rs, false)),
      Operation::Not => self.write_result(dest, (!rd, false)),
      Operation::Shl => self.write_result(dest, shift_left(rd, instruction.immediate)),
      Operation::Shr => self.write_result(dest, shift_right(rd, instruction.immediate)),

      Operation::Cmp => {
        let (difference, borrow) = rd.overflowing_sub(rs);
        self.set_flags(difference, borrow);
      }

      // endregion

      // region Control flow

      Operation::Jmp => return Ok(Flow::Jump(target)),

      Operation::Jz  if  self.state.flags.zero  => return Ok(Flow::Jump(target)),
      Operation::Jnz if !self.state.flags.zero  => return Ok(Flow::Jump(target)),
      Operation::Jc  if  self.state.flags.carry => return Ok(Flow::Jump(target)),
      Operation::Jnc if !self.state.flags.carry => return Ok(Flow::Jump(target)),
      Operation::Jz | Operation::Jnz | Operation::Jc | Operation::Jnc => {}

      Operation::Call => {
        // Return addresses are 16 bit like every other address.
        let link = u16::try_from(pc + 1).map_err(|_| Fault::ReturnAddressOutOfRange { pc })?;
        self.state.registers[LINK_REGISTER.idx()] = link;
        return Ok(Flow::Jump(target));
      }

      Operation::Ret => return Ok(Flow::Jump(self.state.register(LINK_REGISTER) as usize)),

      // endregion

      // region Peripherals

      Operation::In  => self.state.registers[dest] = self.read_input(),

      Operation::Out => match self.renderer_output.is_some() {
        true  => self.publish(EngineEvent::Output(rd)),
        false => log::info!("OUT {}", rd),
      },

      // endregion
    }

    Ok(Flow::Next)
  }

  // endregion

  // region Low-level utility methods

  /// `base + offset`, checked against the size of memory.
  fn effective_address(&self, base: u16, offset: i64) -> Result<usize, Fault> {
    let address = base as i64 + offset;
    match address >= 0 && (address as usize) < self.state.memory.len() {
      true  => Ok(address as usize),
      false => Err(Fault::MemoryOutOfRange { pc: self.state.pc, address })
    }
  }

  fn write_result(&mut self, dest: usize, (value, carry): (u16, bool)) {
    self.state.registers[dest] = value;
    self.set_flags(value, carry);
  }

  fn set_flags(&mut self, value: u16, carry: bool) {
    self.state.flags.zero  = value == 0;
    self.state.flags.carry = carry;
  }

  /// Blocks until the renderer sends input. Without a renderer, or once it has closed its
  /// side, input reads as zero.
  fn read_input(&mut self) -> u16 {
    if self.renderer_input.is_none() {
      log::warn!("IN at 0x{:04x} with no renderer attached; reading 0", self.state.pc);
      return 0;
    }

    self.publish(EngineEvent::InputRequested);
    match self.renderer_input.as_ref().and_then(|receiver| receiver.recv()) {
      Some(InputEvent::Value(value)) => value,
      None                           => {
        log::warn!("Renderer closed its input channel; reading 0");
        self.renderer_input = None;
        0
      }
    }
  }

  /// Sends an event to the renderer if there is one. A renderer that hung up is dropped.
  fn publish(&mut self, event: EngineEvent) {
    let disconnected = match &self.renderer_output {
      Some(sender) => sender.send(event).is_err(),
      None         => false
    };
    if disconnected {
      log::warn!("Renderer hung up; continuing headless");
      self.renderer_output = None;
    }
  }

  fn halt(&mut self) {
    self.state.flags.halted = true;
    self.status = Status::Halted;
    log::info!("Halted at 0x{:04x} after {} cycle(s)", self.state.pc, self.state.cycles);

    if self.renderer_output.is_some() {
      self.publish(EngineEvent::Halted(Box::new(self.state.clone())));
    }
  }

  fn fault(&mut self, fault: Fault) {
    self.status = Status::Faulted(fault);
    log::error!("Faulted after {} cycle(s): {}", self.state.cycles, fault);

    if self.renderer_output.is_some() {
      self.publish(EngineEvent::Faulted(fault, Box::new(self.state.clone())));
    }
  }

  fn close_bridge(&mut self) {
    if let Some(sender) = self.renderer_output.take() {
      sender.close();
    }
    if let Some(receiver) = self.renderer_input.take() {
      receiver.close();
    }
  }

  // endregion
}

/// Shifts left, carrying out the last bit shifted past bit 15.
fn shift_left(value: u16, amount: u16) -> (u16, bool) {
  match amount {
    0            => (value, false),
    1..=15       => (value << amount, (value >> (16 - amount)) & 1 == 1),
    16           => (0, value & 1 == 1),
    _            => (0, false),
  }
}

/// Shifts right, carrying out the last bit shifted past bit 0.
fn shift_right(value: u16, amount: u16) -> (u16, bool) {
  match amount {
    0            => (value, false),
    1..=16       => (value.checked_shr(amount as u32).unwrap_or(0), (value >> (amount - 1)) & 1 == 1),
    _            => (0, false),
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::Assembler;

  fn architecture() -> Architecture {
    Architecture::load().expect("built-in definitions are consistent")
  }

  /// Assembles and runs `source` headless, returning the final state and summary.
  fn run(architecture: &Architecture, source: &str) -> (MachineState, RunSummary) {
    let program = Assembler::new(architecture).assemble(source).expect("assembles");
    let mut cpu = Cpu::new(architecture, EngineConfig::default());
    cpu.load_instructions(program).expect("cpu is ready");
    let summary = cpu.run();
    (cpu.snapshot(), summary)
  }

  #[test]
  fn halt_alone_takes_one_cycle() {
    let architecture = architecture();
    let mut cpu = Cpu::new(&architecture, EngineConfig::default());
    cpu.load_instructions(Program::from(vec![Instruction::nullary(0x01)])).expect("cpu is ready");
    assert_eq!(*cpu.status(), Status::Ready);

    assert_eq!(*cpu.step(), Status::Halted);
    let state = cpu.snapshot();
    assert_eq!(state.cycles, 1);
    assert_eq!(state.registers, [0; REGISTER_COUNT]);
    assert!(state.flags.halted);
  }

  #[test]
  fn unknown_opcode_faults_before_anything_else_runs() {
    let architecture = architecture();
    let mut cpu = Cpu::new(&architecture, EngineConfig::default());
    cpu.load_instructions(Program::from(vec![
      Instruction::nullary(0xFF),
      Instruction::new(0x11, 1, 0, 7),
    ])).expect("cpu is ready");

    let summary = cpu.run();
    assert_eq!(summary.status, Status::Faulted(Fault::UnknownOpcode { pc: 0, opcode: 0xFF }));
    assert_eq!(summary.cycles, 0);
    assert_eq!(cpu.snapshot().registers[1], 0);
  }

  #[test]
  fn terminal_states_execute_nothing_more() {
    let architecture = architecture();
    let mut cpu = Cpu::new(&architecture, EngineConfig::default());
    cpu.load_instructions(Program::from(vec![Instruction::nullary(0x01)])).expect("cpu is ready");
    cpu.run();

    assert_eq!(*cpu.step(), Status::Halted);
    assert_eq!(cpu.snapshot().cycles, 1);
    assert!(cpu.load_instructions(Program::default()).is_err());
  }

  #[test]
  fn running_off_the_end_halts() {
    let (state, summary) = run(&architecture(), "LDI r1, 5\nLDI r2, 6");
    assert_eq!(summary.status, Status::Halted);
    assert_eq!(summary.cycles, 2);
    assert_eq!(state.pc, 2);
    assert_eq!(&state.registers[1..3], &[5, 6]);
  }

  #[test]
  fn arithmetic_sets_zero_and_carry() {
    let architecture = architecture();

    let (state, _) = run(&architecture, "LDI r1, 0xFFFF\nLDI r2, 1\nADD r1, r2\nHLT");
    assert_eq!(state.registers[1], 0);
    assert!(state.flags.zero && state.flags.carry);

    let (state, _) = run(&architecture, "LDI r1, 3\nLDI r2, 5\nSUB r1, r2\nHLT");
    assert_eq!(state.registers[1], 0xFFFE);
    assert!(!state.flags.zero && state.flags.carry);

    let (state, _) = run(&architecture, "LDI r1, 10\nADDI r1, -4\nLDI r2, 3\nMUL r1, r2\nHLT");
    assert_eq!(state.registers[1], 18);
  }

  #[test]
  fn division_by_zero_faults() {
    let (_, summary) = run(&architecture(), "LDI r1, 10\nDIV r1, r2\nHLT");
    assert_eq!(summary.status, Status::Faulted(Fault::DivideByZero { pc: 1 }));
    assert_eq!(summary.cycles, 1);
  }

  #[test]
  fn memory_round_trip_and_bounds() {
    let architecture = architecture();

    let (state, _) = run(&architecture, "LDI r1, 100\nLDI r2, 42\nST r1, r2, 4\nLD r3, r1, 4\nHLT");
    assert_eq!(state.memory[104], 42);
    assert_eq!(state.registers[3], 42);

    let (_, summary) = run(&architecture, "LDI r1, 4096\nLD r2, r1, 0\nHLT");
    assert_eq!(summary.status, Status::Faulted(Fault::MemoryOutOfRange { pc: 1, address: 4096 }));

    let (_, summary) = run(&architecture, "LD r2, r0, -1\nHLT");
    assert_eq!(summary.status, Status::Faulted(Fault::MemoryOutOfRange { pc: 0, address: -1 }));
  }

  #[test]
  fn conditional_jumps_follow_flags() {
    let source = "
            LDI  r1, 5
            LDI  r2, 0
      loop: ADDI r2, 2
            ADDI r1, -1
            JNZ  loop
            HLT
    ";
    let (state, summary) = run(&architecture(), source);
    assert_eq!(summary.status, Status::Halted);
    assert_eq!(state.registers[2], 10);
  }

  #[test]
  fn call_and_return_through_the_link_register() {
    let source = "
              CALL double
              HLT
      double: LDI  r1, 21
              ADD  r1, r1
              RET
    ";
    let (state, summary) = run(&architecture(), source);
    assert_eq!(summary.status, Status::Halted);
    assert_eq!(state.registers[1], 42);
    assert_eq!(state.register(LINK_REGISTER), 1);
    assert_eq!(state.pc, 1);
  }

  #[test]
  fn call_from_the_last_addressable_word_faults() {
    let architecture = architecture();
    let last = u16::MAX;

    // JMP to the top of the address space, where a CALL has nowhere to return to.
    let mut instructions = vec![Instruction::nullary(0x00); last as usize + 2];
    instructions[0]                 = Instruction::new(0x50, 0, 0, last);
    instructions[last as usize]     = Instruction::new(0x58, 0, 0, 2);
    instructions[2]                 = Instruction::nullary(0x59);
    instructions[last as usize + 1] = Instruction::nullary(0x01);

    let mut cpu = Cpu::new(&architecture, EngineConfig::default());
    cpu.load_instructions(Program::from(instructions)).expect("cpu is ready");
    let summary = cpu.run();

    assert_eq!(summary.status, Status::Faulted(Fault::ReturnAddressOutOfRange { pc: last as usize }));
    assert_eq!(summary.cycles, 1);
    assert_eq!(cpu.snapshot().register(LINK_REGISTER), 0);
  }

  #[test]
  fn shifts_carry_the_last_bit_out() {
    assert_eq!(shift_left(0x8001, 1), (0x0002, true));
    assert_eq!(shift_right(0x0003, 1), (0x0001, true));
    assert_eq!(shift_left(0x0001, 16), (0, true));
    assert_eq!(shift_right(0x8000, 16), (0, true));
    assert_eq!(shift_right(0xFFFF, 17), (0, false));
  }

  #[test]
  fn headless_input_reads_zero() {
    let (state, summary) = run(&architecture(), "LDI r1, 9\nIN r1\nOUT r1\nHLT");
    assert_eq!(summary.status, Status::Halted);
    assert_eq!(state.registers[1], 0);
  }

  #[test]
  fn interrupt_stops_at_an_instruction_boundary() {
    let architecture = architecture();
    let program = Assembler::new(&architecture).assemble("spin: JMP spin").expect("assembles");
    let (interrupt, handle) = Interrupt::new();

    let mut cpu = Cpu::new(&architecture, EngineConfig::default());
    cpu.load_instructions(program).expect("cpu is ready");
    cpu.set_interrupt(interrupt);
    handle.request();

    let summary = cpu.run();
    assert!(summary.interrupted);
    assert_eq!(summary.status, Status::Running);

    let dump = handle.wait_for_dump(std::time::Duration::from_millis(100)).expect("dump delivered");
    assert!(dump.contains("pc = 0x0000"));
  }

  #[test]
  fn core_dump_shows_registers_and_touched_memory() {
    let architecture = architecture();
    let program = Assembler::new(&architecture).assemble("LDI r9, 0xBEEF\nST r0, r9, 17\nHLT").expect("assembles");
    let mut cpu = Cpu::new(&architecture, EngineConfig::default());
    cpu.load_instructions(program).expect("cpu is ready");
    cpu.run();

    let dump = cpu.dump_core();
    assert_eq!(dump.state.registers[9], 0xBEEF);
    assert_eq!(dump.instruction.as_deref(), Some("HLT"));

    let text = dump.to_string();
    assert!(text.contains("Halted"));
    assert!(text.contains("r9 ="));
    assert!(text.contains("0xbeef"));
    assert!(text.contains("0x0010"));
    assert!(text.contains("beef"));
  }
}
