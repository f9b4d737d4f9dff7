//! A plain text renderer: prints `OUT` values, prompts for `IN` values, and shows the final state.

use std::io::{BufRead, Write};

use crate::bridge::{EngineEvent, EngineReceiver, InputEvent, InputSender};
use crate::cpu::MachineState;

/// How the renderer left its loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RenderOutcome {
  /// The CPU closed the bridge.
  Closed,
  /// Input ran out while the CPU was waiting on `IN`. The input channel is closed.
  InputExhausted,
}

pub struct ConsoleRenderer<R, W> {
  input  : R,
  output : W,
}

impl<R: BufRead, W: Write> ConsoleRenderer<R, W> {
  pub fn new(input: R, output: W) -> ConsoleRenderer<R, W> {
    ConsoleRenderer { input, output }
  }

  /**
    Consumes engine events until the CPU closes its side. Each `InputRequested` reads one
    line and sends it back as a value; lines that are not a 16 bit number are asked for
    again. Dropping `replies` when input runs out makes further `IN`s read zero.
  */
  pub fn run(&mut self, events: EngineReceiver, replies: InputSender) -> std::io::Result<RenderOutcome> {
    let mut replies = Some(replies);
    let mut outcome = RenderOutcome::Closed;

    for event in events {
      match event {

        EngineEvent::Output(value) => writeln!(self.output, "{}", value)?,

        EngineEvent::InputRequested => {
          let sender = match &replies {
            Some(sender) => sender,
            None         => continue,
          };
          match self.prompt()? {
            Some(value) => {
              if sender.send(InputEvent::Value(value)).is_err() {
                log::debug!("CPU stopped listening for input");
              }
            }
            None        => {
              log::warn!("Input exhausted; further IN instructions read 0");
              if let Some(sender) = replies.take() {
                sender.close();
              }
              outcome = RenderOutcome::InputExhausted;
            }
          }
        }

        EngineEvent::Snapshot(state) => {
          log::trace!("pc = 0x{:04x} cycles = {} flags {}", state.pc, state.cycles, state.flags);
        }

        EngineEvent::Halted(state) => {
          writeln!(self.output, "Halted after {} cycle(s).", state.cycles)?;
          self.show_registers(&state)?;
        }

        EngineEvent::Faulted(fault, state) => {
          writeln!(self.output, "Fault: {}", fault)?;
          self.show_registers(&state)?;
        }

      } // end match event
      self.output.flush()?;
    }

    Ok(outcome)
  }

  /// `None` at end of input.
  fn prompt(&mut self) -> std::io::Result<Option<u16>> {
    let mut line = String::new();
    loop {
      write!(self.output, "in> ")?;
      self.output.flush()?;

      line.clear();
      if self.input.read_line(&mut line)? == 0 {
        return Ok(None);
      }
      match parse_value(line.trim()) {
        Some(value) => return Ok(Some(value)),
        None        => writeln!(self.output, "expected a number from 0 to 65535 or -32768 to -1")?,
      }
    }
  }

  fn show_registers(&mut self, state: &MachineState) -> std::io::Result<()> {
    let registers =
      state.registers
           .iter()
           .enumerate()
           .map(|(index, value)| format!("r{}={}", index, value))
           .collect::<Vec<String>>()
           .join(" ");
    writeln!(self.output, "pc=0x{:04x} flags {}\n{}", state.pc, state.flags, registers)
  }
}

/// Accepts unsigned values and negative values as their two's complement bit pattern.
fn parse_value(text: &str) -> Option<u16> {
  let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
    Some(hex) => i64::from_str_radix(hex, 16).ok()?,
    None      => text.parse::<i64>().ok()?,
  };
  match value {
    0..=0xFFFF      => Some(value as u16),
    -0x8000..=-1    => Some(value as i16 as u16),
    _               => None,
  }
}


#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use super::*;
  use crate::bridge::Bridge;

  #[test]
  fn parses_decimal_hex_and_negative_input() {
    assert_eq!(parse_value("42"), Some(42));
    assert_eq!(parse_value("0xFFFF"), Some(0xFFFF));
    assert_eq!(parse_value("-1"), Some(0xFFFF));
    assert_eq!(parse_value("65536"), None);
    assert_eq!(parse_value("seven"), None);
  }

  #[test]
  fn answers_input_requests_and_prints_output() {
    let bridge = Bridge::new(None);
    let events = vec![
      EngineEvent::InputRequested,
      EngineEvent::Output(7),
      EngineEvent::Halted(Box::new(MachineState::new(8))),
    ];
    for event in events {
      bridge.engine_events.send(event).expect("renderer side alive");
    }
    bridge.engine_events.close();

    let mut printed = Vec::new();
    let outcome = ConsoleRenderer::new(Cursor::new("nope\n12\n"), &mut printed)
      .run(bridge.render_events, bridge.render_input)
      .expect("writes to a Vec succeed");

    assert_eq!(outcome, RenderOutcome::Closed);
    assert_eq!(bridge.engine_input.try_recv(), Some(InputEvent::Value(12)));

    let printed = String::from_utf8(printed).expect("utf-8");
    assert!(printed.contains("expected a number"));
    assert!(printed.contains("in> 7\n"));
    assert!(printed.contains("Halted after 0 cycle(s)."));
  }

  #[test]
  fn end_of_input_closes_the_input_channel() {
    let bridge = Bridge::new(None);
    bridge.engine_events.send(EngineEvent::InputRequested).expect("renderer side alive");
    bridge.engine_events.close();

    let outcome = ConsoleRenderer::new(Cursor::new(""), Vec::new())
      .run(bridge.render_events, bridge.render_input)
      .expect("writes to a Vec succeed");

    assert_eq!(outcome, RenderOutcome::InputExhausted);
    assert_eq!(bridge.engine_input.recv(), None);
  }
}
