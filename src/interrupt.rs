/*!
  Asynchronous termination. A Ctrl-C asks the CPU to stop; the CPU notices at its next
  instruction boundary, hands over a core dump, and the process exits with
  `INTERRUPT_EXIT_STATUS`.

  The dump is always taken by the CPU's own thread between two instructions, so it is
  never a torn read. It is best effort: if the CPU is blocked (waiting on `IN`, or on a
  full renderer channel) and does not reach a boundary within the timeout, the process
  exits without one.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::bridge::{self, MessageReceiver, MessageSender};

/// Conventional status for a process ended by SIGINT.
pub const INTERRUPT_EXIT_STATUS: i32 = 130;

/// The CPU's side: polled every cycle.
pub struct Interrupt {
  requested : Arc<AtomicBool>,
  dumps     : MessageSender<String>,
}

/// The handler's side: raises the request and collects the dump.
pub struct InterruptHandle {
  requested : Arc<AtomicBool>,
  dumps     : MessageReceiver<String>,
}

impl Interrupt {
  pub fn new() -> (Interrupt, InterruptHandle) {
    let requested       = Arc::new(AtomicBool::new(false));
    let (sender, receiver) = bridge::channel(Some(1));
    (
      Interrupt       { requested: requested.clone(), dumps: sender },
      InterruptHandle { requested,                    dumps: receiver },
    )
  }

  pub fn requested(&self) -> bool {
    self.requested.load(Ordering::SeqCst)
  }

  /// Hands the core dump to whoever requested the interrupt.
  pub fn deliver(&self, dump: String) {
    if self.dumps.send(dump).is_err() {
      log::warn!("Interrupt handler is gone; core dump dropped");
    }
  }
}

impl InterruptHandle {
  pub fn request(&self) {
    self.requested.store(true, Ordering::SeqCst);
  }

  pub fn wait_for_dump(&self, timeout: Duration) -> Option<String> {
    self.dumps.recv_timeout(timeout).ok().flatten()
  }
}

/**
  Registers the process-wide Ctrl-C handler and returns the `Interrupt` to give to the CPU.
  The handler prints the core dump to stderr (or a notice if none arrived within
  `timeout`) and exits the process with `INTERRUPT_EXIT_STATUS`.
*/
pub fn install(timeout: Duration) -> Result<Interrupt, ctrlc::Error> {
  let (interrupt, handle) = Interrupt::new();

  ctrlc::set_handler(move || {
    handle.request();
    match handle.wait_for_dump(timeout) {
      Some(dump) => eprintln!("\nInterrupted.\n{}", dump),
      None       => eprintln!("\nInterrupted before the CPU reached an instruction boundary; no core dump."),
    }
    std::process::exit(INTERRUPT_EXIT_STATUS);
  })?;

  Ok(interrupt)
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn request_is_visible_to_the_cpu_side() {
    let (interrupt, handle) = Interrupt::new();
    assert!(!interrupt.requested());
    handle.request();
    assert!(interrupt.requested());
  }

  #[test]
  fn delivered_dump_reaches_the_handle() {
    let (interrupt, handle) = Interrupt::new();
    interrupt.deliver("pc=0x0000".to_string());
    assert_eq!(handle.wait_for_dump(Duration::from_millis(50)), Some("pc=0x0000".to_string()));
  }

  #[test]
  fn no_dump_times_out() {
    let (_interrupt, handle) = Interrupt::new();
    assert_eq!(handle.wait_for_dump(Duration::from_millis(5)), None);
  }
}
