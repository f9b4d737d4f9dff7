/*!
  The bridge between the CPU and a renderer: two independent, one-directional channels.
  The CPU sends `EngineEvent`s to the renderer, and the renderer sends `InputEvent`s back.

  Each channel is FIFO. Nothing is ordered across the two channels. Everything that
  crosses is an owned copy, so the renderer never looks at live machine state.

  Closing a sender, explicitly or by dropping it, ends the stream: a receiver blocked in
  `recv` wakes up with `None`.
*/

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::cpu::MachineState;
use crate::error::Fault;

/// Messages from the CPU to the renderer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EngineEvent {
  /// A copy of the machine state between two instructions.
  Snapshot(Box<MachineState>),
  /// A value written by `OUT`.
  Output(u16),
  /// The CPU is blocked in `IN` until an `InputEvent` arrives.
  InputRequested,
  Halted(Box<MachineState>),
  Faulted(Fault, Box<MachineState>),
}

/// Messages from the renderer to the CPU.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputEvent {
  Value(u16),
}

pub type EngineSender   = MessageSender<EngineEvent>;
pub type EngineReceiver = MessageReceiver<EngineEvent>;
pub type InputSender    = MessageSender<InputEvent>;
pub type InputReceiver  = MessageReceiver<InputEvent>;

/// `recv_timeout` ran out of time with the channel still open.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Timeout;

/// The receiving side went away; the message is handed back.
#[derive(Debug, Eq, PartialEq)]
pub struct Disconnected<T>(pub T);

pub struct MessageSender<T> {
  sender: Sender<T>,
}

pub struct MessageReceiver<T> {
  receiver: Receiver<T>,
}

/**
  Creates a channel. With a capacity, `send` blocks while the channel is full; a capacity of
  zero makes every `send` wait for a matching `recv`. Without one, the channel is unbounded.
*/
pub fn channel<T>(capacity: Option<usize>) -> (MessageSender<T>, MessageReceiver<T>) {
  let (sender, receiver) = match capacity {
    Some(capacity) => crossbeam::channel::bounded(capacity),
    None           => crossbeam::channel::unbounded(),
  };
  (MessageSender { sender }, MessageReceiver { receiver })
}

/// Both channels of a bridge, split by the side that holds them.
pub struct Bridge {
  pub engine_events : EngineSender,
  pub engine_input  : InputReceiver,
  pub render_events : EngineReceiver,
  pub render_input  : InputSender,
}

impl Bridge {
  pub fn new(capacity: Option<usize>) -> Bridge {
    let (engine_events, render_events) = channel(capacity);
    // Input is tiny and rare, it never needs to apply back pressure.
    let (render_input, engine_input) = channel(None);
    Bridge { engine_events, engine_input, render_events, render_input }
  }
}

impl<T> MessageSender<T> {
  /// Blocks while a bounded channel is full.
  pub fn send(&self, message: T) -> Result<(), Disconnected<T>> {
    self.sender.send(message).map_err(|error| Disconnected(error.into_inner()))
  }

  /// Ends the stream. Receivers drain whatever was already sent and then see `None`.
  pub fn close(self) {
    drop(self.sender);
  }
}

impl<T> MessageReceiver<T> {
  /// Blocks until a message arrives, or returns `None` once the sender is closed.
  pub fn recv(&self) -> Option<T> {
    self.receiver.recv().ok()
  }

  /// Like `recv`, but gives up after `timeout`. `Ok(None)` is the end of the stream.
  pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>, Timeout> {
    match self.receiver.recv_timeout(timeout) {
      Ok(message)                          => Ok(Some(message)),
      Err(RecvTimeoutError::Disconnected)  => Ok(None),
      Err(RecvTimeoutError::Timeout)       => Err(Timeout),
    }
  }

  pub fn try_recv(&self) -> Option<T> {
    self.receiver.try_recv().ok()
  }

  pub fn close(self) {
    drop(self.receiver);
  }
}

impl<T> Iterator for MessageReceiver<T> {
  type Item = T;

  fn next(&mut self) -> Option<T> {
    self.recv()
  }
}


#[cfg(test)]
mod tests {
  use std::thread;

  use super::*;

  #[test]
  fn messages_arrive_in_send_order() {
    let (sender, receiver) = channel(None);
    for value in 0..5u16 {
      sender.send(InputEvent::Value(value)).expect("receiver alive");
    }
    sender.close();

    let values: Vec<InputEvent> = receiver.collect();
    assert_eq!(values, (0..5u16).map(InputEvent::Value).collect::<Vec<_>>());
  }

  #[test]
  fn closing_unblocks_a_waiting_receiver() {
    let (sender, receiver) = channel::<EngineEvent>(Some(0));
    let waiter = thread::spawn(move || receiver.recv());

    thread::sleep(Duration::from_millis(20));
    sender.close();

    assert_eq!(waiter.join().expect("receiver thread does not panic"), None);
  }

  #[test]
  fn send_after_receiver_is_gone_hands_the_message_back() {
    let (sender, receiver) = channel(Some(1));
    receiver.close();
    assert_eq!(sender.send(InputEvent::Value(3)), Err(Disconnected(InputEvent::Value(3))));
  }

  #[test]
  fn timeout_is_distinct_from_closure() {
    let (sender, receiver) = channel::<InputEvent>(None);
    assert_eq!(receiver.recv_timeout(Duration::from_millis(5)), Err(Timeout));
    sender.close();
    assert_eq!(receiver.recv_timeout(Duration::from_millis(5)), Ok(None));
  }
}
