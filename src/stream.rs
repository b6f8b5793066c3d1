//! Single-producer, single-consumer conduits between stages.
//!
//! A stream is an unbuffered crossbeam channel: every value is handed directly
//! from the writing stage to the reading stage. Dropping the [`StreamSender`]
//! closes the stream; values already handed over stay with the reader, and a
//! reader blocked in `recv` wakes with a disconnected result. Since the sender
//! is owned by exactly one worker, closure happens exactly once.

use crossbeam::channel::{bounded, Receiver, Sender};

/// Reading end of a stream
pub type Stream<T> = Receiver<T>;

/// Writing end of a stream. Dropping it closes the stream.
pub type StreamSender<T> = Sender<T>;

/// Allocate a fresh, open stream
pub fn stream<T>() -> (StreamSender<T>, Stream<T>) {
    bounded(0)
}
