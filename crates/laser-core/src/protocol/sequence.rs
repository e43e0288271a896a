//! Movement numbering for published events.
//!
//! # What is the movement number? (for beginners)
//!
//! Every movement event carries a `movimento_num` that goes 1, 2, 3, … with
//! one increment per command the actuator actually accepted.  Subscribers use
//! it to:
//!
//! - **Detect lost events** – receiving 4 after 2 means 3 never arrived.
//! - **Drop duplicates** – the stream is at-least-once, so 5 may show up twice.
//! - **Order records** – the persistence service stores rows in this order.
//!
//! # Ownership instead of atomics
//!
//! The control loop is the only writer and runs on a single thread, so the
//! counter is a plain `u64` advanced through `&mut self`.  The borrow checker
//! then guarantees no two call sites can race to issue the same number.  The
//! counter is never reset while the process runs, not even across serial
//! reconnects.

/// Issues gap-free movement numbers starting at 1.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MovementSequence {
    /// The last number handed out; 0 before the first movement.
    last: u64,
}

impl MovementSequence {
    /// Creates a counter whose first number will be 1.
    pub fn new() -> Self {
        Self { last: 0 }
    }

    /// Issues the next movement number.
    ///
    /// Call this only once a command has been accepted by the actuator, so that
    /// every number corresponds to a real movement.
    ///
    /// Saturates at `u64::MAX`; at one movement every 50 ms that is several
    /// billion years away.
    pub fn next(&mut self) -> u64 {
        self.last = self.last.saturating_add(1);
        self.last
    }

    /// The last number issued, or 0 if none has been.
    pub fn current(&self) -> u64 {
        self.last
    }
}
