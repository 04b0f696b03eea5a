use std::sync::atomic::{AtomicU8, Ordering};

/// Per-session sequence id source.
///
/// The counter is incremented before each command and wraps 0xFF -> 0x00,
/// so the first id handed out is 0. Ids are only unique within a window of
/// 256 in-flight commands; beyond that a collision with a still-pending key
/// is possible and is caught by the pending table's duplicate policy.
#[derive(Debug)]
pub struct CommandSequencer {
    counter: AtomicU8,
}

impl CommandSequencer {
    pub fn new() -> Self {
        Self::starting_after(u8::MAX)
    }

    /// Sequencer whose next id is `last.wrapping_add(1)`.
    pub fn starting_after(last: u8) -> Self {
        Self {
            counter: AtomicU8::new(last),
        }
    }

    /// Advance and return the new sequence id.
    pub fn next(&self) -> u8 {
        self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// The most recently issued id (or the seed if none were issued).
    pub fn current(&self) -> u8 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for CommandSequencer {
    fn default() -> Self {
        Self::new()
    }
}
