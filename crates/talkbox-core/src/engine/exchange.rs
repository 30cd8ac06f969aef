//! Single-producer/single-consumer hand-off of analysis blocks.
//!
//! Two fixed buffers ping-pong between the audio thread (writer) and the
//! analysis thread (reader). The non-fill buffer moves through a three-state
//! machine: `EMPTY` (writer may claim it on the next block boundary),
//! `READY` (a finished block awaits the reader), `IN_USE` (the reader is
//! inside it). All transitions are CAS-protected; publication of buffer
//! contents is ordered before the `READY` store and the reader's writes are
//! ordered before its `EMPTY` store.
//!
//! If a block completes while the previous one is still `READY`, the stale
//! block is reclaimed and overwritten. If the reader is mid-consumption
//! (`IN_USE`), the fresh block is dropped instead and refilled in place;
//! either way the writer reports the overrun and never waits.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::constants::BLOCK_LENGTH;
use crate::types::Word32;

const EMPTY: u8 = 0;
const READY: u8 = 1;
const IN_USE: u8 = 2;

struct Slots {
    buffers: [UnsafeCell<[Word32; BLOCK_LENGTH]>; 2],
    /// State of the non-fill buffer.
    state: AtomicU8,
    /// Which buffer the reader may enter while `state` is `READY`.
    ready_index: AtomicUsize,
}

// SAFETY: the writer only touches `buffers[fill]`; the reader only touches
// `buffers[ready_index]` between a successful READY -> IN_USE transition and
// its closing EMPTY store. The state machine keeps the two index sets
// disjoint, and the writer/reader handles are unique (not Clone).
unsafe impl Sync for Slots {}

/// Outcome of appending one sample to the fill buffer.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    /// Sample stored, block not yet full.
    Buffered,
    /// A block boundary was crossed and the block was published.
    BlockReady,
    /// A block boundary was crossed but the previous block was still
    /// unconsumed; one block was dropped.
    Overrun,
}

/// Audio-thread half: appends samples and publishes full blocks.
pub(crate) struct BlockWriter {
    slots: Arc<Slots>,
    fill: usize,
    pos: usize,
}

/// Analysis-thread half: claims published blocks for in-place consumption.
pub(crate) struct BlockReader {
    slots: Arc<Slots>,
}

pub(crate) fn block_exchange() -> (BlockWriter, BlockReader) {
    let slots = Arc::new(Slots {
        buffers: [
            UnsafeCell::new([0; BLOCK_LENGTH]),
            UnsafeCell::new([0; BLOCK_LENGTH]),
        ],
        state: AtomicU8::new(EMPTY),
        ready_index: AtomicUsize::new(1),
    });
    (
        BlockWriter {
            slots: Arc::clone(&slots),
            fill: 0,
            pos: 0,
        },
        BlockReader { slots },
    )
}

impl BlockWriter {
    /// Appends one sample, publishing the block when it fills.
    pub fn push(&mut self, sample: Word32) -> PushOutcome {
        // SAFETY: sole writer of buffers[fill]; the reader never selects the
        // fill index (see the state machine in `publish`).
        unsafe {
            (*self.slots.buffers[self.fill].get())[self.pos] = sample;
        }
        self.pos += 1;
        if self.pos < BLOCK_LENGTH {
            return PushOutcome::Buffered;
        }
        self.pos = 0;
        self.publish()
    }

    fn publish(&mut self) -> PushOutcome {
        match self.slots.state.load(Ordering::Acquire) {
            EMPTY => {
                // only the reader leaves EMPTY via this writer's READY store,
                // so no transition can race the swap below
                self.slots.ready_index.store(self.fill, Ordering::Relaxed);
                self.fill ^= 1;
                self.slots.state.store(READY, Ordering::Release);
                PushOutcome::BlockReady
            }
            READY => {
                // reclaim the stale block; if the reader claims it first,
                // fall through to the in-use policy
                if self
                    .slots
                    .state
                    .compare_exchange(READY, EMPTY, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    self.slots.ready_index.store(self.fill, Ordering::Relaxed);
                    self.fill ^= 1;
                    self.slots.state.store(READY, Ordering::Release);
                }
                PushOutcome::Overrun
            }
            _ => {
                // reader is inside the previous block; the fresh block is
                // dropped and its buffer refilled in place
                PushOutcome::Overrun
            }
        }
    }

    /// Discards partially collected samples and any unclaimed block.
    pub fn reset(&mut self) {
        self.pos = 0;
        let _ = self
            .slots
            .state
            .compare_exchange(READY, EMPTY, Ordering::AcqRel, Ordering::Acquire);
        // SAFETY: sole writer of buffers[fill].
        unsafe {
            (*self.slots.buffers[self.fill].get()).fill(0);
        }
    }
}

impl BlockReader {
    /// Runs `f` on the pending block, if any. The block is handed over
    /// mutably because consumption scales it in place.
    pub fn consume<R>(&mut self, f: impl FnOnce(&mut [Word32; BLOCK_LENGTH]) -> R) -> Option<R> {
        if self
            .slots
            .state
            .compare_exchange(READY, IN_USE, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }
        let index = self.slots.ready_index.load(Ordering::Relaxed);
        // SAFETY: IN_USE bars the writer from this buffer, and the Acquire
        // above pairs with the writer's Release publication of the contents.
        let result = unsafe { f(&mut *self.slots.buffers[index].get()) };
        self.slots.state.store(EMPTY, Ordering::Release);
        Some(result)
    }

    /// True when a finished block is waiting.
    pub fn pending(&self) -> bool {
        self.slots.state.load(Ordering::Relaxed) == READY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_block(writer: &mut BlockWriter, base: i32) -> PushOutcome {
        let mut last = PushOutcome::Buffered;
        for i in 0..BLOCK_LENGTH as i32 {
            last = writer.push(base + i);
        }
        last
    }

    #[test]
    fn test_block_round_trip() {
        let (mut writer, mut reader) = block_exchange();
        assert!(!reader.pending());

        assert_eq!(fill_block(&mut writer, 100), PushOutcome::BlockReady);
        assert!(reader.pending());

        let consumed = reader.consume(|block| {
            assert_eq!(block[0], 100);
            assert_eq!(block[BLOCK_LENGTH - 1], 100 + BLOCK_LENGTH as i32 - 1);
            block.len()
        });
        assert_eq!(consumed, Some(BLOCK_LENGTH));
        assert!(!reader.pending());
    }

    #[test]
    fn test_consume_without_block() {
        let (_writer, mut reader) = block_exchange();
        assert_eq!(reader.consume(|_| ()), None);
    }

    #[test]
    fn test_overrun_drops_oldest() {
        let (mut writer, mut reader) = block_exchange();
        assert_eq!(fill_block(&mut writer, 0), PushOutcome::BlockReady);
        assert_eq!(fill_block(&mut writer, 10_000), PushOutcome::Overrun);
        assert_eq!(fill_block(&mut writer, 20_000), PushOutcome::Overrun);

        // the newest block wins
        let first = reader.consume(|block| block[0]);
        assert_eq!(first, Some(20_000));
    }

    #[test]
    fn test_alternating_buffers_carry_distinct_data() {
        let (mut writer, mut reader) = block_exchange();
        for round in 0..6 {
            assert_eq!(fill_block(&mut writer, round * 1000), PushOutcome::BlockReady);
            let seen = reader.consume(|block| block[0]);
            assert_eq!(seen, Some(round * 1000));
        }
    }

    #[test]
    fn test_reset_discards_pending() {
        let (mut writer, mut reader) = block_exchange();
        fill_block(&mut writer, 7);
        writer.reset();
        assert_eq!(reader.consume(|_| ()), None);
        // next full block publishes cleanly
        assert_eq!(fill_block(&mut writer, 8), PushOutcome::BlockReady);
    }

    #[test]
    fn test_threaded_hand_off() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let (mut writer, mut reader) = block_exchange();
        let done = Arc::new(AtomicBool::new(false));
        let done_reader = Arc::clone(&done);

        // blocks may be dropped under pressure but must never tear or
        // arrive out of order
        let consumer = std::thread::spawn(move || {
            let mut last_seen = -1;
            loop {
                let seen = reader.consume(|block| {
                    let first = block[0];
                    assert!(block.iter().all(|&v| v == first), "torn block");
                    first
                });
                match seen {
                    Some(marker) => {
                        assert!(marker > last_seen, "blocks out of order");
                        last_seen = marker;
                    }
                    None => {
                        if done_reader.load(Ordering::Acquire) {
                            break;
                        }
                        std::thread::yield_now();
                    }
                }
            }
            last_seen
        });

        for marker in 0..32 {
            let mut outcome = PushOutcome::Buffered;
            for _ in 0..BLOCK_LENGTH {
                outcome = writer.push(marker);
            }
            assert_ne!(outcome, PushOutcome::Buffered);
            std::thread::yield_now();
        }
        done.store(true, Ordering::Release);
        let last_seen = consumer.join().unwrap();
        assert!(last_seen >= 0, "consumer saw no blocks");
    }
}
