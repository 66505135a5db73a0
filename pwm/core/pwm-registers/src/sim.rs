//! # Simulated Register Windows
//!
//! A [`SimulatedRegisters`] is a plain word array that remembers what was
//! written and hands it back on reads. All windows of one simulated machine
//! share a [`Journal`], so a test can assert the exact order of stores
//! across blocks, including the settle delays the driver asked for.

use crate::RegisterWindow;
use std::sync::{Arc, Mutex, PoisonError};

/// One observable step of a simulated machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Event {
    Load {
        block: &'static str,
        offset: usize,
        value: u32,
    },
    Store {
        block: &'static str,
        offset: usize,
        value: u32,
    },
    /// The driver waited this many microseconds.
    Delay { micros: u64 },
}

/// Shared, ordered log of [`Event`]s.
#[derive(Clone, Debug, Default)]
pub struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: Event) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// `(offset, value)` of every store to `block`, in order.
    #[must_use]
    pub fn stores(&self, block: &str) -> Vec<(usize, u32)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Store {
                    block: b,
                    offset,
                    value,
                } if b == block => Some((offset, value)),
                _ => None,
            })
            .collect()
    }

    /// Stores and delays only, which is what a start-up sequence consists of.
    #[must_use]
    pub fn writes_and_delays(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, Event::Load { .. }))
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// An in-memory stand-in for a mapped peripheral block.
#[derive(Debug)]
pub struct SimulatedRegisters {
    block: &'static str,
    words: Vec<u32>,
    journal: Journal,
}

impl SimulatedRegisters {
    /// A zero-filled block of `len` bytes.
    #[must_use]
    pub fn new(block: &'static str, len: usize, journal: Journal) -> Self {
        Self {
            block,
            words: vec![0; len.div_ceil(4)],
            journal,
        }
    }

    /// Current value at `offset`, without journaling.
    #[must_use]
    pub fn peek(&self, offset: usize) -> u32 {
        self.words.get(offset / 4).copied().unwrap_or(0)
    }

    /// Overwrite `offset` without journaling, e.g. to preset hardware state.
    pub fn poke(&mut self, offset: usize, value: u32) {
        if let Some(word) = self.words.get_mut(offset / 4) {
            *word = value;
        }
    }

    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }
}

impl RegisterWindow for SimulatedRegisters {
    fn block(&self) -> &'static str {
        self.block
    }

    fn load_raw(&self, offset: usize) -> u32 {
        let value = self.peek(offset);
        self.journal.record(Event::Load {
            block: self.block,
            offset,
            value,
        });
        value
    }

    fn store_raw(&mut self, offset: usize, value: u32) {
        log::trace!("{}[{offset:#05X}] <- {value:#010X}", self.block);
        match self.words.get_mut(offset / 4) {
            Some(word) => *word = value,
            None => log::warn!(
                "store to {}[{offset:#X}] is outside the simulated block",
                self.block
            ),
        }
        self.journal.record(Event::Store {
            block: self.block,
            offset,
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dma::{DmaCs, DmaDebug};

    #[test]
    fn windows_share_one_journal() {
        let journal = Journal::new();
        let mut dma = SimulatedRegisters::new("dma", 0x100, journal.clone());
        let mut gpio = SimulatedRegisters::new("gpio", 0x100, journal.clone());

        dma.store(DmaCs::RESET);
        gpio.store_raw(0x1C, 1 << 4);
        dma.store(DmaDebug::CLEAR_ERRORS);

        assert_eq!(
            journal.writes_and_delays(),
            vec![
                Event::Store { block: "dma", offset: 0x00, value: 0x8000_0000 },
                Event::Store { block: "gpio", offset: 0x1C, value: 0x10 },
                Event::Store { block: "dma", offset: 0x20, value: 7 },
            ]
        );
        assert_eq!(journal.stores("gpio"), vec![(0x1C, 0x10)]);
    }

    #[test]
    fn modify_reads_back_previous_value() {
        let journal = Journal::new();
        let mut dma = SimulatedRegisters::new("dma", 0x100, journal.clone());
        dma.poke(0x00, 0x0000_0001);
        dma.modify::<DmaCs>(|cs| cs.with_abort(true));
        assert_eq!(dma.peek(0x00), 0x4000_0001);
        assert!(matches!(journal.events()[0], Event::Load { value: 1, .. }));
    }

    #[test]
    fn out_of_range_store_is_journaled_but_dropped() {
        let journal = Journal::new();
        let mut regs = SimulatedRegisters::new("pwm", 0x20, journal.clone());
        regs.store_raw(0x40, 0xFFFF_FFFF);
        assert_eq!(regs.peek(0x40), 0);
        assert_eq!(journal.stores("pwm"), vec![(0x40, 0xFFFF_FFFF)]);
    }
}
