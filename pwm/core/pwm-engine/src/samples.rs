//! # Sample Regeneration
//!
//! Slot 0 turns every enabled channel on. Slot `j > 0` turns off every
//! enabled channel whose duty is below `j`, so a channel with duty `d` stays
//! active for slots `0..=d`. Writes are single aligned words; the DMA engine
//! may observe a mix of old and new slots for at most one cycle.

use crate::channel::{Channel, ChannelTable};
use crate::descriptor::ChainLayout;
use pwm_memory::DmaMemory;

/// Mask stored in sample `slot`.
#[must_use]
pub fn slot_mask(channels: &[Channel], slot: u32) -> u32 {
    channels
        .iter()
        .filter(|c| c.enabled && (slot == 0 || c.duty < slot))
        .fold(0, |mask, c| mask | c.pin.mask())
}

/// Rewrite every sample slot from `table`.
pub fn regenerate<M: DmaMemory + ?Sized>(memory: &mut M, layout: &ChainLayout, table: &ChannelTable) {
    for slot in 0..layout.nr_samples() {
        memory.write_u32(layout.sample_offset(slot), slot_mask(table.channels(), slot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::GpioPin;
    use pwm_addresses::DramAlias;
    use pwm_memory::SimulatedArena;

    fn pin(n: u8) -> GpioPin {
        GpioPin::new(n).unwrap()
    }

    fn samples(arena: &SimulatedArena, layout: &ChainLayout) -> Vec<u32> {
        (0..layout.nr_samples())
            .map(|j| arena.read_u32(layout.sample_offset(j)))
            .collect()
    }

    #[test]
    fn pin_18_at_fifty_slices() {
        let layout = ChainLayout::new(1000);
        let mut arena = SimulatedArena::new(layout.pages(), DramAlias::UNCACHED).unwrap();
        let mut table = ChannelTable::new(&[pin(4), pin(18)], 1000).unwrap();
        table.set(pin(18), 50).unwrap();
        regenerate(&mut arena, &layout, &table);

        let s = samples(&arena, &layout);
        assert_eq!(s[0], 1 << 18);
        assert!(s[1..=50].iter().all(|&m| m == 0));
        assert!(s[51..].iter().all(|&m| m == 1 << 18));
    }

    #[test]
    fn duty_extremes() {
        let mut table = ChannelTable::new(&[pin(4), pin(17)], 100).unwrap();
        table.set(pin(4), 0).unwrap();
        table.set(pin(17), 100).unwrap();
        let channels = table.channels();

        assert_eq!(slot_mask(channels, 0), (1 << 4) | (1 << 17));
        for j in 1..100 {
            assert_eq!(slot_mask(channels, j), 1 << 4, "slot {j}");
        }
    }

    #[test]
    fn disabled_channels_are_absent() {
        let mut table = ChannelTable::new(&[pin(4), pin(17)], 10).unwrap();
        table.set(pin(4), 3).unwrap();
        for j in 0..10 {
            assert_eq!(slot_mask(table.channels(), j) & (1 << 17), 0);
        }
    }

    #[test]
    fn slot_membership_matches_duty() {
        let mut table = ChannelTable::new(&[pin(22)], 20).unwrap();
        for duty in [0, 1, 7, 19, 20] {
            table.set(pin(22), duty).unwrap();
            for j in 1..20 {
                let present = slot_mask(table.channels(), j) != 0;
                assert_eq!(present, j > duty, "duty {duty} slot {j}");
            }
        }
    }
}
