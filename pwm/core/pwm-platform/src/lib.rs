//! # SoC Peripheral Layout
//!
//! Where each peripheral block lives in the ARM physical address space, how
//! SDRAM is aliased on the VideoCore bus, and how fast PLLD runs. Offsets are
//! identical across the supported SoCs; only the bases differ.

#![cfg_attr(not(any(test, doctest)), no_std)]

use core::fmt;
use core::str::FromStr;
use pwm_addresses::{BusAddress, DramAlias, PhysicalAddress};

/// DMA controller, channels 0..=14.
pub const DMA_OFFSET: u32 = 0x0000_7000;
/// Clock manager.
pub const CLOCK_OFFSET: u32 = 0x0010_1000;
/// GPIO function select and level registers.
pub const GPIO_OFFSET: u32 = 0x0020_0000;
/// PCM / I2S controller.
pub const PCM_OFFSET: u32 = 0x0020_3000;
/// PWM controller.
pub const PWM_OFFSET: u32 = 0x0020_C000;

/// Bytes mapped per block. All registers used live in the first page.
pub const BLOCK_LEN: usize = 0x1000;

/// Frequency the PWM/PCM clock is divided down to: one tick every 100 ns.
pub const TICK_HZ: u32 = 10_000_000;

/// Clock ticks per microsecond at [`TICK_HZ`].
pub const TICKS_PER_US: u32 = TICK_HZ / 1_000_000;

/// A peripheral block the driver maps.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Block {
    Dma,
    Clock,
    Gpio,
    Pcm,
    Pwm,
}

impl Block {
    #[inline]
    #[must_use]
    pub const fn offset(self) -> u32 {
        match self {
            Self::Dma => DMA_OFFSET,
            Self::Clock => CLOCK_OFFSET,
            Self::Gpio => GPIO_OFFSET,
            Self::Pcm => PCM_OFFSET,
            Self::Pwm => PWM_OFFSET,
        }
    }

    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dma => "dma",
            Self::Clock => "clk",
            Self::Gpio => "gpio",
            Self::Pcm => "pcm",
            Self::Pwm => "pwm",
        }
    }
}

/// The constants that differ between SoC generations.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Platform {
    pub name: &'static str,
    /// ARM physical address of the peripheral block.
    pub peripheral_base: PhysicalAddress,
    /// How SDRAM appears on the bus to the DMA engine.
    pub dram_alias: DramAlias,
    /// PLLD output frequency.
    pub plld_hz: u32,
}

impl Platform {
    /// Raspberry Pi 1 and Zero.
    pub const BCM2835: Self = Self {
        name: "bcm2835",
        peripheral_base: PhysicalAddress::new(0x2000_0000),
        dram_alias: DramAlias::L2_COHERENT,
        plld_hz: 500_000_000,
    };

    /// Raspberry Pi 2 and 3.
    pub const BCM2836: Self = Self {
        name: "bcm2836",
        peripheral_base: PhysicalAddress::new(0x3F00_0000),
        dram_alias: DramAlias::UNCACHED,
        plld_hz: 500_000_000,
    };

    /// Raspberry Pi 4.
    pub const BCM2711: Self = Self {
        name: "bcm2711",
        peripheral_base: PhysicalAddress::new(0xFE00_0000),
        dram_alias: DramAlias::UNCACHED,
        plld_hz: 750_000_000,
    };

    pub const ALL: [Self; 3] = [Self::BCM2835, Self::BCM2836, Self::BCM2711];

    /// Physical address of `block`.
    #[inline]
    #[must_use]
    pub const fn block_base(&self, block: Block) -> PhysicalAddress {
        PhysicalAddress::new(self.peripheral_base.as_u64() + block.offset() as u64)
    }

    /// Integer PLLD divisor producing [`TICK_HZ`].
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn clock_divisor(&self) -> u16 {
        // at most 75 for the platforms above
        (self.plld_hz / TICK_HZ) as u16
    }
}

/// Bus address of a register at `offset` inside `block`.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn bus_register(block: Block, offset: usize) -> BusAddress {
    BusAddress::peripheral(block.offset() + offset as u32)
}

impl Default for Platform {
    fn default() -> Self {
        Self::BCM2836
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Unknown SoC name.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UnknownPlatform;

impl fmt::Display for UnknownPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown SoC, expected one of bcm2835, bcm2836, bcm2837, bcm2711")
    }
}

impl core::error::Error for UnknownPlatform {}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALIASES: [(&str, Platform); 10] = [
            ("bcm2835", Platform::BCM2835),
            ("bcm2708", Platform::BCM2835),
            ("pi1", Platform::BCM2835),
            ("bcm2836", Platform::BCM2836),
            ("bcm2837", Platform::BCM2836),
            ("bcm2709", Platform::BCM2836),
            ("pi2", Platform::BCM2836),
            ("pi3", Platform::BCM2836),
            ("bcm2711", Platform::BCM2711),
            ("pi4", Platform::BCM2711),
        ];
        ALIASES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|&(_, platform)| platform)
            .ok_or(UnknownPlatform)
    }
}

const _: () = {
    assert!(TICK_HZ.is_multiple_of(1_000_000));
    assert!(Platform::BCM2835.plld_hz.is_multiple_of(TICK_HZ));
    assert!(Platform::BCM2836.plld_hz.is_multiple_of(TICK_HZ));
    assert!(Platform::BCM2711.plld_hz.is_multiple_of(TICK_HZ));
    assert!(PWM_OFFSET as usize + BLOCK_LEN <= 0x0100_0000);
};
