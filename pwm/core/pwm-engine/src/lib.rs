//! # DMA-paced Software PWM
//!
//! Drives up to 32 GPIO pins of bank 0 with independent duty cycles. The CPU
//! only writes a table of sample masks; a DMA channel replays them into
//! `GPSET0`/`GPCLR0`, paced by the DREQ line of the PWM or PCM block.
//!
//! ```text
//!  set_channel ──► ChannelTable ──► samples[] ◄── DMA copy ──► GPSET0/GPCLR0
//!                                                   │
//!                                   pacing write ──► PWM/PCM FIFO (DREQ)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pwm_engine::{GpioPin, PwmConfig, init};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut engine = init(PwmConfig::default())?;
//! let pin = GpioPin::new(18).ok_or("bad pin")?;
//! engine.set_channel_fraction(pin, 0.05)?;
//! engine.exit();
//! # Ok(())
//! # }
//! ```
//!
//! ## `sim` Feature (default)
//!
//! Ships [`simulate`], which runs the engine against heap memory and
//! journaling register files. Nothing in it needs root.

mod channel;
mod config;
mod descriptor;
mod engine;
mod error;
pub mod samples;
pub mod sequencer;
pub mod signals;

pub use channel::{Channel, ChannelTable, GpioPin, MAX_CHANNELS, check_pins, duty_from_fraction};
pub use config::{DEFAULT_PINS, DelaySource, PwmConfig};
pub use descriptor::{ChainLayout, ChainTargets, ControlBlock, DescriptorChain, MAX_SAMPLES};
pub use engine::{Engine, HardwareEngine, State, Summary, init};
pub use error::{ChainError, ChannelError, ConfigError, InitError};
pub use pwm_memory::DmaMemory;
pub use pwm_platform::Platform;
pub use pwm_registers::RegisterWindow;
pub use sequencer::Delay;

#[cfg(feature = "sim")]
pub use engine::{SimulatedEngine, simulate, simulated_windows};
