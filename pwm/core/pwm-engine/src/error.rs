use crate::channel::GpioPin;
use crate::config::DelaySource;
use pwm_addresses::ArenaOffset;
use pwm_memory::{ArenaError, MapError, ResolveError};

/// The configuration cannot describe a working waveform.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("sample time must be at least 1 µs")]
    ZeroSampleTime,
    #[error("cycle time of {cycle_time_us} µs is shorter than one {sample_time_us} µs sample")]
    NoSamples {
        cycle_time_us: u32,
        sample_time_us: u32,
    },
    #[error("{nr_samples} samples per cycle exceed the {max} the DMA bus window can hold")]
    TooManySamples { nr_samples: u32, max: u32 },
    #[error("sample time of {sample_time_us} µs exceeds the {pacer} pacing limit of {max_us} µs")]
    SampleTimeTooLong {
        sample_time_us: u32,
        max_us: u32,
        pacer: DelaySource,
    },
    #[error("no GPIO pins configured")]
    NoPins,
    #[error("GPIO {0} is configured more than once")]
    DuplicatePin(GpioPin),
    #[error("{0} channels configured, at most 32 are supported")]
    TooManyChannels(usize),
    #[error("DMA channel {0} is not in 0..=14")]
    InvalidDmaChannel(u8),
}

/// A control-plane request was rejected; the waveform is unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChannelError {
    #[error("GPIO {0} is not a bank 0 pin (0..=31)")]
    InvalidPin(u32),
    #[error("GPIO {0} is not a configured channel")]
    UnknownPin(GpioPin),
    #[error("duty of {duty} slices for GPIO {pin} exceeds the {max} available")]
    DutyOutOfRange { pin: GpioPin, duty: u32, max: u32 },
    #[error("duty fraction {0} is not within 0.0..=1.0")]
    FractionOutOfRange(f64),
}

/// The descriptor chain does not fit the arena it is built in.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ChainError {
    #[error("arena holds {have} bytes but the descriptor chain needs {need}")]
    ArenaTooSmall { have: usize, need: usize },
    #[error("arena offset {0:?} has no bus address")]
    Unmapped(ArenaOffset),
}

/// Bring-up failed. Nothing is left running and no GPIO has been touched.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Arena(#[from] ArenaError),
    #[error("failed to build the descriptor chain: {0}")]
    Chain(#[from] ChainError),
}
