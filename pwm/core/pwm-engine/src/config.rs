use crate::channel::{GpioPin, check_pins};
use crate::descriptor::MAX_SAMPLES;
use crate::error::ConfigError;
use core::fmt;
use pwm_accessors_derive::Accessors;
use pwm_addresses::BusAddress;
use pwm_platform::{Block, Platform, TICKS_PER_US, bus_register};
use pwm_registers::clock::ClockChannel;
use pwm_registers::dma::{CHANNEL_COUNT, Permap};
use pwm_registers::{pcm, pwm};

/// GPIOs driven when no pins are configured explicitly.
pub const DEFAULT_PINS: [u8; 8] = [4, 17, 18, 21, 22, 23, 24, 25];

/// Peripheral whose FIFO DREQ paces the descriptor chain.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DelaySource {
    #[default]
    Pwm,
    Pcm,
}

impl DelaySource {
    /// DREQ peripheral number placed in the pacing descriptors.
    #[must_use]
    pub const fn permap(self) -> Permap {
        match self {
            Self::Pwm => Permap::PWM,
            Self::Pcm => Permap::PCM_TX,
        }
    }

    /// Bus address of the FIFO the pacing descriptors write to.
    #[must_use]
    pub const fn fifo(self) -> BusAddress {
        match self {
            Self::Pwm => bus_register(Block::Pwm, pwm::FIF1),
            Self::Pcm => bus_register(Block::Pcm, pcm::FIFO_A),
        }
    }

    #[must_use]
    pub const fn clock(self) -> ClockChannel {
        match self {
            Self::Pwm => ClockChannel::Pwm,
            Self::Pcm => ClockChannel::Pcm,
        }
    }

    #[must_use]
    pub const fn block(self) -> Block {
        match self {
            Self::Pwm => Block::Pwm,
            Self::Pcm => Block::Pcm,
        }
    }

    /// Longest sample the pacer's counter can express, in microseconds.
    #[must_use]
    pub fn max_sample_time_us(self) -> u32 {
        match self {
            Self::Pwm => u32::MAX / TICKS_PER_US,
            // MODE.FLEN holds ticks - 1
            Self::Pcm => (u32::from(pcm::MAX_FRAME_LENGTH) + 1) / TICKS_PER_US,
        }
    }
}

impl fmt::Display for DelaySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pwm => "PWM",
            Self::Pcm => "PCM",
        })
    }
}

/// Engine configuration.
///
/// ```
/// use pwm_engine::{DelaySource, PwmConfig};
///
/// let config = PwmConfig::default()
///     .with_cycle_time_us(20_000)
///     .with_delay_source(DelaySource::Pcm);
/// assert_eq!(config.nr_samples(), Some(2000));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Accessors)]
pub struct PwmConfig {
    /// Length of one PWM period.
    cycle_time_us: u32,
    /// Length of one slice; the duty resolution.
    sample_time_us: u32,
    /// Drive pins low while active instead of high.
    invert: bool,
    delay_source: DelaySource,
    /// DMA channel `0..=14`.
    dma_channel: u8,
    platform: Platform,
    #[accessors(skip)]
    pins: Vec<GpioPin>,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: 10_000,
            sample_time_us: 10,
            invert: false,
            delay_source: DelaySource::Pwm,
            dma_channel: 14,
            platform: Platform::default(),
            pins: DEFAULT_PINS.iter().filter_map(|&n| GpioPin::new(n)).collect(),
        }
    }
}

impl PwmConfig {
    /// Configured pins, in channel order.
    #[must_use]
    pub fn pins(&self) -> &[GpioPin] {
        &self.pins
    }

    #[must_use]
    pub fn with_pins(mut self, pins: impl IntoIterator<Item = GpioPin>) -> Self {
        self.pins = pins.into_iter().collect();
        self
    }

    pub fn set_pins(&mut self, pins: impl IntoIterator<Item = GpioPin>) -> &mut Self {
        self.pins = pins.into_iter().collect();
        self
    }

    /// Slices per cycle, or `None` for a zero sample time.
    #[must_use]
    pub const fn nr_samples(&self) -> Option<u32> {
        self.cycle_time_us.checked_div(self.sample_time_us)
    }

    /// Check everything that can be checked without touching hardware.
    ///
    /// Returns the number of samples per cycle.
    ///
    /// # Errors
    /// The first [`ConfigError`] found.
    pub fn validate(&self) -> Result<u32, ConfigError> {
        let nr_samples = self.nr_samples().ok_or(ConfigError::ZeroSampleTime)?;
        if nr_samples == 0 {
            return Err(ConfigError::NoSamples {
                cycle_time_us: self.cycle_time_us,
                sample_time_us: self.sample_time_us,
            });
        }
        if nr_samples > MAX_SAMPLES {
            return Err(ConfigError::TooManySamples {
                nr_samples,
                max: MAX_SAMPLES,
            });
        }

        let max_us = self.delay_source.max_sample_time_us();
        if self.sample_time_us > max_us {
            return Err(ConfigError::SampleTimeTooLong {
                sample_time_us: self.sample_time_us,
                max_us,
                pacer: self.delay_source,
            });
        }

        if self.dma_channel >= CHANNEL_COUNT {
            return Err(ConfigError::InvalidDmaChannel(self.dma_channel));
        }

        check_pins(&self.pins)?;

        let remainder = self.cycle_time_us % self.sample_time_us;
        if remainder != 0 {
            log::warn!(
                "cycle time {} µs is not a multiple of the {} µs sample time; the effective cycle is {} µs",
                self.cycle_time_us,
                self.sample_time_us,
                self.cycle_time_us - remainder
            );
        }
        Ok(nr_samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PwmConfig::default();
        assert_eq!(config.cycle_time_us(), 10_000);
        assert_eq!(config.sample_time_us(), 10);
        assert!(!config.invert());
        assert_eq!(config.delay_source(), DelaySource::Pwm);
        assert_eq!(config.dma_channel(), 14);
        assert_eq!(config.platform(), Platform::BCM2836);
        let pins: Vec<u8> = config.pins().iter().map(|p| p.number()).collect();
        assert_eq!(pins, DEFAULT_PINS);
        assert_eq!(config.validate(), Ok(1000));
    }

    #[test]
    fn sample_time_bounds() {
        let config = PwmConfig::default().with_sample_time_us(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroSampleTime));

        let config = PwmConfig::default().with_cycle_time_us(5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoSamples { cycle_time_us: 5, sample_time_us: 10 })
        ));

        let config = PwmConfig::default()
            .with_delay_source(DelaySource::Pcm)
            .with_sample_time_us(103)
            .with_cycle_time_us(103_000);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SampleTimeTooLong { max_us: 102, .. })
        ));
        assert_eq!(config.with_sample_time_us(102).validate(), Ok(1009));
    }

    #[test]
    fn sample_count_is_bounded_by_the_bus_window() {
        let config = PwmConfig::default()
            .with_cycle_time_us(20_000_000)
            .with_sample_time_us(1);
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooManySamples {
                nr_samples: 20_000_000,
                max: MAX_SAMPLES
            })
        );
        assert_eq!(
            config.with_cycle_time_us(MAX_SAMPLES).validate(),
            Ok(MAX_SAMPLES)
        );
    }

    #[test]
    fn pin_and_channel_checks() {
        let pin = |n| GpioPin::new(n).unwrap();
        let config = PwmConfig::default().with_pins([pin(4), pin(4)]);
        assert_eq!(config.validate(), Err(ConfigError::DuplicatePin(pin(4))));

        let config = PwmConfig::default().with_pins([]);
        assert_eq!(config.validate(), Err(ConfigError::NoPins));

        let config = PwmConfig::default().with_dma_channel(15);
        assert_eq!(config.validate(), Err(ConfigError::InvalidDmaChannel(15)));
    }

    #[test]
    fn uneven_cycle_is_accepted() {
        let config = PwmConfig::default().with_cycle_time_us(10_005);
        assert_eq!(config.validate(), Ok(1000));
    }

    #[test]
    fn pacer_constants() {
        assert_eq!(DelaySource::Pwm.fifo().as_u32(), 0x7E20_C018);
        assert_eq!(DelaySource::Pcm.fifo().as_u32(), 0x7E20_3004);
        assert_eq!(DelaySource::Pcm.permap(), Permap::PCM_TX);
        assert_eq!(DelaySource::Pcm.to_string(), "PCM");
    }
}
