//! # Channel Table
//!
//! One entry per configured pin, in configuration order. A channel's duty is
//! measured in sample slices: `0` produces only the slot-0 edge, `nr_samples`
//! keeps the pin active for the whole cycle.

use crate::error::{ChannelError, ConfigError};
use core::fmt;
use core::str::FromStr;
use pwm_registers::gpio::{MAX_BANK0_PIN, pin_mask};

/// Most channels one table can hold: one per bank 0 GPIO.
pub const MAX_CHANNELS: usize = 32;

/// A GPIO number in bank 0 (`0..=31`).
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct GpioPin(u8);

impl GpioPin {
    #[inline]
    #[must_use]
    pub const fn new(number: u8) -> Option<Self> {
        if number <= MAX_BANK0_PIN {
            Some(Self(number))
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub const fn number(self) -> u8 {
        self.0
    }

    /// This pin's bit in `GPSET0`/`GPCLR0`.
    #[inline]
    #[must_use]
    pub const fn mask(self) -> u32 {
        pin_mask(self.0)
    }
}

impl TryFrom<u32> for GpioPin {
    type Error = ChannelError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or(ChannelError::InvalidPin(value))
    }
}

impl FromStr for GpioPin {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s.trim().parse().map_err(|_| ChannelError::InvalidPin(u32::MAX))?;
        Self::try_from(value)
    }
}

impl fmt::Debug for GpioPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

impl fmt::Display for GpioPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Channel {
    pub pin: GpioPin,
    /// Active slices per cycle, `0..=nr_samples`.
    pub duty: u32,
    /// Disabled channels appear in no sample slot.
    pub enabled: bool,
}

/// Convert a duty fraction into slices of a cycle with `nr_samples` slices.
///
/// # Errors
/// [`ChannelError::FractionOutOfRange`] unless `0.0 <= fraction <= 1.0`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless
)]
pub fn duty_from_fraction(fraction: f64, nr_samples: u32) -> Result<u32, ChannelError> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(ChannelError::FractionOutOfRange(fraction));
    }
    // in range: 0 <= result <= nr_samples
    Ok((fraction * f64::from(nr_samples)).round() as u32)
}

/// Rejects empty, oversized and duplicated pin lists.
///
/// # Errors
/// The first [`ConfigError`] found.
pub fn check_pins(pins: &[GpioPin]) -> Result<(), ConfigError> {
    if pins.is_empty() {
        return Err(ConfigError::NoPins);
    }
    if pins.len() > MAX_CHANNELS {
        return Err(ConfigError::TooManyChannels(pins.len()));
    }
    let mut seen = 0u32;
    for pin in pins {
        if seen & pin.mask() != 0 {
            return Err(ConfigError::DuplicatePin(*pin));
        }
        seen |= pin.mask();
    }
    Ok(())
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChannelTable {
    channels: Vec<Channel>,
    nr_samples: u32,
}

impl ChannelTable {
    /// A table of disabled channels for `pins`.
    ///
    /// # Errors
    /// [`ConfigError`] for an empty, oversized or duplicated pin list.
    pub fn new(pins: &[GpioPin], nr_samples: u32) -> Result<Self, ConfigError> {
        check_pins(pins)?;

        let channels = pins
            .iter()
            .map(|&pin| Channel {
                pin,
                duty: 0,
                enabled: false,
            })
            .collect();
        Ok(Self {
            channels,
            nr_samples,
        })
    }

    #[must_use]
    pub const fn nr_samples(&self) -> u32 {
        self.nr_samples
    }

    #[must_use]
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    #[must_use]
    pub fn get(&self, pin: GpioPin) -> Option<&Channel> {
        self.channels.iter().find(|c| c.pin == pin)
    }

    /// Mask of every configured pin, enabled or not.
    #[must_use]
    pub fn pin_mask(&self) -> u32 {
        self.channels.iter().fold(0, |m, c| m | c.pin.mask())
    }

    fn index_of(&self, pin: GpioPin) -> Result<usize, ChannelError> {
        self.channels
            .iter()
            .position(|c| c.pin == pin)
            .ok_or(ChannelError::UnknownPin(pin))
    }

    fn check_duty(&self, pin: GpioPin, duty: u32) -> Result<(), ChannelError> {
        if duty > self.nr_samples {
            return Err(ChannelError::DutyOutOfRange {
                pin,
                duty,
                max: self.nr_samples,
            });
        }
        Ok(())
    }

    /// Set and enable one channel. On error the table is unchanged.
    ///
    /// # Errors
    /// Unknown pin or duty above `nr_samples`.
    pub fn set(&mut self, pin: GpioPin, duty: u32) -> Result<(), ChannelError> {
        self.set_many(&[pin], duty)
    }

    /// Set and enable several channels, all or nothing.
    ///
    /// # Errors
    /// The first unknown pin, or a duty above `nr_samples`.
    pub fn set_many(&mut self, pins: &[GpioPin], duty: u32) -> Result<(), ChannelError> {
        let indices = pins
            .iter()
            .map(|&pin| {
                self.check_duty(pin, duty)?;
                self.index_of(pin)
            })
            .collect::<Result<Vec<_>, _>>()?;

        for i in indices {
            let channel = &mut self.channels[i];
            channel.duty = duty;
            channel.enabled = true;
        }
        Ok(())
    }

    /// Disable a channel; its pin drops out of every slot.
    ///
    /// # Errors
    /// [`ChannelError::UnknownPin`].
    pub fn release(&mut self, pin: GpioPin) -> Result<(), ChannelError> {
        let i = self.index_of(pin)?;
        self.channels[i].enabled = false;
        self.channels[i].duty = 0;
        Ok(())
    }

    /// Zero and disable every channel.
    pub fn silence(&mut self) {
        for channel in &mut self.channels {
            channel.duty = 0;
            channel.enabled = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin(n: u8) -> GpioPin {
        GpioPin::new(n).unwrap()
    }

    #[test]
    fn pin_range() {
        assert!(GpioPin::new(31).is_some());
        assert!(GpioPin::new(32).is_none());
        assert_eq!("18".parse::<GpioPin>().unwrap(), pin(18));
        assert!(matches!("40".parse::<GpioPin>(), Err(ChannelError::InvalidPin(40))));
        assert!("x".parse::<GpioPin>().is_err());
        assert_eq!(pin(18).mask(), 1 << 18);
    }

    #[test]
    fn table_rejects_bad_pin_sets() {
        assert_eq!(ChannelTable::new(&[], 10), Err(ConfigError::NoPins));
        assert_eq!(
            ChannelTable::new(&[pin(4), pin(17), pin(4)], 10),
            Err(ConfigError::DuplicatePin(pin(4)))
        );
    }

    #[test]
    fn pin_list_checks() {
        let all: Vec<GpioPin> = (0..=31).map(pin).collect();
        assert_eq!(check_pins(&all), Ok(()));
        let mut too_many = all.clone();
        too_many.push(pin(0));
        assert_eq!(check_pins(&too_many), Err(ConfigError::TooManyChannels(33)));
        assert_eq!(
            check_pins(&[pin(17), pin(4), pin(17)]),
            Err(ConfigError::DuplicatePin(pin(17)))
        );
        assert_eq!(check_pins(&[]), Err(ConfigError::NoPins));
    }

    #[test]
    fn set_enables_channel() {
        let mut table = ChannelTable::new(&[pin(4), pin(17)], 100).unwrap();
        assert!(!table.get(pin(4)).unwrap().enabled);
        table.set(pin(4), 25).unwrap();
        assert_eq!(
            *table.get(pin(4)).unwrap(),
            Channel {
                pin: pin(4),
                duty: 25,
                enabled: true
            }
        );
        assert!(!table.get(pin(17)).unwrap().enabled);
    }

    #[test]
    fn failed_updates_change_nothing() {
        let mut table = ChannelTable::new(&[pin(4), pin(17)], 100).unwrap();
        table.set(pin(17), 10).unwrap();
        let before = table.clone();

        assert!(matches!(
            table.set(pin(17), 101),
            Err(ChannelError::DutyOutOfRange { duty: 101, max: 100, .. })
        ));
        assert!(matches!(table.set(pin(5), 1), Err(ChannelError::UnknownPin(_))));
        assert!(table.set_many(&[pin(4), pin(5)], 50).is_err());
        assert_eq!(table, before);
    }

    #[test]
    fn set_many_updates_all() {
        let mut table = ChannelTable::new(&[pin(4), pin(17), pin(18)], 100).unwrap();
        table.set_many(&[pin(4), pin(18)], 100).unwrap();
        assert_eq!(table.get(pin(4)).unwrap().duty, 100);
        assert_eq!(table.get(pin(18)).unwrap().duty, 100);
        assert!(!table.get(pin(17)).unwrap().enabled);
    }

    #[test]
    fn release_and_silence() {
        let mut table = ChannelTable::new(&[pin(4), pin(17)], 100).unwrap();
        table.set_many(&[pin(4), pin(17)], 60).unwrap();
        table.release(pin(4)).unwrap();
        assert!(!table.get(pin(4)).unwrap().enabled);
        table.silence();
        assert!(table.channels().iter().all(|c| !c.enabled && c.duty == 0));
        assert_eq!(table.pin_mask(), (1 << 4) | (1 << 17));
    }

    #[test]
    fn fractions() {
        assert_eq!(duty_from_fraction(0.5, 1000), Ok(500));
        assert_eq!(duty_from_fraction(1.0, 1000), Ok(1000));
        assert_eq!(duty_from_fraction(0.0, 1000), Ok(0));
        assert_eq!(duty_from_fraction(0.0004, 1000), Ok(0));
        assert!(duty_from_fraction(1.01, 1000).is_err());
        assert!(duty_from_fraction(f64::NAN, 1000).is_err());
        assert!(duty_from_fraction(-0.1, 1000).is_err());
    }
}
