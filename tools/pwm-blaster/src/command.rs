//! Line commands read from stdin.
//!
//! ```text
//! 18=0.25       GPIO 18 at a quarter duty
//! 18=250s       GPIO 18 at 250 slices
//! release 18    disable GPIO 18 and drive it inactive
//! stop | start | status | quit
//! ```

use core::str::FromStr;
use pwm_engine::{ChannelError, GpioPin};

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Level {
    Fraction(f64),
    Slices(u32),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Command {
    Set { pin: GpioPin, level: Level },
    Release(GpioPin),
    Stop,
    Start,
    Status,
    Quit,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{0}` is not a duty fraction or slice count")]
    BadLevel(String),
    #[error(transparent)]
    Pin(#[from] ChannelError),
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if let Some((pin, level)) = line.split_once('=') {
            let pin = pin.parse()?;
            let level = level.trim();
            let parsed = match level.strip_suffix('s') {
                Some(slices) => slices.trim().parse().map(Level::Slices).ok(),
                None => level.parse().map(Level::Fraction).ok(),
            };
            let level = parsed.ok_or_else(|| ParseError::BadLevel(level.to_owned()))?;
            return Ok(Self::Set { pin, level });
        }

        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(ParseError::Empty);
        };
        match (verb.to_ascii_lowercase().as_str(), words.next()) {
            ("release", Some(pin)) => Ok(Self::Release(pin.parse()?)),
            ("stop", None) => Ok(Self::Stop),
            ("start", None) => Ok(Self::Start),
            ("status", None) => Ok(Self::Status),
            ("quit" | "exit", None) => Ok(Self::Quit),
            _ => Err(ParseError::Unknown(line.to_owned())),
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
    fn set_commands() {
        assert_eq!(
            "18=0.25".parse::<Command>(),
            Ok(Command::Set {
                pin: pin(18),
                level: Level::Fraction(0.25)
            })
        );
        assert_eq!(
            " 4 = 250s ".parse::<Command>(),
            Ok(Command::Set {
                pin: pin(4),
                level: Level::Slices(250)
            })
        );
        assert_eq!(
            "18=half".parse::<Command>(),
            Err(ParseError::BadLevel("half".into()))
        );
        assert!(matches!(
            "40=1".parse::<Command>(),
            Err(ParseError::Pin(ChannelError::InvalidPin(40)))
        ));
    }

    #[test]
    fn verbs() {
        assert_eq!("release 17".parse::<Command>(), Ok(Command::Release(pin(17))));
        assert_eq!("STOP".parse::<Command>(), Ok(Command::Stop));
        assert_eq!("start".parse::<Command>(), Ok(Command::Start));
        assert_eq!("status".parse::<Command>(), Ok(Command::Status));
        assert_eq!("quit".parse::<Command>(), Ok(Command::Quit));
        assert_eq!("   ".parse::<Command>(), Err(ParseError::Empty));
        assert!(matches!("stop now".parse::<Command>(), Err(ParseError::Unknown(_))));
        assert!(matches!("release".parse::<Command>(), Err(ParseError::Unknown(_))));
    }
}
