use anyhow::Context;
use clap::Parser;
use command::{Command, Level};
use log::LevelFilter;
use pwm_engine::signals::{TerminationLatch, install_termination_latch};
use pwm_engine::{Delay, DelaySource, DmaMemory, Engine, GpioPin, Platform, PwmConfig, RegisterWindow};
use pwm_log::StderrLogger;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

mod command;

/// How often the command loop checks for termination signals.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Multi-channel software PWM on GPIO, paced by DMA.
///
/// Reads one command per line from stdin: `<pin>=<fraction>`,
/// `<pin>=<slices>s`, `release <pin>`, `stop`, `start`, `status` or `quit`.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// GPIO pins to drive [default: 4 17 18 21 22 23 24 25]
    #[arg(value_name = "PIN")]
    pins: Vec<GpioPin>,

    /// Drive pins low while active.
    #[arg(long)]
    invert: bool,

    /// Pace with the PCM block instead of PWM, leaving PWM free for audio.
    #[arg(long)]
    pcm: bool,

    /// PWM period in microseconds.
    #[arg(long, default_value_t = 10_000, env = "PWM_CYCLE_US")]
    cycle_us: u32,

    /// Duty resolution in microseconds.
    #[arg(long, default_value_t = 10, env = "PWM_SAMPLE_US")]
    sample_us: u32,

    /// DMA channel, 0 to 14.
    #[arg(long, default_value_t = 14, env = "PWM_DMA_CHANNEL")]
    dma_channel: u8,

    /// SoC: bcm2835 (Pi 1/Zero), bcm2836/bcm2837 (Pi 2/3) or bcm2711 (Pi 4).
    #[arg(long, default_value_t = Platform::default(), env = "PWM_SOC")]
    soc: Platform,

    /// Run against simulated hardware; no root required.
    #[arg(long)]
    dry_run: bool,

    #[arg(long, default_value_t = LevelFilter::Info, env = "PWM_LOG")]
    log_level: LevelFilter,
}

impl Args {
    fn config(&self) -> PwmConfig {
        let mut config = PwmConfig::default()
            .with_cycle_time_us(self.cycle_us)
            .with_sample_time_us(self.sample_us)
            .with_invert(self.invert)
            .with_dma_channel(self.dma_channel)
            .with_platform(self.soc)
            .with_delay_source(if self.pcm {
                DelaySource::Pcm
            } else {
                DelaySource::Pwm
            });
        if !self.pins.is_empty() {
            config.set_pins(self.pins.iter().copied());
        }
        config
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    StderrLogger::new(args.log_level)
        .init()
        .context("failed to install the logger")?;

    let config = args.config();
    config.validate().context("invalid configuration")?;
    let latch = install_termination_latch().context("failed to install signal handlers")?;
    let commands = spawn_stdin_reader();

    if args.dry_run {
        let (engine, _journal) =
            pwm_engine::simulate(config).context("failed to start simulated engine")?;
        serve(engine, &commands, latch);
    } else {
        let engine = pwm_engine::init(config).context("failed to initialize DMA PWM")?;
        serve(engine, &commands, latch);
    }
    Ok(())
}

/// Forward stdin lines until EOF. The channel disconnects when stdin closes.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
        log::debug!("stdin closed");
    });
    rx
}

/// Run commands until `quit` or a termination signal. The engine is dropped
/// on return, which stops DMA and releases the pins.
fn serve<M: DmaMemory, R: RegisterWindow, D: Delay>(
    mut engine: Engine<M, R, D>,
    commands: &Receiver<String>,
    latch: TerminationLatch,
) {
    println!("{}", engine.summary());
    let mut stdin_open = true;

    while !latch.is_set() {
        if !stdin_open {
            std::thread::sleep(POLL_INTERVAL);
            continue;
        }
        let line = match commands.recv_timeout(POLL_INTERVAL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                stdin_open = false;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(Command::Quit) => latch.set(),
            Ok(command) => execute(&mut engine, command),
            Err(e) => log::warn!("{e}"),
        }
    }

    log::info!("shutting down");
    engine.exit();
}

fn execute<M: DmaMemory, R: RegisterWindow, D: Delay>(engine: &mut Engine<M, R, D>, command: Command) {
    let result = match command {
        Command::Set {
            pin,
            level: Level::Fraction(fraction),
        } => engine.set_channel_fraction(pin, fraction),
        Command::Set {
            pin,
            level: Level::Slices(duty),
        } => engine.set_channel(pin, duty),
        Command::Release(pin) => engine.release_channel(pin),
        Command::Stop => {
            engine.stop();
            Ok(())
        }
        Command::Start => {
            engine.start();
            Ok(())
        }
        Command::Status => {
            print_status(engine);
            Ok(())
        }
        Command::Quit => Ok(()),
    };
    if let Err(e) = result {
        log::warn!("{e}");
    }
}

fn print_status<M: DmaMemory, R: RegisterWindow, D: Delay>(engine: &Engine<M, R, D>) {
    let steps = engine.layout().nr_samples();
    let cs = engine.dma_status();
    println!("{}", engine.summary());
    println!(
        "state: {:?}, DMA active: {}, DMA error: {}",
        engine.state(),
        cs.active(),
        cs.error()
    );
    for channel in engine.channels() {
        if channel.enabled {
            println!("  GPIO {:>2}: {:>5}/{steps}", channel.pin, channel.duty);
        } else {
            println!("  GPIO {:>2}: off", channel.pin);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_arguments() {
        let args = Args::try_parse_from(["pwm-blaster"]).unwrap();
        let config = args.config();
        assert_eq!(config, PwmConfig::default());
    }

    #[test]
    fn explicit_arguments() {
        let args = Args::try_parse_from([
            "pwm-blaster",
            "--pcm",
            "--invert",
            "--cycle-us",
            "20000",
            "--sample-us",
            "5",
            "--dma-channel",
            "5",
            "--soc",
            "pi4",
            "18",
            "23",
        ])
        .unwrap();
        let config = args.config();
        assert_eq!(config.delay_source(), DelaySource::Pcm);
        assert!(config.invert());
        assert_eq!(config.nr_samples(), Some(4000));
        assert_eq!(config.dma_channel(), 5);
        assert_eq!(config.platform(), Platform::BCM2711);
        let pins: Vec<u8> = config.pins().iter().map(|p| p.number()).collect();
        assert_eq!(pins, [18, 23]);
    }

    #[test]
    fn bad_pin_is_rejected() {
        assert!(Args::try_parse_from(["pwm-blaster", "32"]).is_err());
        assert!(Args::try_parse_from(["pwm-blaster", "--soc", "esp32"]).is_err());
    }

    #[test]
    fn commands_drive_simulated_engine() {
        let (mut engine, _journal) = pwm_engine::simulate(PwmConfig::default()).unwrap();
        let pin = GpioPin::new(18).unwrap();
        execute(&mut engine, "18=0.5".parse().unwrap());
        assert_eq!(engine.channel(pin).unwrap().duty, 500);
        execute(&mut engine, "18=20s".parse().unwrap());
        assert_eq!(engine.channel(pin).unwrap().duty, 20);
        execute(&mut engine, "18=2000s".parse().unwrap());
        assert_eq!(engine.channel(pin).unwrap().duty, 20);
        execute(&mut engine, "release 18".parse().unwrap());
        assert!(!engine.channel(pin).unwrap().enabled);
        execute(&mut engine, Command::Stop);
        assert_eq!(engine.state(), pwm_engine::State::Stopped);
    }
}
