//! # Engine
//!
//! Owns the arena, the descriptor chain, the channel table and the register
//! windows. Control-plane calls rewrite sample words only; the control blocks
//! are written once during construction.
//!
//! Dropping a running engine stops it, switches the pacer off and hands the
//! pins back with their previous function.

use crate::channel::{Channel, ChannelTable, GpioPin, duty_from_fraction};
use crate::config::{DelaySource, PwmConfig};
use crate::descriptor::{ChainLayout, ChainTargets, DescriptorChain};
use crate::error::{ChannelError, InitError};
use crate::samples::regenerate;
use crate::sequencer::{Delay, Sequencer, ThreadSleep, Windows};
use core::fmt;
use pwm_memory::{DevMem, DmaMemory, LockedArena, MappedRegisters, PagemapResolver};
use pwm_platform::{BLOCK_LEN, Block};
use pwm_registers::RegisterWindow;
use pwm_registers::dma::{CHANNEL_STRIDE, DmaCs, channel_offset};

/// An engine on real hardware.
pub type HardwareEngine = Engine<LockedArena, MappedRegisters, ThreadSleep>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum State {
    /// DMA is replaying the chain.
    Running,
    /// Outputs silenced and DMA halted; the pacer is still configured.
    Stopped,
    /// Pins released. Only reachable through drop or [`Engine::exit`].
    Exited,
}

/// Bring the engine up on the configured hardware.
///
/// The configuration is validated before anything is opened. GPIO is only
/// claimed once the arena, page table and descriptor chain are complete.
///
/// # Errors
/// [`InitError`] for an invalid configuration, missing privileges, memory
/// that cannot be locked, or pages the DMA engine cannot reach.
pub fn init(config: PwmConfig) -> Result<HardwareEngine, InitError> {
    let nr_samples = config.validate()?;
    let layout = ChainLayout::new(nr_samples);
    let platform = config.platform();
    log::info!(
        "initializing {} channel(s) on {platform}, {} pacing, DMA channel {}",
        config.pins().len(),
        config.delay_source(),
        config.dma_channel()
    );

    let devmem = DevMem::open()?;
    let windows = Windows {
        dma: devmem.map_block(
            &platform,
            Block::Dma,
            channel_offset(config.dma_channel()),
            CHANNEL_STRIDE,
        )?,
        clock: devmem.map_block(&platform, Block::Clock, 0, BLOCK_LEN)?,
        pacer: devmem.map_block(&platform, config.delay_source().block(), 0, BLOCK_LEN)?,
        gpio: devmem.map_block(&platform, Block::Gpio, 0, BLOCK_LEN)?,
    };

    let resolver = PagemapResolver::open()?;
    let arena = LockedArena::allocate(layout.pages(), &resolver, platform.dram_alias)?;
    Engine::with_parts(config, arena, windows, ThreadSleep)
}

pub struct Engine<M: DmaMemory, R: RegisterWindow, D: Delay> {
    config: PwmConfig,
    table: ChannelTable,
    chain: DescriptorChain,
    memory: M,
    sequencer: Sequencer<R, D>,
    state: State,
}

impl<M: DmaMemory, R: RegisterWindow, D: Delay> Engine<M, R, D> {
    /// Assemble an engine from already-acquired memory and registers, then
    /// claim the pins and start DMA.
    ///
    /// # Errors
    /// [`InitError::Config`] or [`InitError::Chain`]; no register has been
    /// written when either is returned.
    pub fn with_parts(
        config: PwmConfig,
        mut memory: M,
        windows: Windows<R>,
        delay: D,
    ) -> Result<Self, InitError> {
        let nr_samples = config.validate()?;
        let table = ChannelTable::new(config.pins(), nr_samples)?;
        let layout = ChainLayout::new(nr_samples);
        let targets = ChainTargets::new(config.invert(), config.delay_source());
        let chain = DescriptorChain::build(&mut memory, layout, targets)?;
        regenerate(&mut memory, &layout, &table);

        let sequencer = Sequencer::new(
            windows,
            delay,
            config.delay_source(),
            config.platform().clock_divisor(),
        );
        let mut engine = Self {
            config,
            table,
            chain,
            memory,
            sequencer,
            state: State::Stopped,
        };
        engine
            .sequencer
            .claim_pins(engine.config.pins(), engine.config.invert());
        engine.start();
        Ok(engine)
    }

    #[must_use]
    pub const fn config(&self) -> &PwmConfig {
        &self.config
    }

    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub const fn layout(&self) -> ChainLayout {
        self.chain.layout()
    }

    #[must_use]
    pub const fn chain(&self) -> &DescriptorChain {
        &self.chain
    }

    #[must_use]
    pub const fn memory(&self) -> &M {
        &self.memory
    }

    #[must_use]
    pub const fn windows(&self) -> &Windows<R> {
        self.sequencer.windows()
    }

    #[must_use]
    pub fn channels(&self) -> &[Channel] {
        self.table.channels()
    }

    #[must_use]
    pub fn channel(&self, pin: GpioPin) -> Option<&Channel> {
        self.table.get(pin)
    }

    /// Current sample masks, slot 0 first.
    #[must_use]
    pub fn samples(&self) -> Vec<u32> {
        let layout = self.chain.layout();
        (0..layout.nr_samples())
            .map(|slot| self.memory.read_u32(layout.sample_offset(slot)))
            .collect()
    }

    /// Raw `CS` of the DMA channel.
    #[must_use]
    pub fn dma_status(&self) -> DmaCs {
        self.sequencer.dma_status()
    }

    fn regenerate(&mut self) {
        let layout = self.chain.layout();
        regenerate(&mut self.memory, &layout, &self.table);
    }

    /// Set `pin` active for `duty` slices of every cycle.
    ///
    /// Takes effect within one cycle.
    ///
    /// # Errors
    /// [`ChannelError`] for an unconfigured pin or a duty above the slice
    /// count; the waveform is unchanged.
    pub fn set_channel(&mut self, pin: GpioPin, duty: u32) -> Result<(), ChannelError> {
        self.table.set(pin, duty)?;
        self.regenerate();
        log::debug!("{pin:?} duty {duty}/{}", self.table.nr_samples());
        Ok(())
    }

    /// Like [`set_channel`](Self::set_channel) with `fraction` of a cycle,
    /// rounded to the nearest slice.
    ///
    /// # Errors
    /// [`ChannelError::FractionOutOfRange`] outside `0.0..=1.0`, otherwise as
    /// [`set_channel`](Self::set_channel).
    pub fn set_channel_fraction(&mut self, pin: GpioPin, fraction: f64) -> Result<(), ChannelError> {
        let duty = duty_from_fraction(fraction, self.table.nr_samples())?;
        self.set_channel(pin, duty)
    }

    /// Apply one duty to several pins with a single regeneration.
    ///
    /// # Errors
    /// As [`set_channel`](Self::set_channel); no pin changes unless all are valid.
    pub fn set_channels(&mut self, pins: &[GpioPin], duty: u32) -> Result<(), ChannelError> {
        self.table.set_many(pins, duty)?;
        self.regenerate();
        log::debug!("{} channel(s) duty {duty}/{}", pins.len(), self.table.nr_samples());
        Ok(())
    }

    /// Disable `pin`'s channel and drive the pin inactive.
    ///
    /// # Errors
    /// [`ChannelError::UnknownPin`].
    pub fn release_channel(&mut self, pin: GpioPin) -> Result<(), ChannelError> {
        self.table.release(pin)?;
        self.regenerate();
        self.sequencer.drive_inactive(pin.mask(), self.config.invert());
        log::debug!("released {pin:?}");
        Ok(())
    }

    /// Silence every channel, wait out the current cycle, then halt DMA.
    ///
    /// Blocks for one cycle. Does nothing unless running.
    pub fn stop(&mut self) {
        if self.state != State::Running {
            return;
        }
        self.table.silence();
        self.regenerate();
        self.sequencer.wait_us(u64::from(self.config.cycle_time_us()));
        self.sequencer.halt_dma();
        self.sequencer
            .drive_inactive(self.table.pin_mask(), self.config.invert());
        self.state = State::Stopped;
        log::info!("stopped");
    }

    /// Restart a stopped engine with the current channel table.
    ///
    /// `stop` disables every channel, so only channels set since then are
    /// driven after the restart.
    pub fn start(&mut self) {
        if self.state != State::Stopped {
            return;
        }
        self.sequencer
            .start(self.chain.head(), self.config.sample_time_us());
        self.state = State::Running;
        log::info!(
            "running: {} channel(s), {} Hz, {} steps",
            self.table.channels().len(),
            self.summary().frequency_hz,
            self.table.nr_samples()
        );
    }

    /// Stop, switch the pacer off and release the pins.
    pub fn exit(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.state == State::Exited {
            return;
        }
        self.stop();
        self.sequencer.quiesce_pacer();
        self.sequencer.release_pins(self.config.invert());
        self.state = State::Exited;
        log::info!("pins released");
    }

    #[must_use]
    pub fn summary(&self) -> Summary {
        let nr_samples = self.table.nr_samples();
        let sample_time_us = self.config.sample_time_us();
        Summary {
            pacer: self.config.delay_source(),
            channels: self.table.channels().len(),
            frequency_hz: 1_000_000u32
                .checked_div(self.config.cycle_time_us())
                .unwrap_or_default(),
            steps: nr_samples,
            max_pulse_us: nr_samples.saturating_mul(sample_time_us),
            min_pulse_us: sample_time_us,
        }
    }
}

impl<M: DmaMemory, R: RegisterWindow, D: Delay> Drop for Engine<M, R, D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<M: DmaMemory, R: RegisterWindow, D: Delay> fmt::Debug for Engine<M, R, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("head", &self.chain.head())
            .finish_non_exhaustive()
    }
}

/// Derived timing numbers of a running configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Summary {
    pub pacer: DelaySource,
    pub channels: usize,
    pub frequency_hz: u32,
    pub steps: u32,
    /// Pulse width at 100 %.
    pub max_pulse_us: u32,
    /// Pulse width of one slice.
    pub min_pulse_us: u32,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min_percent = 100.0 * f64::from(self.min_pulse_us) / f64::from(self.max_pulse_us.max(1));
        writeln!(f, "Using hardware:           {:>8}", self.pacer)?;
        writeln!(f, "Number of channels:       {:>8}", self.channels)?;
        writeln!(f, "PWM frequency:            {:>5} Hz", self.frequency_hz)?;
        writeln!(f, "PWM steps:                {:>8}", self.steps)?;
        writeln!(f, "Maximum period (100  %):  {:>6}us", self.max_pulse_us)?;
        write!(
            f,
            "Minimum period ({min_percent:1.3}%):  {:>6}us",
            self.min_pulse_us
        )
    }
}

#[cfg(feature = "sim")]
pub use simulated::{SimulatedEngine, simulate, simulated_windows};

#[cfg(feature = "sim")]
mod simulated {
    use super::Engine;
    use crate::config::PwmConfig;
    use crate::descriptor::ChainLayout;
    use crate::error::InitError;
    use crate::sequencer::{JournalDelay, Windows};
    use pwm_memory::SimulatedArena;
    use pwm_platform::BLOCK_LEN;
    use pwm_registers::dma::CHANNEL_STRIDE;
    use pwm_registers::sim::{Journal, SimulatedRegisters};

    /// An engine on in-process register files and a heap arena.
    pub type SimulatedEngine = Engine<SimulatedArena, SimulatedRegisters, JournalDelay>;

    /// Register files for `config`, all recording into `journal`.
    #[must_use]
    pub fn simulated_windows(config: &PwmConfig, journal: &Journal) -> Windows<SimulatedRegisters> {
        Windows {
            dma: SimulatedRegisters::new("dma", CHANNEL_STRIDE, journal.clone()),
            clock: SimulatedRegisters::new("clk", BLOCK_LEN, journal.clone()),
            pacer: SimulatedRegisters::new(
                config.delay_source().block().name(),
                BLOCK_LEN,
                journal.clone(),
            ),
            gpio: SimulatedRegisters::new("gpio", BLOCK_LEN, journal.clone()),
        }
    }

    /// Bring an engine up on simulated hardware.
    ///
    /// # Errors
    /// As [`init`](super::init), minus the privilege failures.
    pub fn simulate(config: PwmConfig) -> Result<(SimulatedEngine, Journal), InitError> {
        let nr_samples = config.validate()?;
        let layout = ChainLayout::new(nr_samples);
        let arena = SimulatedArena::new(layout.pages(), config.platform().dram_alias)?;
        let journal = Journal::new();
        let windows = simulated_windows(&config, &journal);
        let engine = Engine::with_parts(config, arena, windows, JournalDelay(journal.clone()))?;
        Ok((engine, journal))
    }
}

#[cfg(all(test, feature = "sim"))]
mod tests {
    use super::*;

    fn pin(n: u8) -> GpioPin {
        GpioPin::new(n).unwrap()
    }

    #[test]
    fn summary_matches_config() {
        let (engine, _) = simulate(PwmConfig::default()).unwrap();
        let summary = engine.summary();
        assert_eq!(
            summary,
            Summary {
                pacer: DelaySource::Pwm,
                channels: 8,
                frequency_hz: 100,
                steps: 1000,
                max_pulse_us: 10_000,
                min_pulse_us: 10,
            }
        );
        let text = summary.to_string();
        assert!(text.contains("PWM steps:"));
        assert!(text.contains("(0.100%)"));
    }

    #[test]
    fn stop_start_cycle() {
        let (mut engine, _) = simulate(PwmConfig::default()).unwrap();
        assert_eq!(engine.state(), State::Running);
        engine.set_channel(pin(18), 500).unwrap();
        engine.stop();
        assert_eq!(engine.state(), State::Stopped);
        assert!(!engine.channel(pin(18)).unwrap().enabled);
        engine.stop();
        assert_eq!(engine.state(), State::Stopped);
        engine.start();
        assert_eq!(engine.state(), State::Running);
        engine.start();
        assert_eq!(engine.state(), State::Running);
    }

    #[test]
    fn restart_keeps_channels_set_while_stopped() {
        let (mut engine, _) = simulate(PwmConfig::default()).unwrap();
        engine.set_channel(pin(18), 500).unwrap();
        engine.stop();
        engine.set_channel(pin(4), 20).unwrap();
        engine.start();
        assert!(engine.channel(pin(4)).unwrap().enabled);
        assert!(!engine.channel(pin(18)).unwrap().enabled);
        let samples = engine.samples();
        assert_eq!(samples[0], 1 << 4);
        assert_eq!(samples[20], 0);
        assert_eq!(samples[21], 1 << 4);
    }

    #[test]
    fn fraction_rounds_to_slices() {
        let (mut engine, _) = simulate(PwmConfig::default()).unwrap();
        engine.set_channel_fraction(pin(17), 0.25).unwrap();
        assert_eq!(engine.channel(pin(17)).unwrap().duty, 250);
        assert_eq!(
            engine.set_channel_fraction(pin(17), 2.0),
            Err(ChannelError::FractionOutOfRange(2.0))
        );
        assert_eq!(engine.channel(pin(17)).unwrap().duty, 250);
    }
}
