//! # Hardware Sequencer
//!
//! Brings the clock manager, the pacing peripheral and the DMA channel up in
//! datasheet order and takes them down again. Each register write is followed
//! by its settle delay, so callers never sequence raw stores themselves.
//!
//! ```text
//!  PWM pacing                         PCM pacing
//!  CTL    <- 0                        CS   <- EN
//!  clock  <- stop, div, run           clock <- stop, div, run
//!  RNG1   <- sample ticks             TXC  <- CH1EN
//!  DMAC   <- ENAB, 15/15              MODE <- FLEN = ticks - 1
//!  CTL    <- CLRF1                    CS   |= TXCLR | RXCLR
//!  CTL    <- USEF1 | PWEN1            DREQ <- TX 64 / panic 64
//!                                     CS   |= DMAEN
//!  ───────────── DMA: RESET, clear flags, CONBLK_AD, DEBUG, START ─────────
//!                                     CS   |= TXON
//! ```

use crate::channel::GpioPin;
use crate::config::DelaySource;
use pwm_addresses::BusAddress;
use pwm_platform::TICKS_PER_US;
use pwm_registers::RegisterWindow;
use pwm_registers::clock::{ClockControl, ClockDivisor, ClockSource};
use pwm_registers::dma::{DmaConblkAd, DmaCs, DmaDebug};
use pwm_registers::gpio::{Function, FunctionSelect, GPCLR0, GPSET0, fsel_offset};
use pwm_registers::pcm::{MAX_FRAME_LENGTH, PcmCs, PcmDreq, PcmMode, PcmTxc};
use pwm_registers::pwm::{PwmCtl, PwmDmac, PwmRng1};
use std::time::Duration;

/// Settle time after DMA and PWM register writes.
pub const SHORT_SETTLE_US: u64 = 10;
/// Settle time after clock manager and PCM register writes.
pub const LONG_SETTLE_US: u64 = 100;

/// Busy or sleeping wait between register writes.
pub trait Delay {
    fn delay_us(&mut self, micros: u64);
}

/// Sleeps the calling thread. The kernel may oversleep, never undersleep.
#[derive(Copy, Clone, Debug, Default)]
pub struct ThreadSleep;

impl Delay for ThreadSleep {
    fn delay_us(&mut self, micros: u64) {
        std::thread::sleep(Duration::from_micros(micros));
    }
}

/// Records delays into a register journal instead of waiting.
#[cfg(feature = "sim")]
#[derive(Clone, Debug)]
pub struct JournalDelay(pub pwm_registers::sim::Journal);

#[cfg(feature = "sim")]
impl Delay for JournalDelay {
    fn delay_us(&mut self, micros: u64) {
        self.0.record(pwm_registers::sim::Event::Delay { micros });
    }
}

/// The four register blocks the engine drives.
#[derive(Debug)]
pub struct Windows<R> {
    /// One DMA channel.
    pub dma: R,
    pub clock: R,
    /// PWM or PCM, whichever paces the chain.
    pub pacer: R,
    pub gpio: R,
}

#[derive(Debug)]
pub struct Sequencer<R, D> {
    windows: Windows<R>,
    delay: D,
    pacer: DelaySource,
    clock_divisor: u16,
    /// Function each claimed pin had before we took it.
    claimed: Vec<(GpioPin, Function)>,
}

impl<R: RegisterWindow, D: Delay> Sequencer<R, D> {
    #[must_use]
    pub const fn new(windows: Windows<R>, delay: D, pacer: DelaySource, clock_divisor: u16) -> Self {
        Self {
            windows,
            delay,
            pacer,
            clock_divisor,
            claimed: Vec::new(),
        }
    }

    #[must_use]
    pub const fn windows(&self) -> &Windows<R> {
        &self.windows
    }

    pub fn wait_us(&mut self, micros: u64) {
        self.delay.delay_us(micros);
    }

    /// Start pacing and point the DMA channel at `head`.
    pub fn start(&mut self, head: BusAddress, sample_time_us: u32) {
        let ticks = sample_time_us.saturating_mul(TICKS_PER_US);
        log::debug!(
            "starting {} pacing at {ticks} ticks per sample, chain head {head}",
            self.pacer
        );
        match self.pacer {
            DelaySource::Pwm => {
                self.pacer_store(PwmCtl::new(), SHORT_SETTLE_US);
                self.start_clock();
                self.pacer_store(PwmRng1(ticks), SHORT_SETTLE_US);
                self.pacer_store(PwmDmac::PACING, SHORT_SETTLE_US);
                self.pacer_store(PwmCtl::new().with_clrf1(true), SHORT_SETTLE_US);
                self.pacer_store(PwmCtl::FIFO_PACING, SHORT_SETTLE_US);
                self.start_dma(head);
            }
            DelaySource::Pcm => {
                let flen = u16::try_from(ticks.saturating_sub(1))
                    .unwrap_or(MAX_FRAME_LENGTH)
                    .min(MAX_FRAME_LENGTH);
                self.pacer_store(PcmCs::new().with_en(true), LONG_SETTLE_US);
                self.start_clock();
                self.pacer_store(PcmTxc::new().with_ch1en(true), LONG_SETTLE_US);
                self.pacer_store(PcmMode::new().with_flen(flen), LONG_SETTLE_US);
                self.pacer_modify(|cs: PcmCs| cs.with_txclr(true).with_rxclr(true));
                self.pacer_store(PcmDreq::PACING, LONG_SETTLE_US);
                self.pacer_modify(|cs: PcmCs| cs.with_dmaen(true));
                self.start_dma(head);
                self.pacer_modify(|cs: PcmCs| cs.with_txon(true));
            }
        }
    }

    fn pacer_store<T: pwm_registers::Register>(&mut self, value: T, settle_us: u64) {
        self.windows.pacer.store(value);
        self.delay.delay_us(settle_us);
    }

    fn pacer_modify<T: pwm_registers::Register>(&mut self, f: impl FnOnce(T) -> T) {
        self.windows.pacer.modify(f);
        self.delay.delay_us(LONG_SETTLE_US);
    }

    fn start_clock(&mut self) {
        let channel = self.pacer.clock();
        let clock = &mut self.windows.clock;
        clock.store_raw(
            channel.control_offset(),
            ClockControl::stopped(ClockSource::PllD).into_bits(),
        );
        self.delay.delay_us(LONG_SETTLE_US);
        clock.store_raw(
            channel.divisor_offset(),
            ClockDivisor::integer(self.clock_divisor).into_bits(),
        );
        self.delay.delay_us(LONG_SETTLE_US);
        clock.store_raw(
            channel.control_offset(),
            ClockControl::running(ClockSource::PllD).into_bits(),
        );
        self.delay.delay_us(LONG_SETTLE_US);
    }

    fn start_dma(&mut self, head: BusAddress) {
        self.windows.dma.store(DmaCs::RESET);
        self.delay.delay_us(SHORT_SETTLE_US);
        self.windows.dma.store(DmaCs::CLEAR_FLAGS);
        self.delay.delay_us(SHORT_SETTLE_US);
        self.windows.dma.store(DmaConblkAd(head));
        self.delay.delay_us(SHORT_SETTLE_US);
        self.windows.dma.store(DmaDebug::CLEAR_ERRORS);
        self.delay.delay_us(SHORT_SETTLE_US);
        self.windows.dma.store(DmaCs::START);
        self.delay.delay_us(SHORT_SETTLE_US);
    }

    /// Reset the DMA channel, abandoning the chain.
    pub fn halt_dma(&mut self) {
        self.windows.dma.store(DmaCs::RESET);
        self.delay.delay_us(SHORT_SETTLE_US);
    }

    /// Switch the pacing peripheral off.
    pub fn quiesce_pacer(&mut self) {
        match self.pacer {
            DelaySource::Pwm => self.pacer_store(PwmCtl::new(), SHORT_SETTLE_US),
            DelaySource::Pcm => self.pacer_store(PcmCs::new(), LONG_SETTLE_US),
        }
    }

    #[must_use]
    pub fn dma_status(&self) -> DmaCs {
        self.windows.dma.load()
    }

    /// Drive every pin in `mask` to its inactive level.
    pub fn drive_inactive(&mut self, mask: u32, invert: bool) {
        let register = if invert { GPSET0 } else { GPCLR0 };
        self.windows.gpio.store_raw(register, mask);
    }

    /// Drive `pins` inactive and make them outputs, remembering their old
    /// function for [`release_pins`](Self::release_pins).
    pub fn claim_pins(&mut self, pins: &[GpioPin], invert: bool) {
        let mask = pins.iter().fold(0, |m, p| m | p.mask());
        self.drive_inactive(mask, invert);
        for &pin in pins {
            let previous = self.set_function(pin, Function::Output);
            log::debug!("claimed {pin:?} (was {previous:?})");
            self.claimed.push((pin, previous));
        }
    }

    /// Drive claimed pins inactive and restore their previous function.
    pub fn release_pins(&mut self, invert: bool) {
        let claimed = std::mem::take(&mut self.claimed);
        if claimed.is_empty() {
            return;
        }
        let mask = claimed.iter().fold(0, |m, (p, _)| m | p.mask());
        self.drive_inactive(mask, invert);
        for (pin, previous) in claimed {
            self.set_function(pin, previous);
        }
    }

    fn set_function(&mut self, pin: GpioPin, function: Function) -> Function {
        let offset = fsel_offset(pin.number());
        let fsel = FunctionSelect::from_bits(self.windows.gpio.load_raw(offset));
        let previous = fsel.function(pin.number());
        self.windows
            .gpio
            .store_raw(offset, fsel.with_function(pin.number(), function).into_bits());
        previous
    }
}
