//! Register-level backend for the STM32 I2C v1 peripheral.
//!
//! ```ignore
//! static I2C_BRIDGE: Bridge<Stm32Hardware<I2C1>, LogSink, 32> =
//!     Bridge::new(Stm32Hardware::new(Config::new(0x61)), LogSink);
//!
//! #[interrupt]
//! fn I2C1_EV() {
//!     handle_event_interrupt(&I2C_BRIDGE);
//! }
//!
//! #[interrupt]
//! fn I2C1_ER() {
//!     handle_error_interrupt(&I2C_BRIDGE);
//! }
//! ```

use core::marker::PhantomData;

use embassy_stm32::{
    gpio::{low_level::AFType, Pull},
    i2c::{self, SclPin, SdaPin},
    pac,
    time::Hertz,
    Peripheral,
};

use crate::{
    handle_event, Bridge, BusError, DiagnosticSink, Direction, Event, FrameFlag, SlaveHardware,
};

/// Sent when the master reads past the staged frame.
const FILLER: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Fast-mode is not supported.
    SpeedNotSupported,
    /// 10-bit addresses are not supported.
    AddressOutOfRange,
    /// Standard mode needs a peripheral clock of at least 2 MHz.
    ClockTooSlow,
}

#[derive(Clone, Copy)]
pub struct Config {
    pub own_address: u8,
    pub speed: Hertz,
}

impl Config {
    pub const fn new(own_address: u8) -> Self {
        Self {
            own_address,
            speed: Hertz(100_000),
        }
    }

    /// Address made of `base` with the low three bits taken from address
    /// strap inputs.
    pub const fn strapped(base: u8, straps: u8) -> Self {
        Self::new((base & !0b111) | (straps & 0b111))
    }
}

pub struct Stm32Hardware<T: i2c::Instance> {
    config: Config,
    tx: heapless::Vec<u8, 255>,
    sent: usize,
    _marker: PhantomData<T>,
}

impl<T: i2c::Instance> Stm32Hardware<T> {
    pub const fn new(config: Config) -> Self {
        Self {
            config,
            tx: heapless::Vec::new(),
            sent: 0,
            _marker: PhantomData,
        }
    }

    fn next_tx_byte(&mut self) -> Option<u8> {
        let byte = self.tx.get(self.sent).copied()?;
        self.sent += 1;
        Some(byte)
    }

    fn tx_done(&self) -> bool {
        self.sent >= self.tx.len()
    }

    fn clear_tx(&mut self) {
        self.tx.clear();
        self.sent = 0;
    }
}

/// Puts SCL and SDA into open-drain alternate function mode.
pub fn configure_pins<'d, T: i2c::Instance>(
    scl: impl Peripheral<P = impl SclPin<T>> + 'd,
    sda: impl Peripheral<P = impl SdaPin<T>> + 'd,
) {
    let scl = scl.into_ref();
    let sda = sda.into_ref();

    scl.set_as_af_pull(scl.af_num(), AFType::OutputOpenDrain, Pull::None);
    sda.set_as_af_pull(sda.af_num(), AFType::OutputOpenDrain, Pull::None);
}

impl<T: i2c::Instance> SlaveHardware for Stm32Hardware<T> {
    type Error = ConfigError;

    fn configure(&mut self) -> Result<u8, ConfigError> {
        let Config { own_address, speed } = self.config;

        if speed > Hertz(100_000) {
            return Err(ConfigError::SpeedNotSupported);
        }
        if own_address > 127 {
            return Err(ConfigError::AddressOutOfRange);
        }

        T::enable_and_reset();

        let clock_frequency = T::frequency();
        let freq = (clock_frequency.0 / 1_000_000) as u8;
        if freq < 2 {
            return Err(ConfigError::ClockTooSlow);
        }

        let regs = T::regs();

        regs.cr1().modify(|w| w.set_pe(false));

        regs.oar1().modify(|w| {
            w.set_addmode(pac::i2c::vals::Addmode::BIT7);
            w.set_add((own_address << 1) as u16);
        });

        regs.cr2().modify(|w| w.set_freq(freq));

        regs.trise().modify(|w| w.set_trise(freq + 1));

        regs.ccr().modify(|w| {
            w.set_ccr((clock_frequency.0 / speed.0 / 2) as u16);
            w.set_duty(pac::i2c::vals::Duty::DUTY2_1);
            w.set_f_s(pac::i2c::vals::FS::STANDARD);
        });
        regs.cr1().modify(|w| w.set_pe(true));

        self.clear_tx();
        Ok(own_address)
    }

    fn enable_listen(&mut self) {
        let regs = T::regs();

        regs.cr1().modify(|w| {
            w.set_ack(true);
            w.set_pe(true);
        });
        regs.cr2().modify(|w| {
            w.set_itbufen(true);
            w.set_itevten(true);
            w.set_iterren(true);
        });
    }

    fn arm_receive(&mut self, flag: FrameFlag) {
        T::regs()
            .cr1()
            .modify(|w| w.set_ack(matches!(flag, FrameFlag::Next)));
    }

    fn arm_transmit(&mut self, frame: &[u8], _flag: FrameFlag) {
        self.clear_tx();
        // The frame capacity is at most 255, so this always fits.
        let _ = self.tx.extend_from_slice(frame);
    }
}

pub fn handle_event_interrupt<T: i2c::Instance, S: DiagnosticSink, const N: usize>(
    bridge: &Bridge<Stm32Hardware<T>, S, N>,
) {
    let regs = T::regs();
    let sr1 = regs.sr1().read();

    if sr1.addr() {
        // Reading SR2 after SR1 clears ADDR.
        let sr2 = regs.sr2().read();

        let direction = if sr2.tra() {
            Direction::MasterReads
        } else {
            Direction::MasterWrites
        };

        handle_event(bridge, Event::AddressMatch(direction));
    }

    if sr1.rxne() {
        let byte = regs.dr().read().dr();
        handle_event(bridge, Event::ByteReceived(byte));
    }

    if sr1.txe() {
        let (byte, done) = bridge.with_hardware(|hw| {
            let byte = hw.next_tx_byte();
            (byte, hw.tx_done())
        });

        match byte {
            Some(byte) => {
                regs.dr().write(|w| w.set_dr(byte));

                if done {
                    handle_event(bridge, Event::TransmitComplete);
                }
            }
            None => regs.dr().write(|w| w.set_dr(FILLER)),
        }
    }

    if sr1.stopf() {
        // Cleared by the SR1 read above followed by a CR1 write.
        regs.cr1().modify(|w| w.set_pe(true));
        handle_event(bridge, Event::ListenComplete);
    }
}

pub fn handle_error_interrupt<T: i2c::Instance, S: DiagnosticSink, const N: usize>(
    bridge: &Bridge<Stm32Hardware<T>, S, N>,
) {
    let regs = T::regs();
    let sr1 = regs.sr1().read();

    if sr1.af() {
        regs.sr1().modify(|w| w.set_af(false));

        // The master ended the read. Whatever was not sent is dropped.
        bridge.with_hardware(|hw| hw.clear_tx());
        handle_event(bridge, Event::Error(BusError::AcknowledgeFailure));
    }

    macro_rules! handle_errors {
        ([$(($name:ident, $set_func:ident, $err:ident)),*]) => {
            $(
                if sr1.$name() {
                    regs.sr1().modify(|w| w.$set_func(false));
                    handle_event(bridge, Event::Error(BusError::$err));
                }
            )*
        };
    }

    handle_errors!([
        (berr, set_berr, BusError),
        (arlo, set_arlo, ArbitrationLoss),
        (ovr, set_ovr, Overrun),
        (pecerr, set_pecerr, PecError),
        (timeout, set_timeout, Timeout),
        (alert, set_alert, SmBusAlert)
    ]);
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn strapped_address_uses_low_three_bits() {
        assert_eq!(Config::strapped(0x60, 0b101).own_address, 0x65);
        assert_eq!(Config::strapped(0x60, 0xFF).own_address, 0x67);
        assert_eq!(Config::strapped(0x67, 0).own_address, 0x60);
    }
}
