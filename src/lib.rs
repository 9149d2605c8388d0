//! Interrupt-driven I2C slave driver with an Arduino `Wire`-like byte-stream API.
//!
//! The driver state lives in a [`Bridge`] placed in a `static`. The peripheral's
//! interrupt handlers translate hardware flags into [`Event`]s and feed them to
//! [`handle_event`]; application code talks to the same bridge through an
//! [`I2cSlave`] handle:
//!
//! ```text
//!  I2Cx_EV / I2Cx_ER ──▶ handle_event ──▶ Bridge ◀── I2cSlave (begin/read/write)
//!                            │                ▲
//!                            └── on_receive / on_request callbacks
//! ```
//!
//! Bytes written by the master are collected one single-byte frame at a time
//! and published as a whole once the transaction ends. Reads by the master are
//! served from a frame staged by the request callback.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

mod accumulator;
mod bridge;
mod diagnostics;
mod frame_buffer;
mod hardware;
mod interrupts;
mod slave;
mod state_holder;
#[cfg(feature = "stm32")]
pub mod stm32;

#[cfg(test)]
mod test_support;

pub use accumulator::MIN_CAPACITY;
pub use bridge::{Bridge, ReceiveCallback, RequestCallback, MASTER_ADDRESS};
pub use diagnostics::{Diagnostic, DiagnosticSink, LogSink};
pub use hardware::SlaveHardware;
pub use interrupts::{handle_event, InterruptBridge};
pub use slave::{I2CSlave, I2cBridge};

#[cfg(feature = "dump")]
pub use bridge::StateDump;

/// Protocol phase of the slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::NoUninit)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    Listening,
    Receiving,
    Transmitting,
}

/// Transfer direction announced by an address match, seen from the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// The master writes, the slave receives.
    MasterWrites,
    /// The master reads, the slave transmits.
    MasterReads,
}

/// Whether more frames follow the one being armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameFlag {
    Next,
    Last,
}

/// Hardware notifications consumed by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    AddressMatch(Direction),
    ByteReceived(u8),
    ListenComplete,
    /// The last byte of the staged frame was queued for shifting out. Not
    /// raised for an empty frame.
    TransmitComplete,
    Error(BusError),
}

/// Bus error codes reported by the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    BusError,
    ArbitrationLoss,
    /// The master did not acknowledge. Expected at the end of every read.
    AcknowledgeFailure,
    Overrun,
    PecError,
    Timeout,
    SmBusAlert,
}

impl BusError {
    pub fn is_benign(&self) -> bool {
        matches!(self, BusError::AcknowledgeFailure)
    }
}

impl core::fmt::Display for BusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BusError::BusError => write!(f, "misplaced start or stop condition"),
            BusError::ArbitrationLoss => write!(f, "arbitration lost"),
            BusError::AcknowledgeFailure => write!(f, "acknowledge failure"),
            BusError::Overrun => write!(f, "overrun or underrun"),
            BusError::PecError => write!(f, "PEC mismatch"),
            BusError::Timeout => write!(f, "SCL held low for too long"),
            BusError::SmBusAlert => write!(f, "SMBus alert"),
        }
    }
}

/// Errors returned to application code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Staged bytes would not fit into the frame buffer.
    CapacityExceeded,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::CapacityExceeded => write!(f, "frame buffer capacity exceeded"),
        }
    }
}
