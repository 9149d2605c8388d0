use crate::BusError;

/// Conditions the driver recovers from on its own but still wants someone to
/// hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Diagnostic {
    /// `write` would have staged more than the frame capacity.
    CapacityExceeded { capacity: usize },
    /// The master sent more bytes than the frame can hold.
    ReceiveOverflow { capacity: usize },
    /// The accumulator could not grow to hold a transaction.
    OutOfMemory { requested: usize },
    /// A transaction completed while the previous one was still unread.
    ReceiveDropped { len: usize },
    Bus(BusError),
}

impl core::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Diagnostic::CapacityExceeded { capacity } => {
                write!(f, "frame buffer full ({} bytes)", capacity)
            }
            Diagnostic::ReceiveOverflow { capacity } => {
                write!(f, "slave RX overflow ({} bytes)", capacity)
            }
            Diagnostic::OutOfMemory { requested } => {
                write!(f, "not enough memory ({} bytes)", requested)
            }
            Diagnostic::ReceiveDropped { len } => {
                write!(f, "dropped {} bytes, previous data unread", len)
            }
            Diagnostic::Bus(err) => write!(f, "bus error: {}", err),
        }
    }
}

/// Destination for [`Diagnostic`]s. Called from interrupt context.
pub trait DiagnosticSink {
    fn emit(&self, diagnostic: Diagnostic);
}

/// Sink that forwards to `defmt` or `log`, whichever feature is enabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn emit(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::ReceiveDropped { .. } => warn!("[I2C]: {}", diagnostic),
            _ => error!("[I2C]: {}", diagnostic),
        }
    }
}

impl<S: DiagnosticSink> DiagnosticSink for &S {
    fn emit(&self, diagnostic: Diagnostic) {
        (**self).emit(diagnostic)
    }
}
