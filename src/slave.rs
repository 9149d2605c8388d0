use critical_section::CriticalSection;

use crate::bridge::{ReceiveCallback, ReceivedSignal, RequestCallback};
pub use crate::Error;

/// Operations the application side performs on the driver state.
pub trait I2cBridge {
    type Error;

    fn begin(&self) -> Result<(), Self::Error>;

    fn available(&self, cs: CriticalSection) -> usize;

    fn read(&self, cs: CriticalSection) -> Option<u8>;

    fn read_into(&self, cs: CriticalSection, buf: &mut [u8]) -> usize;

    fn write(&self, cs: CriticalSection, buf: &[u8]) -> Result<(), Error>;

    fn set_on_receive(&self, cs: CriticalSection, callback: Option<ReceiveCallback>);

    fn set_on_request(&self, cs: CriticalSection, callback: Option<RequestCallback>);

    fn own_address(&self, cs: CriticalSection) -> Option<u8>;

    fn received_signal(&self) -> &ReceivedSignal;
}

/// `Wire`-style handle to a [`Bridge`](crate::Bridge).
///
/// The handle is `Copy` and can be built in a `const` context, so callbacks can
/// reach it through a `static`.
pub struct I2CSlave<'d, B: I2cBridge> {
    bridge: &'d B,
}

impl<'d, B: I2cBridge> Clone for I2CSlave<'d, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'d, B: I2cBridge> Copy for I2CSlave<'d, B> {}

impl<'d, B: I2cBridge> I2CSlave<'d, B> {
    pub const fn new(bridge: &'d B) -> Self {
        Self { bridge }
    }

    /// Resets both buffers, brings the hardware up and starts listening.
    ///
    /// Safe to call again at any time. Registered callbacks are kept.
    pub fn begin(&self) -> Result<(), B::Error> {
        self.bridge.begin()
    }

    /// Unread bytes of the last published transaction.
    pub fn available(&self) -> usize {
        critical_section::with(|cs| self.bridge.available(cs))
    }

    pub fn read(&self) -> Option<u8> {
        critical_section::with(|cs| self.bridge.read(cs))
    }

    /// Copies as many unread bytes as fit into `buf`.
    pub fn read_bytes(&self, buf: &mut [u8]) -> usize {
        critical_section::with(|cs| self.bridge.read_into(cs, buf))
    }

    /// Stages one byte of the reply. Meant to be called from the request
    /// callback.
    pub fn write(&self, byte: u8) -> Result<(), Error> {
        self.write_bytes(&[byte])
    }

    /// Stages `buf` as a whole, or nothing of it.
    pub fn write_bytes(&self, buf: &[u8]) -> Result<(), Error> {
        critical_section::with(|cs| self.write_cs(cs, buf))
    }

    pub fn write_cs(&self, cs: CriticalSection, buf: &[u8]) -> Result<(), Error> {
        self.bridge.write(cs, buf)
    }

    pub fn set_on_receive(&self, callback: ReceiveCallback) {
        critical_section::with(|cs| self.bridge.set_on_receive(cs, Some(callback)))
    }

    pub fn set_on_request(&self, callback: RequestCallback) {
        critical_section::with(|cs| self.bridge.set_on_request(cs, Some(callback)))
    }

    pub fn clear_callbacks(&self) {
        critical_section::with(|cs| {
            self.bridge.set_on_receive(cs, None);
            self.bridge.set_on_request(cs, None);
        })
    }

    /// Address read from the hardware by the last successful `begin`.
    pub fn own_address(&self) -> Option<u8> {
        critical_section::with(|cs| self.bridge.own_address(cs))
    }

    /// Resolves with the byte count of the next published transaction.
    pub async fn wait_received(&self) -> usize {
        self.bridge.received_signal().wait().await
    }
}
