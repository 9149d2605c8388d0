use crate::FrameFlag;

/// Control operations the state machine issues to the peripheral.
///
/// Every operation only arms the hardware and returns. Completion comes back
/// later as an [`Event`](crate::Event) from the peripheral's interrupt.
pub trait SlaveHardware {
    type Error;

    /// Brings the peripheral up and returns the configured 7-bit own address.
    fn configure(&mut self) -> Result<u8, Self::Error>;

    /// Waits for the next address match.
    fn enable_listen(&mut self);

    /// Accepts exactly one byte from the master.
    fn arm_receive(&mut self, flag: FrameFlag);

    /// Shifts `frame` out to the master.
    fn arm_transmit(&mut self, frame: &[u8], flag: FrameFlag);
}
