/// Storage for the single transfer in flight.
///
/// Only one direction is active at a time, so the staged outgoing frame and the
/// bytes collected for an incoming frame share the same array. `used` counts
/// staged bytes, `received` counts collected ones.
pub struct FrameBuffer<const BUFSIZE: usize> {
    buf: [u8; BUFSIZE],
    used: usize,
    received: usize,
}

impl<const BUFSIZE: usize> FrameBuffer<BUFSIZE> {
    const CAPACITY_OK: () = assert!(
        BUFSIZE > 0 && BUFSIZE <= 255,
        "Frame capacity must be in 1..=255"
    );

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;

        Self {
            buf: [0; BUFSIZE],
            used: 0,
            received: 0,
        }
    }

    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// Stages `data` after the bytes already staged. Nothing is copied when the
    /// whole of `data` does not fit.
    pub fn append(&mut self, data: &[u8]) -> Result<(), ()> {
        let end = self.used + data.len();
        if end > BUFSIZE {
            return Err(());
        }

        self.buf[self.used..end].copy_from_slice(data);
        self.used = end;
        Ok(())
    }

    pub fn staged(&self) -> &[u8] {
        &self.buf[..self.used]
    }

    /// Stores an incoming byte at the receive cursor.
    pub fn push_received(&mut self, byte: u8) -> Result<(), ()> {
        if self.received == BUFSIZE {
            Err(())
        } else {
            self.buf[self.received] = byte;
            self.received += 1;
            Ok(())
        }
    }

    pub fn received(&self) -> &[u8] {
        &self.buf[..self.received]
    }

    pub fn clear_received(&mut self) {
        self.received = 0;
    }
}
